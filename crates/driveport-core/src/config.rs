//! ClientConfig - クライアントの設定
//!
//! 構築時の入力はアカウントラベルとシークレット記述子のパスの 2 つだけですが、
//! エンドポイントやキャッシュ場所などはここで差し替えられます。
//!
//! # 読み込み順
//! 1. `Default`
//! 2. JSON ファイル（`from_json_file`、書かれていない項目は既定値）
//! 3. 環境変数（`with_env_overrides`）
//!
//! 最後に `validate()` で fail-fast します。

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::{DriveError, SCOPE_DRIVE, SCOPE_DRIVE_FILE};

pub const ENV_API_BASE_URL: &str = "DRIVEPORT_API_BASE_URL";
pub const ENV_UPLOAD_BASE_URL: &str = "DRIVEPORT_UPLOAD_BASE_URL";
pub const ENV_TOKEN_CACHE_DIR: &str = "DRIVEPORT_TOKEN_CACHE_DIR";

/// Drive API の 1 ページあたりの上限
const MAX_PAGE_SIZE: u32 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Sent as the HTTP user agent.
    pub application_name: String,
    pub api_base_url: String,
    pub upload_base_url: String,
    pub scopes: Vec<String>,
    /// `None` のときは `dirs::config_dir()/driveport`
    pub token_cache_dir: Option<PathBuf>,
    pub list_page_size: u32,
    /// `None` のときはタイムアウトなし
    pub request_timeout_secs: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            application_name: "driveport".to_string(),
            api_base_url: "https://www.googleapis.com/drive/v3".to_string(),
            upload_base_url: "https://www.googleapis.com/upload/drive/v3".to_string(),
            scopes: vec![SCOPE_DRIVE.to_string(), SCOPE_DRIVE_FILE.to_string()],
            token_cache_dir: None,
            list_page_size: 100,
            request_timeout_secs: None,
        }
    }
}

impl ClientConfig {
    pub async fn from_json_file(path: impl AsRef<Path>) -> Result<Self, DriveError> {
        let path = path.as_ref();
        let raw = tokio::fs::read(path).await.map_err(|e| {
            DriveError::Configuration(format!("cannot read config {}: {e}", path.display()))
        })?;
        serde_json::from_slice(&raw).map_err(|e| {
            DriveError::Configuration(format!("invalid config {}: {e}", path.display()))
        })
    }

    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// 環境変数の参照を差し替えられる版（テスト用）
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(ENV_API_BASE_URL) {
            self.api_base_url = url;
        }
        if let Some(url) = lookup(ENV_UPLOAD_BASE_URL) {
            self.upload_base_url = url;
        }
        if let Some(dir) = lookup(ENV_TOKEN_CACHE_DIR) {
            self.token_cache_dir = Some(PathBuf::from(dir));
        }
        self
    }

    pub fn validate(&self) -> Result<(), DriveError> {
        if self.application_name.trim().is_empty() {
            return Err(DriveError::Configuration(
                "application_name must not be empty".to_string(),
            ));
        }
        for (field, url) in [
            ("api_base_url", &self.api_base_url),
            ("upload_base_url", &self.upload_base_url),
        ] {
            let parsed = reqwest::Url::parse(url)
                .map_err(|e| DriveError::Configuration(format!("{field} '{url}': {e}")))?;
            if parsed.cannot_be_a_base() {
                return Err(DriveError::Configuration(format!(
                    "{field} '{url}' cannot be used as a base url"
                )));
            }
        }
        if self.scopes.is_empty() {
            return Err(DriveError::Configuration(
                "at least one scope is required".to_string(),
            ));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&self.list_page_size) {
            return Err(DriveError::Configuration(format!(
                "list_page_size must be within 1..={MAX_PAGE_SIZE}, got {}",
                self.list_page_size
            )));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// キャッシュディレクトリ（設定がなければ OS の設定ディレクトリ配下）
    pub fn resolved_token_cache_dir(&self) -> Result<PathBuf, DriveError> {
        match &self.token_cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::config_dir()
                .map(|dir| dir.join("driveport"))
                .ok_or_else(|| {
                    DriveError::Configuration(
                        "no config directory on this platform; set token_cache_dir".to_string(),
                    )
                }),
        }
    }
}
