//! Credential - クライアントシークレットとセッション資格情報
//!
//! # ClientSecrets
//! Google Cloud Console からダウンロードする `client_secret.json` の内容。
//! `installed`（デスクトップアプリ）と `web` のどちらのセクションも受け付けます。
//!
//! # SessionCredential
//! 構築時に一度だけ取得し、クライアントの寿命の間使い回すトークン。
//! 更新（refresh）は Authorizer 側の責務です。

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use super::errors::DriveError;

/// Full access to the user's Drive.
pub const SCOPE_DRIVE: &str = "https://www.googleapis.com/auth/drive";

/// Access to files created or opened by this application.
pub const SCOPE_DRIVE_FILE: &str = "https://www.googleapis.com/auth/drive.file";

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// 期限ぎりぎりのトークンを使わないための余裕
const EXPIRY_SKEW_SECS: i64 = 60;

/// OAuth client registration read from the secret descriptor.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Deserialize)]
struct SecretsDescriptor {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    /// `client_secret.json` を読み込む（ネットワークアクセスなし）
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, DriveError> {
        let path = path.as_ref();
        let raw = tokio::fs::read(path)
            .await
            .map_err(|source| DriveError::SecretsUnreadable {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &[u8]) -> Result<Self, DriveError> {
        let descriptor: SecretsDescriptor = serde_json::from_slice(raw)
            .map_err(|e| DriveError::InvalidSecrets(e.to_string()))?;

        let secrets = descriptor
            .installed
            .or(descriptor.web)
            .ok_or_else(|| {
                DriveError::InvalidSecrets(
                    "expected an \"installed\" or \"web\" section".to_string(),
                )
            })?;

        if secrets.client_id.trim().is_empty() {
            return Err(DriveError::InvalidSecrets("client_id is empty".to_string()));
        }
        Ok(secrets)
    }
}

impl fmt::Debug for ClientSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSecrets")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("auth_uri", &self.auth_uri)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

/// Authorization obtained for one account.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCredential {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl SessionCredential {
    /// 期限なしの bearer トークン（テストやサービストークン用）
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: default_token_type(),
            refresh_token: None,
            expires_at: None,
            scopes: Vec::new(),
        }
    }

    /// トークンエンドポイントの `expires_in` から期限を計算
    pub fn expiring_in(mut self, now: DateTime<Utc>, expires_in_secs: i64) -> Self {
        self.expires_at = Some(now + TimeDelta::seconds(expires_in_secs));
        self
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now + TimeDelta::seconds(EXPIRY_SKEW_SECS) >= expires_at,
            None => false,
        }
    }

    /// Scopes recorded on the credential include every requested one.
    ///
    /// スコープ記録のない資格情報は判定できないので true。
    pub fn covers(&self, requested: &[String]) -> bool {
        self.scopes.is_empty() || requested.iter().all(|s| self.scopes.contains(s))
    }

    /// `Authorization` ヘッダー値
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

impl fmt::Debug for SessionCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredential")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_at", &self.expires_at)
            .field("scopes", &self.scopes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    const INSTALLED: &str = r#"{
        "installed": {
            "client_id": "123.apps.googleusercontent.com",
            "client_secret": "s3cr3t",
            "redirect_uris": ["http://localhost"]
        }
    }"#;

    #[test]
    fn parses_installed_section_with_default_endpoints() {
        let secrets = ClientSecrets::from_json(INSTALLED.as_bytes()).unwrap();
        assert_eq!(secrets.client_id, "123.apps.googleusercontent.com");
        assert_eq!(secrets.token_uri, DEFAULT_TOKEN_URI);
        assert_eq!(secrets.auth_uri, DEFAULT_AUTH_URI);
    }

    #[test]
    fn parses_web_section() {
        let raw = r#"{"web": {"client_id": "web-id", "client_secret": "x", "token_uri": "http://t"}}"#;
        let secrets = ClientSecrets::from_json(raw.as_bytes()).unwrap();
        assert_eq!(secrets.client_id, "web-id");
        assert_eq!(secrets.token_uri, "http://t");
    }

    #[rstest]
    #[case::not_json("not json")]
    #[case::no_section(r#"{"other": {}}"#)]
    #[case::empty_client_id(r#"{"installed": {"client_id": " ", "client_secret": "x"}}"#)]
    fn rejects_malformed_descriptor(#[case] raw: &str) {
        assert!(matches!(
            ClientSecrets::from_json(raw.as_bytes()),
            Err(DriveError::InvalidSecrets(_))
        ));
    }

    #[tokio::test]
    async fn load_reports_unreadable_path() {
        let err = ClientSecrets::load("/definitely/not/here/client_secret.json")
            .await
            .unwrap_err();
        assert!(matches!(err, DriveError::SecretsUnreadable { .. }));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let secrets = ClientSecrets::from_json(INSTALLED.as_bytes()).unwrap();
        assert!(!format!("{secrets:?}").contains("s3cr3t"));

        let mut credential = SessionCredential::bearer("ya29.token-value");
        credential.refresh_token = Some("1//refresh-value".to_string());
        let printed = format!("{credential:?}");
        assert!(!printed.contains("token-value"));
        assert!(!printed.contains("refresh-value"));
    }

    #[test]
    fn expiry_uses_skew() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let credential = SessionCredential::bearer("t").expiring_in(now, 3600);

        assert!(!credential.is_expired(now));
        assert!(!credential.is_expired(now + TimeDelta::seconds(3500)));
        assert!(credential.is_expired(now + TimeDelta::seconds(3541)));
    }

    #[test]
    fn credential_without_expiry_never_expires() {
        let now = Utc.with_ymd_and_hms(2099, 1, 1, 0, 0, 0).unwrap();
        assert!(!SessionCredential::bearer("t").is_expired(now));
    }

    #[test]
    fn covers_checks_requested_scopes() {
        let mut credential = SessionCredential::bearer("t");
        let requested = vec![SCOPE_DRIVE.to_string(), SCOPE_DRIVE_FILE.to_string()];
        assert!(credential.covers(&requested));

        credential.scopes = vec![SCOPE_DRIVE_FILE.to_string()];
        assert!(!credential.covers(&requested));

        credential.scopes.push(SCOPE_DRIVE.to_string());
        assert!(credential.covers(&requested));
    }

    #[test]
    fn authorization_header_uses_token_type() {
        assert_eq!(
            SessionCredential::bearer("abc").authorization_header(),
            "Bearer abc"
        );
    }
}
