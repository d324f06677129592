//! Domain identifiers (strongly-typed IDs).
//!
//! # FileId
//! リモートサービスが割り当てる不透明な文字列です。
//! 一度割り当てられた ID は変わらないため、読み取り・更新の唯一の安定した参照になります。
//!
//! # AccountLabel
//! 認可したユーザーを表すラベル。トークンキャッシュのキーとして使います。

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

use super::errors::DriveError;

/// Identifier of a remote file.
///
/// 空文字列は ID として扱いません（`parse` で拒否）。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(String);

impl FileId {
    /// 文字列から FileId を作成（前後の空白は除去、空なら Configuration エラー）
    pub fn parse(value: &str) -> Result<Self, DriveError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(DriveError::Configuration(
                "file id must not be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// リモートサービスが返した ID をそのまま保持する（空白も含めて書き換えない）
    ///
    /// 空文字列だけは ID として扱えないので `None`。
    pub fn from_remote(value: String) -> Option<Self> {
        (!value.is_empty()).then_some(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<Ulid> for FileId {
    fn from(ulid: Ulid) -> Self {
        Self(ulid.to_string())
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Label of the account the session is authorized for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountLabel(String);

impl AccountLabel {
    pub fn parse(value: &str) -> Result<Self, DriveError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(DriveError::Configuration(
                "account label must not be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// ファイル名として安全な形（英数字・`-`・`_`・`.` 以外は `_` に置換）
    pub fn file_stem(&self) -> String {
        self.0
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }
}

impl fmt::Display for AccountLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
