//! Errors - エラー型と分類
//!
//! どのエラーもこの層では回復せず、呼び出し元にそのまま伝播します。
//! リトライもしません（1 回の呼び出し = 1 回の試行）。
//!
//! # 分類
//! - Configuration: シークレット記述子が読めない・壊れている、設定値が不正
//! - Authorization: 同意の拒否・キャンセル、トークン交換の失敗
//! - LookupAmbiguity: 同名ファイルが複数ある
//! - Transport: ネットワーク・権限・not-found など（変換せずにそのまま）
//! - IncompleteTransfer: upload が Completed に到達しなかった
//! - LocalIo: ローカルファイル・トークンキャッシュの I/O

use std::path::PathBuf;
use thiserror::Error;

use super::file::UploadStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    Authorization,
    LookupAmbiguity,
    Transport,
    IncompleteTransfer,
    LocalIo,
}

/// Failure reported by the transport collaborator, surfaced verbatim.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("remote service returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("unexpected response from remote service: {0}")]
    Decode(String),

    #[error("local stream failed during transfer: {0}")]
    Stream(#[from] std::io::Error),
}

impl TransportError {
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            TransportError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

#[derive(Debug, Error)]
pub enum DriveError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("cannot read client secrets from {path}: {source}")]
    SecretsUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid client secrets: {0}")]
    InvalidSecrets(String),

    #[error("authorization failed: {0}")]
    Authorization(String),

    #[error("expected at most one remote file named '{name}', found {count}")]
    AmbiguousName { name: String, count: usize },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("upload of '{name}' did not complete (status: {status:?})")]
    IncompleteUpload {
        name: String,
        status: UploadStatus,
        #[source]
        source: Option<TransportError>,
    },

    #[error("cannot read local file {path}: {source}")]
    LocalFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("token cache at {path} is unusable: {source}")]
    TokenCache {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DriveError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DriveError::Configuration(_)
            | DriveError::SecretsUnreadable { .. }
            | DriveError::InvalidSecrets(_) => ErrorKind::Configuration,
            DriveError::Authorization(_) => ErrorKind::Authorization,
            DriveError::AmbiguousName { .. } => ErrorKind::LookupAmbiguity,
            DriveError::Transport(_) => ErrorKind::Transport,
            DriveError::IncompleteUpload { .. } => ErrorKind::IncompleteTransfer,
            DriveError::LocalFile { .. } | DriveError::TokenCache { .. } => ErrorKind::LocalIo,
        }
    }
}
