//! Remote file model.
//!
//! A file has a name, an identifier and bytes. The name is a best-effort,
//! non-unique lookup key; the identifier is the only stable reference.

use serde::{Deserialize, Serialize};

use super::content_type::ContentType;
use super::ids::FileId;

/// A file as listed by the remote service (content not included).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    pub id: FileId,
    pub name: String,
    pub content_type: ContentType,
}

/// Metadata sent with create/update.
///
/// update でも name と content_type は上書きされる。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub name: String,
    pub content_type: ContentType,
}

impl FileMetadata {
    pub fn new(name: impl Into<String>, content_type: ContentType) -> Self {
        Self {
            name: name.into(),
            content_type,
        }
    }
}

/// One page of the listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileListPage {
    pub files: Vec<RemoteFile>,
    pub next_page_token: Option<String>,
}

impl FileListPage {
    pub fn is_last(&self) -> bool {
        self.next_page_token.is_none()
    }
}

/// Upload progress as reported by the transport.
///
/// `Completed` 以外はすべて失敗扱い。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    NotStarted,
    Starting,
    Uploading,
    Completed,
    Failed,
}

impl UploadStatus {
    pub fn is_completed(self) -> bool {
        matches!(self, UploadStatus::Completed)
    }
}
