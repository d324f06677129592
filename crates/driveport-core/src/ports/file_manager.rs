//! DriveManager port - 呼び出し側から見た 3 操作の契約
//!
//! StorageClient がこれを実装します。呼び出し側はこの trait に依存すれば、
//! 具体的な transport を知らずに済みます。

use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;

use crate::domain::{DriveError, FileId};

#[async_trait]
pub trait DriveManager: Send + Sync {
    /// 名前（大文字小文字を区別する完全一致）で ID を引く
    ///
    /// - 0 件: `Ok(None)`
    /// - 1 件: `Ok(Some(id))`
    /// - 2 件以上: `DriveError::AmbiguousName`
    async fn resolve_file_id(&self, name: &str) -> Result<Option<FileId>, DriveError>;

    /// ID で内容をまるごと読む
    async fn read_file(&self, id: &FileId) -> Result<Bytes, DriveError>;

    /// `id` なしなら新規作成、ありなら上書き。返り値は新しい ID か、渡した ID
    async fn upload_file(&self, id: Option<&FileId>, path: &Path) -> Result<FileId, DriveError>;
}
