//! DriveService port - リモートストレージサービス
//!
//! 認証済みセッションに紐づいた 4 つの操作（list / create / update / download）。
//! プロトコルの詳細（HTTP、resumable upload）は実装側に閉じ込めます。
//!
//! # 実装
//! - **GoogleDriveService**: Drive v3 REST（本番用）
//! - **InMemoryDriveService**: テスト用の fake

use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use crate::domain::{FileId, FileListPage, FileMetadata, RemoteFile, TransportError, UploadStatus};

/// ローカルファイルのバイトストリーム
///
/// ハンドルはこの値が所有し、upload 呼び出しに move されます。
/// 呼び出しがどの経路で終わっても drop されるので、ハンドルは必ず解放されます。
#[derive(Debug)]
pub struct UploadSource {
    file: File,
    len: u64,
}

impl UploadSource {
    /// 通常ファイルだけを受け付ける（ディレクトリは InvalidInput）
    pub async fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = File::open(path).await?;
        let metadata = file.metadata().await?;
        if !metadata.is_file() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "not a regular file",
            ));
        }
        Ok(Self {
            file,
            len: metadata.len(),
        })
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn into_file(self) -> File {
        self.file
    }

    /// 全部読み込む（fake 用）
    pub async fn read_all(mut self) -> std::io::Result<Bytes> {
        let mut buf = Vec::with_capacity(self.len as usize);
        self.file.read_to_end(&mut buf).await?;
        Ok(Bytes::from(buf))
    }
}

/// Result of one upload attempt as reported by the transport.
///
/// `status` が `Completed` のときだけ `file` が入ります。
/// それ以外は `error` に transport 側の詳細が入ります（ない場合もある）。
#[derive(Debug)]
pub struct UploadOutcome {
    pub status: UploadStatus,
    pub bytes_sent: u64,
    pub file: Option<RemoteFile>,
    pub error: Option<TransportError>,
}

impl UploadOutcome {
    pub fn completed(file: RemoteFile, bytes_sent: u64) -> Self {
        Self {
            status: UploadStatus::Completed,
            bytes_sent,
            file: Some(file),
            error: None,
        }
    }

    pub fn failed(error: TransportError) -> Self {
        Self {
            status: UploadStatus::Failed,
            bytes_sent: 0,
            file: None,
            error: Some(error),
        }
    }
}

/// The remote storage collaborator.
///
/// # 設計原則
/// - どの呼び出しも 1 回の試行（リトライしない）
/// - エラーは変換せずに TransportError として返す
/// - upload は Result ではなく UploadOutcome を返す（status で成否を判定）
#[async_trait]
pub trait DriveService: Send + Sync {
    /// One page of the files visible to the session.
    async fn list_files(&self, page_token: Option<&str>) -> Result<FileListPage, TransportError>;

    /// Create a new file with the given metadata and content.
    async fn create_file(&self, metadata: &FileMetadata, content: UploadSource) -> UploadOutcome;

    /// Replace content, name and content type of an existing file.
    async fn update_file(
        &self,
        id: &FileId,
        metadata: &FileMetadata,
        content: UploadSource,
    ) -> UploadOutcome;

    /// Full content of a file.
    async fn download(&self, id: &FileId) -> Result<Bytes, TransportError>;
}
