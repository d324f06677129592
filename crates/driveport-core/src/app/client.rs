//! StorageClient - 認証済みセッション 1 つに紐づくファサード
//!
//! 3 つの操作（名前で ID を引く、ID で読む、作成/上書き）を DriveManager として提供します。
//! どの操作も 1 回の試行で、失敗はそのまま呼び出し元へ返します。
//!
//! # 使用例
//! ```ignore
//! let client = StorageClient::connect("alice@example.com", "client_secret.json").await?;
//! let id = client.upload_file(None, Path::new("notes.txt")).await?;
//! let bytes = client.read_file(&id).await?;
//! ```

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::app::builder::StorageClientBuilder;
use crate::domain::{
    AccountLabel, ContentType, DriveError, FileId, FileMetadata, TransportError,
};
use crate::impls::GoogleDriveService;
use crate::ports::{DriveManager, DriveService, UploadSource};

pub struct StorageClient<S> {
    account: AccountLabel,
    service: S,
}

impl StorageClient<GoogleDriveService> {
    /// 既定の設定・既定の Authorizer（OAuth2 + ファイルキャッシュ）で接続
    pub async fn connect(
        account: &str,
        secrets_path: impl Into<PathBuf>,
    ) -> Result<Self, DriveError> {
        StorageClientBuilder::new(account, secrets_path).connect().await
    }
}

impl<S: DriveService> StorageClient<S> {
    /// 任意の DriveService（テストでは InMemoryDriveService）で組み立てる
    pub fn with_service(account: AccountLabel, service: S) -> Self {
        Self { account, service }
    }

    pub fn account(&self) -> &AccountLabel {
        &self.account
    }

    pub fn service(&self) -> &S {
        &self.service
    }
}

fn local_file_error(path: &Path, source: std::io::Error) -> DriveError {
    DriveError::LocalFile {
        path: path.to_path_buf(),
        source,
    }
}

#[async_trait]
impl<S: DriveService> DriveManager for StorageClient<S> {
    async fn resolve_file_id(&self, name: &str) -> Result<Option<FileId>, DriveError> {
        let mut matches = Vec::new();
        let mut page_token: Option<String> = None;
        // 一度たどったトークンが再び来たらリスティングは循環している
        let mut seen_tokens = HashSet::new();
        let mut pages = 0usize;

        loop {
            let page = self.service.list_files(page_token.as_deref()).await?;
            pages += 1;
            matches.extend(
                page.files
                    .into_iter()
                    .filter(|file| file.name == name)
                    .map(|file| file.id),
            );

            match page.next_page_token {
                Some(next) if !seen_tokens.insert(next.clone()) => {
                    return Err(TransportError::Decode(format!(
                        "listing repeated page token '{next}'"
                    ))
                    .into());
                }
                Some(next) => page_token = Some(next),
                None => break,
            }
        }
        debug!(account = %self.account, %name, pages, matches = matches.len(), "resolved name");

        match matches.len() {
            0 => Ok(None),
            1 => Ok(matches.pop()),
            count => Err(DriveError::AmbiguousName {
                name: name.to_string(),
                count,
            }),
        }
    }

    async fn read_file(&self, id: &FileId) -> Result<Bytes, DriveError> {
        let bytes = self.service.download(id).await?;
        debug!(account = %self.account, file_id = %id, bytes = bytes.len(), "read file");
        Ok(bytes)
    }

    async fn upload_file(&self, id: Option<&FileId>, path: &Path) -> Result<FileId, DriveError> {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                local_file_error(
                    path,
                    std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
                )
            })?;
        let metadata = FileMetadata::new(name, ContentType::from_path(path));
        let source = UploadSource::open(path)
            .await
            .map_err(|e| local_file_error(path, e))?;

        let outcome = match id {
            None => self.service.create_file(&metadata, source).await,
            Some(id) => self.service.update_file(id, &metadata, source).await,
        };
        if !outcome.status.is_completed() {
            return Err(DriveError::IncompleteUpload {
                name: metadata.name,
                status: outcome.status,
                source: outcome.error,
            });
        }

        let file_id = match id {
            Some(id) => id.clone(),
            None => outcome.file.map(|file| file.id).ok_or_else(|| {
                TransportError::Decode("completed upload returned no file".to_string())
            })?,
        };
        info!(
            account = %self.account,
            file_id = %file_id,
            name = %metadata.name,
            content_type = %metadata.content_type,
            bytes = outcome.bytes_sent,
            created = id.is_none(),
            "uploaded file"
        );
        Ok(file_id)
    }
}
