//! InMemoryDriveService - テスト・開発用のリモートストレージ
//!
//! # 実装詳細
//! - `Vec<StoredFile>` で挿入順を保持（リスティングの順序が安定する）
//! - tokio の Mutex で排他制御
//! - `with_page_size` でページングを再現できる
//! - `reject_uploads` で upload を Failed にできる
//! - ID は ULID（時刻は Clock から取るので FixedClock で timestamp を固定できる）

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Mutex;
use ulid::Ulid;

use crate::domain::{ContentType, FileId, FileListPage, FileMetadata, RemoteFile, TransportError};
use crate::ports::{Clock, DriveService, SystemClock, UploadOutcome, UploadSource};

#[derive(Debug, Clone)]
struct StoredFile {
    id: FileId,
    name: String,
    content_type: ContentType,
    content: Bytes,
}

impl StoredFile {
    fn describe(&self) -> RemoteFile {
        RemoteFile {
            id: self.id.clone(),
            name: self.name.clone(),
            content_type: self.content_type.clone(),
        }
    }
}

#[derive(Default)]
struct State {
    files: Vec<StoredFile>,
    reject_uploads: bool,
}

/// In-memory stand-in for the remote storage service.
///
/// # 使用例
/// ```ignore
/// let service = InMemoryDriveService::new().with_page_size(2);
/// let client = StorageClient::with_service(account, service);
/// ```
pub struct InMemoryDriveService<C = SystemClock> {
    state: Mutex<State>,
    clock: C,
    page_size: Option<usize>,
}

impl InMemoryDriveService {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for InMemoryDriveService {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> InMemoryDriveService<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            state: Mutex::new(State::default()),
            clock,
            page_size: None,
        }
    }

    /// リモートサービスが割り当てるのと同じく、不透明な ID を払い出す
    fn assign_id(&self) -> FileId {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        FileId::from(Ulid::from_parts(timestamp_ms, rand::random()))
    }

    /// リスティングを `page_size` 件ずつに分ける（0 は 1 として扱う）
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size.max(1));
        self
    }

    /// 以降の create/update を Failed にする
    pub async fn reject_uploads(&self, reject: bool) {
        self.state.lock().await.reject_uploads = reject;
    }

    /// 事前にファイルを置く（同名も許す）
    pub async fn seed(&self, name: &str, content: impl Into<Bytes>) -> FileId {
        let id = self.assign_id();
        self.state.lock().await.files.push(StoredFile {
            id: id.clone(),
            name: name.to_string(),
            content_type: ContentType::from_path(name),
            content: content.into(),
        });
        id
    }

    pub async fn file(&self, id: &FileId) -> Option<RemoteFile> {
        let state = self.state.lock().await;
        state.files.iter().find(|f| &f.id == id).map(StoredFile::describe)
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.files.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn not_found(id: &FileId) -> TransportError {
    TransportError::Status {
        status: 404,
        message: format!("File not found: {id}."),
    }
}

fn rejected() -> TransportError {
    TransportError::Status {
        status: 503,
        message: "upload rejected".to_string(),
    }
}

fn bad_page_token(token: &str) -> TransportError {
    TransportError::Status {
        status: 400,
        message: format!("Invalid page token: {token}"),
    }
}

#[async_trait]
impl<C: Clock> DriveService for InMemoryDriveService<C> {
    async fn list_files(&self, page_token: Option<&str>) -> Result<FileListPage, TransportError> {
        let state = self.state.lock().await;

        let start = match page_token {
            None => 0,
            Some(token) => token.parse::<usize>().map_err(|_| bad_page_token(token))?,
        };
        if start > state.files.len() {
            return Err(bad_page_token(&start.to_string()));
        }

        let end = match self.page_size {
            Some(size) => (start + size).min(state.files.len()),
            None => state.files.len(),
        };
        let files = state.files[start..end].iter().map(StoredFile::describe).collect();
        let next_page_token = (end < state.files.len()).then(|| end.to_string());

        Ok(FileListPage {
            files,
            next_page_token,
        })
    }

    async fn create_file(&self, metadata: &FileMetadata, content: UploadSource) -> UploadOutcome {
        if self.state.lock().await.reject_uploads {
            return UploadOutcome::failed(rejected());
        }
        let content = match content.read_all().await {
            Ok(content) => content,
            Err(e) => return UploadOutcome::failed(TransportError::Stream(e)),
        };

        let stored = StoredFile {
            id: self.assign_id(),
            name: metadata.name.clone(),
            content_type: metadata.content_type.clone(),
            content,
        };
        let bytes_sent = stored.content.len() as u64;
        let file = stored.describe();
        self.state.lock().await.files.push(stored);

        UploadOutcome::completed(file, bytes_sent)
    }

    async fn update_file(
        &self,
        id: &FileId,
        metadata: &FileMetadata,
        content: UploadSource,
    ) -> UploadOutcome {
        if self.state.lock().await.reject_uploads {
            return UploadOutcome::failed(rejected());
        }
        let content = match content.read_all().await {
            Ok(content) => content,
            Err(e) => return UploadOutcome::failed(TransportError::Stream(e)),
        };

        let mut state = self.state.lock().await;
        let Some(stored) = state.files.iter_mut().find(|f| &f.id == id) else {
            return UploadOutcome::failed(not_found(id));
        };
        stored.name = metadata.name.clone();
        stored.content_type = metadata.content_type.clone();
        stored.content = content;

        UploadOutcome::completed(stored.describe(), stored.content.len() as u64)
    }

    async fn download(&self, id: &FileId) -> Result<Bytes, TransportError> {
        let state = self.state.lock().await;
        state
            .files
            .iter()
            .find(|f| &f.id == id)
            .map(|f| f.content.clone())
            .ok_or_else(|| not_found(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UploadStatus;
    use crate::ports::FixedClock;
    use chrono::{TimeZone, Utc};

    async fn source(dir: &tempfile::TempDir, name: &str, content: &[u8]) -> UploadSource {
        let path = dir.path().join(name);
        tokio::fs::write(&path, content).await.unwrap();
        UploadSource::open(&path).await.unwrap()
    }

    #[tokio::test]
    async fn create_then_download() {
        let dir = tempfile::tempdir().unwrap();
        let service = InMemoryDriveService::new();
        let meta = FileMetadata::new("a.txt", ContentType::from_path("a.txt"));

        let outcome = service.create_file(&meta, source(&dir, "a.txt", b"hello").await).await;
        assert_eq!(outcome.status, UploadStatus::Completed);
        assert_eq!(outcome.bytes_sent, 5);

        let file = outcome.file.unwrap();
        assert_eq!(file.name, "a.txt");
        assert_eq!(service.download(&file.id).await.unwrap(), Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn assigned_ids_are_unique_ulids_stamped_by_the_clock() {
        let fixed_time = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let service = InMemoryDriveService::with_clock(FixedClock::new(fixed_time));

        let id1 = service.seed("a.txt", Bytes::new()).await;
        let id2 = service.seed("a.txt", Bytes::new()).await;

        // ランダム部分があるので ID は異なる
        assert_ne!(id1, id2);
        for id in [&id1, &id2] {
            let ulid = Ulid::from_string(id.as_str()).unwrap();
            assert_eq!(ulid.timestamp_ms(), fixed_time.timestamp_millis() as u64);
        }
    }

    #[tokio::test]
    async fn update_missing_file_fails_with_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let service = InMemoryDriveService::new();
        let meta = FileMetadata::new("a.txt", ContentType::from_path("a.txt"));
        let missing = FileId::parse("missing").unwrap();

        let outcome = service
            .update_file(&missing, &meta, source(&dir, "a.txt", b"x").await)
            .await;
        assert_eq!(outcome.status, UploadStatus::Failed);
        assert!(outcome.error.unwrap().is_not_found());
    }

    #[tokio::test]
    async fn rejected_uploads_report_failed_status() {
        let dir = tempfile::tempdir().unwrap();
        let service = InMemoryDriveService::new();
        service.reject_uploads(true).await;
        let meta = FileMetadata::new("a.txt", ContentType::from_path("a.txt"));

        let outcome = service.create_file(&meta, source(&dir, "a.txt", b"x").await).await;
        assert_eq!(outcome.status, UploadStatus::Failed);
        assert!(service.is_empty().await);
    }

    #[tokio::test]
    async fn listing_is_paged_in_insertion_order() {
        let service = InMemoryDriveService::new().with_page_size(2);
        for name in ["a", "b", "c", "d", "e"] {
            service.seed(name, Bytes::new()).await;
        }

        let mut names = Vec::new();
        let mut token: Option<String> = None;
        let mut pages = 0;
        loop {
            let page = service.list_files(token.as_deref()).await.unwrap();
            pages += 1;
            names.extend(page.files.iter().map(|f| f.name.clone()));
            match page.next_page_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        assert_eq!(pages, 3);
        assert_eq!(names, vec!["a", "b", "c", "d", "e"]);
    }

    #[tokio::test]
    async fn invalid_page_token_is_a_transport_error() {
        let service = InMemoryDriveService::new();
        let err = service.list_files(Some("bogus")).await.unwrap_err();
        assert_eq!(err.status(), Some(400));
    }

    #[tokio::test]
    async fn download_unknown_id_is_not_found() {
        let service = InMemoryDriveService::new();
        let err = service
            .download(&FileId::parse("nope").unwrap())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
