//! GoogleDriveService - Drive v3 REST の DriveService 実装
//!
//! # エンドポイント
//! - list: `GET {api}/files`
//! - download: `GET {api}/files/{id}?alt=media`（チャンクごとに読み込む）
//! - create: `POST {upload}/files?uploadType=resumable` → `PUT {session}`
//! - update: `PATCH {upload}/files/{id}?uploadType=resumable` → `PUT {session}`
//!
//! upload は resumable セッションを開始し、内容を 1 回の PUT で送ります。
//! 途中再開はしません（失敗したらその呼び出しは Failed）。

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use reqwest::{Body, Client, Method, Response, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::domain::{
    ContentType, DriveError, FileId, FileListPage, FileMetadata, RemoteFile, SessionCredential,
    TransportError,
};
use crate::ports::{DriveService, UploadOutcome, UploadSource};

const LIST_FIELDS: &str = "nextPageToken,files(id,name,mimeType)";
const UPLOAD_FIELDS: &str = "id,name,mimeType";
const HEADER_UPLOAD_CONTENT_TYPE: &str = "X-Upload-Content-Type";
const HEADER_UPLOAD_CONTENT_LENGTH: &str = "X-Upload-Content-Length";
const MAX_PREALLOCATED_BYTES: u64 = 8 << 20;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileResource {
    id: String,
    name: String,
    #[serde(default)]
    mime_type: Option<String>,
}

impl FileResource {
    fn into_remote(self) -> Result<RemoteFile, TransportError> {
        let id = FileId::from_remote(self.id)
            .ok_or_else(|| TransportError::Decode("file resource without id".to_string()))?;
        Ok(RemoteFile {
            id,
            name: self.name,
            content_type: self
                .mime_type
                .map(ContentType::new)
                .unwrap_or_else(ContentType::unknown),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<FileResource>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileResourceBody<'a> {
    name: &'a str,
    mime_type: &'a str,
}

/// 宣言された Content-Length は上限までしか先に確保しない
fn preallocation(declared: Option<u64>) -> usize {
    let capped = declared.unwrap_or(0).min(MAX_PREALLOCATED_BYTES);
    usize::try_from(capped).unwrap_or(0)
}

/// `{"error": {"code": 404, "message": "File not found: x."}}`
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// 2xx 以外を TransportError::Status に（Google のエラー JSON ならその message を使う）
async fn check(response: Response) -> Result<Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(envelope) => envelope.error.message,
        Err(_) if body.trim().is_empty() => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
        Err(_) => body,
    };
    Err(TransportError::Status {
        status: status.as_u16(),
        message,
    })
}

fn endpoint(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    // cannot_be_a_base は構築時に弾いている
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

/// Drive v3 client bound to one session credential.
pub struct GoogleDriveService {
    http: Client,
    credential: SessionCredential,
    api_base: Url,
    upload_base: Url,
    page_size: u32,
}

impl GoogleDriveService {
    pub fn new(credential: SessionCredential, config: &ClientConfig) -> Result<Self, DriveError> {
        config.validate()?;

        let mut builder = Client::builder().user_agent(config.application_name.clone());
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| DriveError::Configuration(format!("cannot build http client: {e}")))?;

        let parse = |url: &str| {
            Url::parse(url).map_err(|e| DriveError::Configuration(format!("'{url}': {e}")))
        };

        Ok(Self {
            http,
            credential,
            api_base: parse(&config.api_base_url)?,
            upload_base: parse(&config.upload_base_url)?,
            page_size: config.list_page_size,
        })
    }

    pub fn credential(&self) -> &SessionCredential {
        &self.credential
    }

    /// resumable セッションを開始して session URI を返す
    async fn start_session(
        &self,
        method: Method,
        url: Url,
        metadata: &FileMetadata,
        len: u64,
    ) -> Result<String, TransportError> {
        let body = FileResourceBody {
            name: &metadata.name,
            mime_type: metadata.content_type.as_str(),
        };
        let response = self
            .http
            .request(method, url)
            .query(&[("uploadType", "resumable"), ("fields", UPLOAD_FIELDS)])
            .header(AUTHORIZATION, self.credential.authorization_header())
            .header(HEADER_UPLOAD_CONTENT_TYPE, metadata.content_type.as_str())
            .header(HEADER_UPLOAD_CONTENT_LENGTH, len)
            .json(&body)
            .send()
            .await?;
        let response = check(response).await?;

        response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                TransportError::Decode("resumable session response without Location".to_string())
            })
    }

    async fn send_content(
        &self,
        session_uri: &str,
        metadata: &FileMetadata,
        content: UploadSource,
    ) -> Result<RemoteFile, TransportError> {
        let len = content.len();
        let response = self
            .http
            .put(session_uri)
            .header(AUTHORIZATION, self.credential.authorization_header())
            .header(CONTENT_TYPE, metadata.content_type.as_str())
            .header(CONTENT_LENGTH, len)
            .body(Body::from(content.into_file()))
            .send()
            .await?;
        let response = check(response).await?;

        let resource: FileResource = response
            .json()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))?;
        resource.into_remote()
    }

    async fn upload(
        &self,
        method: Method,
        url: Url,
        metadata: &FileMetadata,
        content: UploadSource,
    ) -> UploadOutcome {
        let len = content.len();
        debug!(name = %metadata.name, content_type = %metadata.content_type, bytes = len, %method, "starting resumable upload");

        let session_uri = match self.start_session(method, url, metadata, len).await {
            Ok(uri) => uri,
            Err(e) => {
                warn!(name = %metadata.name, error = %e, "upload session was not started");
                return UploadOutcome::failed(e);
            }
        };

        match self.send_content(&session_uri, metadata, content).await {
            Ok(file) => {
                info!(file_id = %file.id, name = %file.name, bytes = len, "upload completed");
                UploadOutcome::completed(file, len)
            }
            Err(e) => {
                warn!(name = %metadata.name, error = %e, "upload did not complete");
                UploadOutcome::failed(e)
            }
        }
    }
}

#[async_trait]
impl DriveService for GoogleDriveService {
    async fn list_files(&self, page_token: Option<&str>) -> Result<FileListPage, TransportError> {
        let mut request = self
            .http
            .get(endpoint(&self.api_base, &["files"]))
            .header(AUTHORIZATION, self.credential.authorization_header())
            .query(&[
                ("pageSize", self.page_size.to_string()),
                ("fields", LIST_FIELDS.to_string()),
            ]);
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }
        debug!(page_token = ?page_token, "listing files");

        let response = check(request.send().await?).await?;
        let list: FileList = response
            .json()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))?;

        let files = list
            .files
            .into_iter()
            .map(FileResource::into_remote)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(FileListPage {
            files,
            next_page_token: list.next_page_token.filter(|t| !t.is_empty()),
        })
    }

    async fn create_file(&self, metadata: &FileMetadata, content: UploadSource) -> UploadOutcome {
        let url = endpoint(&self.upload_base, &["files"]);
        self.upload(Method::POST, url, metadata, content).await
    }

    async fn update_file(
        &self,
        id: &FileId,
        metadata: &FileMetadata,
        content: UploadSource,
    ) -> UploadOutcome {
        let url = endpoint(&self.upload_base, &["files", id.as_str()]);
        self.upload(Method::PATCH, url, metadata, content).await
    }

    async fn download(&self, id: &FileId) -> Result<Bytes, TransportError> {
        debug!(file_id = %id, "downloading file");
        let response = self
            .http
            .get(endpoint(&self.api_base, &["files", id.as_str()]))
            .header(AUTHORIZATION, self.credential.authorization_header())
            .query(&[("alt", "media")])
            .send()
            .await?;
        let mut response = check(response).await?;

        let mut buf = BytesMut::with_capacity(preallocation(response.content_length()));
        while let Some(chunk) = response.chunk().await? {
            buf.extend_from_slice(&chunk);
        }
        debug!(file_id = %id, bytes = buf.len(), "download finished");
        Ok(buf.freeze())
    }
}
