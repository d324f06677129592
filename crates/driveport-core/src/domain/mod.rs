//! Domain model (IDs, files, content types, credentials, errors).
//!
//! ここには I/O を持たない型だけを置きます（例外: シークレット記述子の読み込み）。

pub mod content_type;
pub mod credential;
pub mod errors;
pub mod file;
pub mod ids;

pub use self::content_type::{ContentType, UNKNOWN_CONTENT_TYPE};
pub use self::credential::{ClientSecrets, SCOPE_DRIVE, SCOPE_DRIVE_FILE, SessionCredential};
pub use self::errors::{DriveError, ErrorKind, TransportError};
pub use self::file::{FileListPage, FileMetadata, RemoteFile, UploadStatus};
pub use self::ids::{AccountLabel, FileId};
