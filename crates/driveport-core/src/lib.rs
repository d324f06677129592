//! driveport-core
//!
//! Client facade over a cloud file-storage service (Google Drive v3):
//! authenticate once, then upload, resolve by name and download by id.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, file, content_type, credential, errors）
//! - **ports**: 抽象化レイヤー（DriveService, Authorizer, TokenStore, DriveManager, Clock）
//! - **impls**: 実装（GoogleDriveService, InMemoryDriveService, InstalledAppAuthorizer, FileTokenStore など）
//! - **app**: StorageClientBuilder と StorageClient
//! - **config**: ClientConfig

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;

pub use app::{StorageClient, StorageClientBuilder};
pub use config::ClientConfig;
pub use domain::{DriveError, ErrorKind, FileId};
pub use ports::DriveManager;
