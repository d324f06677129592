//! Ports - 抽象化レイヤー
//!
//! 外部の協力者（リモートストレージ、認可サーバー、トークンキャッシュ、時計）への
//! インターフェースです。実装は `impls` にあります。

pub mod authorizer;
pub mod clock;
pub mod drive_service;
pub mod file_manager;
pub mod token_store;

// 主要な trait を再エクスポート
pub use self::authorizer::Authorizer;
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::drive_service::{DriveService, UploadOutcome, UploadSource};
pub use self::file_manager::DriveManager;
pub use self::token_store::TokenStore;
