//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **GoogleDriveService**: Drive v3 REST（本番用）
//! - **InMemoryDriveService**: テスト・開発用のリモートストレージ
//! - **InstalledAppAuthorizer**: OAuth2 installed-app フロー
//! - **StaticAuthorizer**: 取得済みトークンをそのまま使う
//! - **FileTokenStore / InMemoryTokenStore**: 資格情報キャッシュ

pub mod http_drive;
pub mod inmem_drive;
pub mod oauth;
pub mod token_store;

// 主要な型を再エクスポート
pub use self::http_drive::GoogleDriveService;
pub use self::inmem_drive::InMemoryDriveService;
pub use self::oauth::{ConsentPrompt, InstalledAppAuthorizer, StaticAuthorizer, TerminalPrompt};
pub use self::token_store::{FileTokenStore, InMemoryTokenStore};
