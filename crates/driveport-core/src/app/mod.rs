//! App - アプリケーション層
//!
//! ports を組み合わせて、呼び出し側に見せるクライアントを組み立てます。
//!
//! # 主要コンポーネント
//! - **StorageClientBuilder**: 設定・シークレット・認可のワイヤリング（fail-fast）
//! - **StorageClient**: 3 操作のファサード（DriveManager の実装）

pub mod builder;
pub mod client;

// 主要な型を再エクスポート
pub use self::builder::StorageClientBuilder;
pub use self::client::StorageClient;
