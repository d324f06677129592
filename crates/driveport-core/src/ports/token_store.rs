//! TokenStore port - 資格情報の永続キャッシュ
//!
//! # 実装
//! - **FileTokenStore**: アカウントごとに JSON ファイル
//! - **InMemoryTokenStore**: プロセス内のみ

use async_trait::async_trait;

use crate::domain::{AccountLabel, DriveError, SessionCredential};

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn load(&self, account: &AccountLabel) -> Result<Option<SessionCredential>, DriveError>;

    async fn store(
        &self,
        account: &AccountLabel,
        credential: &SessionCredential,
    ) -> Result<(), DriveError>;

    /// 存在しなくてもエラーにしない
    async fn clear(&self, account: &AccountLabel) -> Result<(), DriveError>;
}
