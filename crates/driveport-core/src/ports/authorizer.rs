//! Authorizer port - 認可フローの抽象化
//!
//! シークレットとアカウントラベルから再利用可能なセッション資格情報を得ます。
//! トークンの永続キャッシュを持つかどうかは実装次第です。
//!
//! # 実装
//! - **InstalledAppAuthorizer**: OAuth2 installed-app フロー（loopback redirect）
//! - **StaticAuthorizer**: 取得済みのトークンを返すだけ

use async_trait::async_trait;

use crate::domain::{AccountLabel, ClientSecrets, DriveError, SessionCredential};

#[async_trait]
pub trait Authorizer: Send + Sync {
    /// 失敗（拒否・キャンセル・交換エラー）は `DriveError::Authorization`
    async fn authorize(
        &self,
        secrets: &ClientSecrets,
        scopes: &[String],
        account: &AccountLabel,
    ) -> Result<SessionCredential, DriveError>;
}
