//! StorageClientBuilder - クライアントの構築とワイヤリング
//!
//! # Fail-fast 設計
//! 次の順で検証し、最初の失敗で止まります。
//! 1. 設定値とアカウントラベル
//! 2. シークレット記述子の読み込み（ここまでネットワークアクセスなし）
//! 3. 認可（Authorizer）
//! 4. GoogleDriveService の構築

use std::path::PathBuf;
use tracing::info;

use crate::app::client::StorageClient;
use crate::config::ClientConfig;
use crate::domain::{AccountLabel, ClientSecrets, DriveError};
use crate::impls::{FileTokenStore, GoogleDriveService, InstalledAppAuthorizer};
use crate::ports::Authorizer;

/// # 使用例
/// ```ignore
/// let client = StorageClientBuilder::new("alice@example.com", "client_secret.json")
///     .config(config)
///     .connect()
///     .await?;
/// ```
pub struct StorageClientBuilder {
    account: String,
    secrets_path: PathBuf,
    config: ClientConfig,
    authorizer: Option<Box<dyn Authorizer>>,
}

impl StorageClientBuilder {
    pub fn new(account: impl Into<String>, secrets_path: impl Into<PathBuf>) -> Self {
        Self {
            account: account.into(),
            secrets_path: secrets_path.into(),
            config: ClientConfig::default(),
            authorizer: None,
        }
    }

    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// 既定は InstalledAppAuthorizer + FileTokenStore
    pub fn authorizer(mut self, authorizer: impl Authorizer + 'static) -> Self {
        self.authorizer = Some(Box::new(authorizer));
        self
    }

    pub async fn connect(self) -> Result<StorageClient<GoogleDriveService>, DriveError> {
        self.config.validate()?;
        let account = AccountLabel::parse(&self.account)?;
        let secrets = ClientSecrets::load(&self.secrets_path).await?;

        let authorizer = match self.authorizer {
            Some(authorizer) => authorizer,
            None => {
                let cache_dir = self.config.resolved_token_cache_dir()?;
                Box::new(InstalledAppAuthorizer::new(FileTokenStore::new(cache_dir)))
            }
        };
        let credential = authorizer
            .authorize(&secrets, &self.config.scopes, &account)
            .await?;

        let service = GoogleDriveService::new(credential, &self.config)?;
        info!(account = %account, "storage client connected");
        Ok(StorageClient::with_service(account, service))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ErrorKind, SessionCredential};
    use crate::impls::StaticAuthorizer;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 呼ばれた回数だけ数える Authorizer
    #[derive(Clone, Default)]
    struct CountingAuthorizer {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Authorizer for CountingAuthorizer {
        async fn authorize(
            &self,
            _secrets: &ClientSecrets,
            _scopes: &[String],
            _account: &AccountLabel,
        ) -> Result<SessionCredential, DriveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(DriveError::Authorization("user cancelled".to_string()))
        }
    }

    fn secrets_file(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("client_secret.json");
        std::fs::write(
            &path,
            r#"{"installed": {"client_id": "cid", "client_secret": "cs"}}"#,
        )
        .unwrap();
        path
    }

    #[tokio::test]
    async fn unreadable_secrets_fail_before_authorization() {
        let authorizer = CountingAuthorizer::default();
        let result = StorageClientBuilder::new("alice", "/no/such/client_secret.json")
            .authorizer(authorizer.clone())
            .connect()
            .await;

        let err = result.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(matches!(err, DriveError::SecretsUnreadable { .. }));
        assert_eq!(authorizer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn invalid_config_fails_before_reading_secrets() {
        let authorizer = CountingAuthorizer::default();
        let config = ClientConfig {
            list_page_size: 0,
            ..ClientConfig::default()
        };
        let result = StorageClientBuilder::new("alice", "/no/such/client_secret.json")
            .config(config)
            .authorizer(authorizer.clone())
            .connect()
            .await;

        assert!(matches!(result, Err(DriveError::Configuration(_))));
        assert_eq!(authorizer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn blank_account_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = StorageClientBuilder::new("  ", secrets_file(&dir))
            .authorizer(CountingAuthorizer::default())
            .connect()
            .await;

        assert!(matches!(result, Err(DriveError::Configuration(_))));
    }

    #[tokio::test]
    async fn authorization_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let authorizer = CountingAuthorizer::default();
        let result = StorageClientBuilder::new("alice", secrets_file(&dir))
            .authorizer(authorizer.clone())
            .connect()
            .await;

        let err = result.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Authorization);
        assert_eq!(authorizer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn connect_binds_the_authorized_session() {
        let dir = tempfile::tempdir().unwrap();
        let client = StorageClientBuilder::new("alice", secrets_file(&dir))
            .authorizer(StaticAuthorizer::new(SessionCredential::bearer("session")))
            .connect()
            .await
            .unwrap();

        assert_eq!(client.account().as_str(), "alice");
        assert_eq!(client.service().credential().access_token, "session");
    }
}
