//! TokenStore の実装
//!
//! - **FileTokenStore**: `{dir}/token-{account}.json`、一時ファイル（作成時から 0600）+ rename で書き込み
//! - **InMemoryTokenStore**: テスト用

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::{AccountLabel, DriveError, SessionCredential};
use crate::ports::TokenStore;

fn cache_error(path: &Path, source: std::io::Error) -> DriveError {
    DriveError::TokenCache {
        path: path.to_path_buf(),
        source,
    }
}

/// Persists one credential file per account under a directory.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    dir: PathBuf,
}

impl FileTokenStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, account: &AccountLabel) -> PathBuf {
        self.dir.join(format!("token-{}.json", account.file_stem()))
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self, account: &AccountLabel) -> Result<Option<SessionCredential>, DriveError> {
        let path = self.path_for(account);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(cache_error(&path, e)),
        };
        let credential = serde_json::from_slice(&raw).map_err(|e| {
            cache_error(&path, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        debug!(account = %account, path = %path.display(), "loaded cached credential");
        Ok(Some(credential))
    }

    async fn store(
        &self,
        account: &AccountLabel,
        credential: &SessionCredential,
    ) -> Result<(), DriveError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| cache_error(&self.dir, e))?;

        let path = self.path_for(account);
        let tmp = path.with_extension("json.tmp");
        let raw = serde_json::to_vec_pretty(credential).map_err(|e| {
            cache_error(&path, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;

        // 前回の書き込みの残骸は権限が広いかもしれないので作り直す
        match tokio::fs::remove_file(&tmp).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(cache_error(&tmp, e)),
        }
        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        options.mode(0o600);
        let mut file = options.open(&tmp).await.map_err(|e| cache_error(&tmp, e))?;
        file.write_all(&raw).await.map_err(|e| cache_error(&tmp, e))?;
        file.sync_all().await.map_err(|e| cache_error(&tmp, e))?;
        drop(file);

        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| cache_error(&path, e))?;

        debug!(account = %account, path = %path.display(), "stored credential");
        Ok(())
    }

    async fn clear(&self, account: &AccountLabel) -> Result<(), DriveError> {
        let path = self.path_for(account);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(cache_error(&path, e)),
        }
    }
}

/// Process-local credential cache.
#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    tokens: Mutex<HashMap<AccountLabel, SessionCredential>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn load(&self, account: &AccountLabel) -> Result<Option<SessionCredential>, DriveError> {
        Ok(self.tokens.lock().await.get(account).cloned())
    }

    async fn store(
        &self,
        account: &AccountLabel,
        credential: &SessionCredential,
    ) -> Result<(), DriveError> {
        self.tokens
            .lock()
            .await
            .insert(account.clone(), credential.clone());
        Ok(())
    }

    async fn clear(&self, account: &AccountLabel) -> Result<(), DriveError> {
        self.tokens.lock().await.remove(account);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn account() -> AccountLabel {
        AccountLabel::parse("alice@example.com").unwrap()
    }

    fn credential() -> SessionCredential {
        let mut credential = SessionCredential::bearer("access")
            .expiring_in(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(), 3600);
        credential.refresh_token = Some("refresh".to_string());
        credential
    }

    #[tokio::test]
    async fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("nested").join("cache");

        FileTokenStore::new(&cache)
            .store(&account(), &credential())
            .await
            .unwrap();

        let loaded = FileTokenStore::new(&cache).load(&account()).await.unwrap();
        assert_eq!(loaded, Some(credential()));
        assert!(cache.join("token-alice_example.com.json").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn file_store_restricts_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path());
        store.store(&account(), &credential()).await.unwrap();

        let mode = std::fs::metadata(store.path_for(&account()))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stale_temp_file_is_recreated_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path());
        let tmp = store.path_for(&account()).with_extension("json.tmp");
        std::fs::write(&tmp, b"leftover").unwrap();
        std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o644)).unwrap();

        store.store(&account(), &credential()).await.unwrap();

        assert!(!tmp.exists());
        let path = store.path_for(&account());
        assert_eq!(std::fs::metadata(&path).unwrap().permissions().mode() & 0o777, 0o600);
        assert_eq!(store.load(&account()).await.unwrap(), Some(credential()));
    }

    #[tokio::test]
    async fn file_store_missing_entry_is_none_and_clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path());

        assert_eq!(store.load(&account()).await.unwrap(), None);
        store.clear(&account()).await.unwrap();

        store.store(&account(), &credential()).await.unwrap();
        store.clear(&account()).await.unwrap();
        assert_eq!(store.load(&account()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_store_rejects_corrupt_cache() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path());
        tokio::fs::write(store.path_for(&account()), b"{not json")
            .await
            .unwrap();

        let err = store.load(&account()).await.unwrap_err();
        assert!(matches!(err, DriveError::TokenCache { .. }));
    }

    #[tokio::test]
    async fn in_memory_store_round_trip() {
        let store = InMemoryTokenStore::new();
        store.store(&account(), &credential()).await.unwrap();
        assert_eq!(store.load(&account()).await.unwrap(), Some(credential()));
        store.clear(&account()).await.unwrap();
        assert_eq!(store.load(&account()).await.unwrap(), None);
    }
}
