//! Key-value document storage
//!
//! The local backend keeps three independent JSON documents, one per key.
//! [`FileStorage`] writes each key to `<dir>/<key>.json`; [`MemoryStorage`]
//! keeps them in a map for tests and ephemeral runs.

use crate::AuthResult;
use async_trait::async_trait;
use portal_core::storage_error;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Key of the account table
pub const USERS_KEY: &str = "app_users";
/// Key of the cached, password-stripped current user
pub const CURRENT_USER_KEY: &str = "current_user";
/// Key of the session table
pub const SESSIONS_KEY: &str = "user_sessions";

/// String-valued document store
#[async_trait]
pub trait Storage: Send + Sync {
    /// Raw document stored under `key`, if any
    async fn get_item(&self, key: &str) -> AuthResult<Option<String>>;

    /// Replace the document stored under `key`
    async fn set_item(&self, key: &str, value: &str) -> AuthResult<()>;

    /// Delete the document stored under `key`; absent keys are ignored
    async fn remove_item(&self, key: &str) -> AuthResult<()>;
}

/// Read and deserialize the document under `key`
pub async fn read_json<T: DeserializeOwned>(
    storage: &dyn Storage,
    key: &str,
) -> AuthResult<Option<T>> {
    match storage.get_item(key).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Serialize `value` and store it under `key`
pub async fn write_json<T: Serialize + ?Sized>(
    storage: &dyn Storage,
    key: &str,
    value: &T,
) -> AuthResult<()> {
    let raw = serde_json::to_string(value)?;
    storage.set_item(key, &raw).await
}

/// Directory-backed storage, one JSON file per key
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Create a storage rooted at `dir`, creating the directory if needed
    pub async fn open<P: AsRef<Path>>(dir: P) -> AuthResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            storage_error!(
                format!("Failed to create {}", dir.display()),
                "open",
                e
            )
        })?;

        info!("Portal storage initialized at: {}", dir.display());

        Ok(Self { dir })
    }

    /// Storage directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> AuthResult<PathBuf> {
        if key.is_empty()
            || !key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            let error = storage_error!(format!("invalid storage key: {:?}", key), "resolve_key");
            return Err(error.into());
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn get_item(&self, key: &str) -> AuthResult<Option<String>> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => {
                debug!("Read {} from {}", key, path.display());
                Ok(Some(raw))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_error!(format!("Failed to read {}", key), "read", e).into()),
        }
    }

    async fn set_item(&self, key: &str, value: &str) -> AuthResult<()> {
        let path = self.path_for(key)?;
        // Each write stages into its own file; concurrent writers never share one
        let staging = self
            .dir
            .join(format!(".{}.{}.tmp", key, uuid::Uuid::new_v4().simple()));

        if let Err(e) = tokio::fs::write(&staging, value).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(storage_error!(format!("Failed to write {}", key), "write", e).into());
        }
        if let Err(e) = tokio::fs::rename(&staging, &path).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(storage_error!(format!("Failed to replace {}", key), "write", e).into());
        }

        debug!("Wrote {} to {}", key, path.display());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> AuthResult<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Removed {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error!(format!("Failed to remove {}", key), "remove", e).into()),
        }
    }
}

/// In-memory storage
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get_item(&self, key: &str) -> AuthResult<Option<String>> {
        Ok(self.items.read().await.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> AuthResult<()> {
        self.items
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> AuthResult<()> {
        self.items.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AuthError;
    use portal_core::PortalError;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_file_storage_set_get_remove() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path().join("profile")).await.unwrap();

        assert_eq!(storage.get_item(USERS_KEY).await.unwrap(), None);

        storage.set_item(USERS_KEY, "[]").await.unwrap();
        assert_eq!(
            storage.get_item(USERS_KEY).await.unwrap().as_deref(),
            Some("[]")
        );
        assert!(dir.path().join("profile").join("app_users.json").exists());

        storage.remove_item(USERS_KEY).await.unwrap();
        assert_eq!(storage.get_item(USERS_KEY).await.unwrap(), None);

        // Removing twice is fine
        storage.remove_item(USERS_KEY).await.unwrap();
    }

    #[tokio::test]
    async fn test_file_storage_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).await.unwrap();

        let err = storage.get_item("../escape").await.unwrap_err();
        assert!(err.is_transport_failure());
        assert!(matches!(
            err,
            AuthError::Core(PortalError::Storage { .. })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_to_one_key_all_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(FileStorage::open(dir.path()).await.unwrap());

        let writers: Vec<_> = (0..16)
            .map(|i| {
                let storage = storage.clone();
                tokio::spawn(async move {
                    let doc = format!("[{{\"userId\":{},\"isActive\":true}}]", i);
                    storage.set_item(SESSIONS_KEY, &doc).await
                })
            })
            .collect();

        for writer in writers {
            writer.await.unwrap().unwrap();
        }

        // Last write wins; whatever landed is one whole document
        let stored: Vec<serde_json::Value> = read_json(storage.as_ref(), SESSIONS_KEY)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.len(), 1);

        let leftovers = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_unwritable_directory_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path().join("gone")).await.unwrap();
        std::fs::remove_dir(dir.path().join("gone")).unwrap();

        match storage.set_item(USERS_KEY, "[]").await {
            Err(AuthError::Core(PortalError::Storage { context, .. })) => {
                assert_eq!(context.operation.as_deref(), Some("write"));
            }
            other => panic!("Expected storage error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_json_helpers() {
        let storage = MemoryStorage::new();

        let missing: Option<Vec<u64>> = read_json(&storage, SESSIONS_KEY).await.unwrap();
        assert!(missing.is_none());

        write_json(&storage, SESSIONS_KEY, &vec![1u64, 2, 3])
            .await
            .unwrap();
        let stored: Option<Vec<u64>> = read_json(&storage, SESSIONS_KEY).await.unwrap();
        assert_eq!(stored, Some(vec![1, 2, 3]));

        storage.set_item(SESSIONS_KEY, "{not json").await.unwrap();
        let corrupt: AuthResult<Option<Vec<u64>>> = read_json(&storage, SESSIONS_KEY).await;
        assert!(matches!(corrupt, Err(AuthError::Serialization(_))));
    }
}
