//! Backend selection
//!
//! Bundles the account store, the session store and the local cache that
//! holds the current user. The local variant serves all three from one
//! storage; the remote variant talks HTTP for accounts and sessions and keeps
//! only the current-user cache on disk.

use crate::account::{AccountStore, LocalAccountStore};
use crate::remote::{RemoteConfig, RemoteStore};
use crate::session::{LocalSessionStore, SessionStore};
use crate::storage::{FileStorage, Storage};
use crate::AuthResult;
use portal_core::{expand_home, BackendConfig, PortalConfig};
use std::sync::Arc;

#[derive(Clone)]
pub struct AuthBackend {
    pub accounts: Arc<dyn AccountStore>,
    pub sessions: Arc<dyn SessionStore>,
    /// Holds the cached current user
    pub cache: Arc<dyn Storage>,
}

impl AuthBackend {
    /// Accounts, sessions and cache in one local storage
    pub fn local(storage: Arc<dyn Storage>) -> Self {
        Self {
            accounts: Arc::new(LocalAccountStore::new(storage.clone())),
            sessions: Arc::new(LocalSessionStore::new(storage.clone())),
            cache: storage,
        }
    }

    /// Accounts and sessions from the account service, cache in `cache`
    pub fn remote(config: RemoteConfig, cache: Arc<dyn Storage>) -> AuthResult<Self> {
        let store = Arc::new(RemoteStore::new(config)?);
        Ok(Self {
            accounts: store.clone(),
            sessions: store,
            cache,
        })
    }

    /// Build the backend selected by `config`
    pub async fn from_config(config: &PortalConfig) -> AuthResult<Self> {
        match &config.backend {
            BackendConfig::Local { data_dir } => {
                let storage = FileStorage::open(expand_home(data_dir)).await?;
                Ok(Self::local(Arc::new(storage)))
            }
            BackendConfig::Remote {
                base_url,
                timeout_seconds,
                user_agent,
                cache_dir,
            } => {
                let cache = FileStorage::open(expand_home(cache_dir)).await?;
                let remote = RemoteConfig::new(base_url.as_str())
                    .with_timeout(*timeout_seconds)
                    .with_user_agent(user_agent.as_str());
                Self::remote(remote, Arc::new(cache))
            }
        }
    }
}
