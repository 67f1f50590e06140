//! Account store over the local `app_users` document
//!
//! Every mutation reads the whole table, modifies it and writes it back.
//! Two writers racing on the same storage lose updates (last write wins).

use super::{next_account_id, AccountStore, StoredAccount, UserAccount};
use crate::storage::{read_json, write_json, Storage, USERS_KEY};
use crate::{AuthError, AuthResult};
use async_trait::async_trait;
use portal_core::SeedAccount;
use std::sync::Arc;
use tracing::{debug, info};

pub struct LocalAccountStore {
    storage: Arc<dyn Storage>,
}

impl LocalAccountStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Full account table; a missing table reads as empty
    pub async fn load(&self) -> AuthResult<Vec<StoredAccount>> {
        Ok(read_json(self.storage.as_ref(), USERS_KEY)
            .await?
            .unwrap_or_default())
    }

    async fn save(&self, accounts: &[StoredAccount]) -> AuthResult<()> {
        write_json(self.storage.as_ref(), USERS_KEY, accounts).await?;
        debug!("Saved {} accounts", accounts.len());
        Ok(())
    }
}

#[async_trait]
impl AccountStore for LocalAccountStore {
    async fn find_by_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> AuthResult<Option<UserAccount>> {
        let accounts = self.load().await?;
        Ok(accounts
            .iter()
            .find(|account| account.matches(email, password))
            .map(StoredAccount::to_public))
    }

    async fn find_by_email(&self, email: &str) -> AuthResult<Option<UserAccount>> {
        let accounts = self.load().await?;
        Ok(accounts
            .iter()
            .find(|account| account.email == email)
            .map(StoredAccount::to_public))
    }

    async fn add(
        &self,
        email: &str,
        password: &str,
        auto_approve: bool,
    ) -> AuthResult<UserAccount> {
        let mut accounts = self.load().await?;

        if accounts.iter().any(|account| account.email == email) {
            debug!("Rejected duplicate account: {}", email);
            return Err(AuthError::DuplicateEmail {
                email: email.to_string(),
            });
        }

        let id = next_account_id(accounts.iter().map(|account| &account.id));
        let account = StoredAccount::student(id, email, password, auto_approve);
        let public = account.to_public();

        accounts.push(account);
        self.save(&accounts).await?;

        info!(id, email, approved = auto_approve, "Added student account");
        Ok(public)
    }

    async fn remove(&self, email: &str) -> AuthResult<()> {
        let mut accounts = self.load().await?;
        let before = accounts.len();
        accounts.retain(|account| account.email != email);

        // Rewritten even when nothing matched
        self.save(&accounts).await?;

        if accounts.len() < before {
            info!(email, "Removed account");
        }
        Ok(())
    }

    async fn approve(&self, email: &str) -> AuthResult<()> {
        let mut accounts = self.load().await?;

        match accounts.iter_mut().find(|account| account.email == email) {
            Some(account) => {
                account.approved = true;
                self.save(&accounts).await?;
                info!(email, "Approved account");
            }
            None => debug!("Approve ignored, no account for {}", email),
        }
        Ok(())
    }

    async fn list_all(&self) -> AuthResult<Vec<UserAccount>> {
        let accounts = self.load().await?;
        Ok(accounts.iter().map(StoredAccount::to_public).collect())
    }

    async fn seed(&self, accounts: &[SeedAccount]) -> AuthResult<bool> {
        if self.storage.get_item(USERS_KEY).await?.is_some() {
            return Ok(false);
        }

        let seeded: Vec<StoredAccount> = accounts.iter().map(StoredAccount::from).collect();
        self.save(&seeded).await?;

        info!("Seeded account table with {} accounts", seeded.len());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use portal_core::{default_seed_accounts, Role};

    fn store() -> (Arc<MemoryStorage>, LocalAccountStore) {
        let storage = Arc::new(MemoryStorage::new());
        let store = LocalAccountStore::new(storage.clone());
        (storage, store)
    }

    #[tokio::test]
    async fn test_seed_only_when_table_missing() {
        let (storage, store) = store();

        assert!(store.seed(&default_seed_accounts()).await.unwrap());
        assert_eq!(store.list_all().await.unwrap().len(), 2);

        // An existing table, even an empty one, is never reseeded
        storage.set_item(USERS_KEY, "[]").await.unwrap();
        assert!(!store.seed(&default_seed_accounts()).await.unwrap());
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_allocates_next_id_after_gap() {
        let (_, store) = store();
        let table = vec![
            StoredAccount::student(1, "a@x.com", "a", true),
            StoredAccount::student(2, "b@x.com", "b", true),
            StoredAccount::student(4, "d@x.com", "d", true),
        ];
        store.save(&table).await.unwrap();

        let added = store.add("e@x.com", "e", false).await.unwrap();
        assert_eq!(added.id, 5);
        assert_eq!(added.role, Role::Student);
        assert!(!added.approved);
    }

    #[tokio::test]
    async fn test_add_to_empty_store_starts_at_one() {
        let (_, store) = store();
        let added = store.add("first@x.com", "pw", true).await.unwrap();
        assert_eq!(added.id, 1);
        assert!(added.approved);
    }

    #[tokio::test]
    async fn test_duplicate_email_leaves_store_untouched() {
        let (storage, store) = store();
        store.seed(&default_seed_accounts()).await.unwrap();
        let before = storage.get_item(USERS_KEY).await.unwrap();

        let err = store
            .add("test@gmail.com", "other", true)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::DuplicateEmail { ref email } if email == "test@gmail.com"));

        assert_eq!(storage.get_item(USERS_KEY).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_find_by_credentials_exact_match() {
        let (_, store) = store();
        store.seed(&default_seed_accounts()).await.unwrap();

        let found = store
            .find_by_credentials("test@gmail.com", "test123")
            .await
            .unwrap();
        assert_eq!(found.map(|a| a.id), Some(2));

        for (email, password) in [
            ("TEST@gmail.com", "test123"),
            ("test@gmail.com", "TEST123"),
            ("test@gmail.com", "admin123"),
            ("missing@gmail.com", "test123"),
        ] {
            assert!(store
                .find_by_credentials(email, password)
                .await
                .unwrap()
                .is_none());
        }
    }

    #[tokio::test]
    async fn test_approve_and_reject() {
        let (_, store) = store();
        store.add("s@x.com", "spw", false).await.unwrap();

        store.approve("s@x.com").await.unwrap();
        assert!(store.find_by_email("s@x.com").await.unwrap().unwrap().approved);

        // Unknown emails are a no-op
        store.approve("ghost@x.com").await.unwrap();

        store.reject("s@x.com").await.unwrap();
        assert!(store.find_by_email("s@x.com").await.unwrap().is_none());
        store.reject("s@x.com").await.unwrap();
        assert!(store.list_all().await.unwrap().is_empty());
    }
}
