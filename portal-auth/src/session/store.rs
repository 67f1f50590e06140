//! Session table
//!
//! At most one record per user id. Login upserts the record to active,
//! logout flips it inactive; records are never deleted.

use super::SessionRecord;
use crate::storage::{read_json, write_json, Storage, SESSIONS_KEY};
use crate::AuthResult;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Session table capability set shared by the local and remote backends
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Upsert the user's record with `isActive = true`
    async fn activate(&self, user_id: u64) -> AuthResult<()>;

    /// Set the user's record inactive; users without a record are ignored
    async fn deactivate(&self, user_id: u64) -> AuthResult<()>;

    /// The user's record, if one was ever created
    async fn get(&self, user_id: u64) -> AuthResult<Option<SessionRecord>>;

    /// Whether the user has an active record
    async fn is_active(&self, user_id: u64) -> AuthResult<bool> {
        Ok(self
            .get(user_id)
            .await?
            .is_some_and(|record| record.is_active))
    }
}

/// Session table over the local `user_sessions` document
pub struct LocalSessionStore {
    storage: Arc<dyn Storage>,
}

impl LocalSessionStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Full session table; a missing table reads as empty
    pub async fn records(&self) -> AuthResult<Vec<SessionRecord>> {
        Ok(read_json(self.storage.as_ref(), SESSIONS_KEY)
            .await?
            .unwrap_or_default())
    }

    async fn save(&self, records: &[SessionRecord]) -> AuthResult<()> {
        write_json(self.storage.as_ref(), SESSIONS_KEY, records).await
    }
}

#[async_trait]
impl SessionStore for LocalSessionStore {
    async fn activate(&self, user_id: u64) -> AuthResult<()> {
        let mut records = self.records().await?;

        match records.iter_mut().find(|record| record.user_id == user_id) {
            Some(record) => record.is_active = true,
            None => records.push(SessionRecord::active(user_id)),
        }

        self.save(&records).await?;
        debug!(user_id, "Session activated");
        Ok(())
    }

    async fn deactivate(&self, user_id: u64) -> AuthResult<()> {
        let mut records = self.records().await?;

        for record in records.iter_mut().filter(|record| record.user_id == user_id) {
            record.is_active = false;
        }

        self.save(&records).await?;
        debug!(user_id, "Session deactivated");
        Ok(())
    }

    async fn get(&self, user_id: u64) -> AuthResult<Option<SessionRecord>> {
        let records = self.records().await?;
        Ok(records.into_iter().find(|record| record.user_id == user_id))
    }
}
