//! Account records and the account store abstraction

pub mod local;

pub use local::LocalAccountStore;

use crate::AuthResult;
use async_trait::async_trait;
use portal_core::{Role, SeedAccount};
use serde::{Deserialize, Serialize};

/// Public, password-stripped view of an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    pub id: u64,
    pub email: String,
    pub role: Role,
    pub approved: bool,
}

impl UserAccount {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_student(&self) -> bool {
        self.role == Role::Student
    }

    /// Students waiting for an admin decision
    pub fn is_pending_student(&self) -> bool {
        self.is_student() && !self.approved
    }

    pub fn is_approved_student(&self) -> bool {
        self.is_student() && self.approved
    }
}

/// Account as persisted in the local account table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAccount {
    pub id: u64,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub approved: bool,
}

impl StoredAccount {
    /// New student account
    pub fn student(id: u64, email: &str, password: &str, approved: bool) -> Self {
        Self {
            id,
            email: email.to_string(),
            password: password.to_string(),
            role: Role::Student,
            approved,
        }
    }

    /// Exact, case-sensitive credential comparison
    pub fn matches(&self, email: &str, password: &str) -> bool {
        self.email == email && self.password == password
    }

    /// Drop the password
    pub fn to_public(&self) -> UserAccount {
        UserAccount {
            id: self.id,
            email: self.email.clone(),
            role: self.role,
            approved: self.approved,
        }
    }
}

impl From<&SeedAccount> for StoredAccount {
    fn from(seed: &SeedAccount) -> Self {
        Self {
            id: seed.id,
            email: seed.email.clone(),
            password: seed.password.clone(),
            role: seed.role,
            approved: seed.approved,
        }
    }
}

/// Id for the next account: one past the largest id in use, or 1 for an empty table
pub fn next_account_id<'a, I>(ids: I) -> u64
where
    I: IntoIterator<Item = &'a u64>,
{
    ids.into_iter().copied().max().unwrap_or(0) + 1
}

/// Account store capability set shared by the local and remote backends
///
/// Passwords never leave the store: lookups return [`UserAccount`].
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Account whose email and password both match exactly
    async fn find_by_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> AuthResult<Option<UserAccount>>;

    /// Account registered under `email`
    async fn find_by_email(&self, email: &str) -> AuthResult<Option<UserAccount>>;

    /// Insert a new student account.
    ///
    /// Fails with [`AuthError::DuplicateEmail`](crate::AuthError::DuplicateEmail)
    /// when the email is taken, leaving the store untouched.
    async fn add(&self, email: &str, password: &str, auto_approve: bool)
        -> AuthResult<UserAccount>;

    /// Delete the account; absent emails are ignored
    async fn remove(&self, email: &str) -> AuthResult<()>;

    /// Mark the account approved; absent emails are ignored
    async fn approve(&self, email: &str) -> AuthResult<()>;

    /// Reject a registration. Rejection deletes the account.
    async fn reject(&self, email: &str) -> AuthResult<()> {
        self.remove(email).await
    }

    /// Every account in the store
    async fn list_all(&self) -> AuthResult<Vec<UserAccount>>;

    /// Write `accounts` if the store has never been initialized.
    ///
    /// Returns whether seeding happened. Stores that are provisioned elsewhere
    /// ignore this.
    async fn seed(&self, _accounts: &[SeedAccount]) -> AuthResult<bool> {
        Ok(false)
    }
}
