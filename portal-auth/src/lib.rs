//! Portal Auth - accounts, approvals and session tracking
//!
//! This crate implements the authentication layer of the demo portal:
//!
//! - An account store keyed by email, with a student approval workflow
//! - A session table holding one `{userId, isActive}` record per user
//! - An [`AuthContext`] that drives login/logout and periodically re-validates
//!   the current student's session
//!
//! ## Architecture
//!
//! - **Storage** ([`storage`]): a small key-value document store, on disk or in memory
//! - **Backends** ([`account`], [`session`], [`remote`]): local and HTTP implementations
//!   of [`AccountStore`] and [`SessionStore`], selected at construction
//! - **Context** ([`context`], [`provider`]): the state callers observe

pub mod account;
pub mod backend;
pub mod context;
pub mod provider;
pub mod remote;
pub mod session;
pub mod storage;

pub use account::{next_account_id, AccountStore, LocalAccountStore, StoredAccount, UserAccount};
pub use backend::AuthBackend;
pub use context::{AuthContext, AuthState, ContextOptions};
pub use portal_core::Role;
pub use provider::{use_auth, AuthProvider};
pub use remote::{RemoteConfig, RemoteStore};
pub use session::{
    LocalSessionStore, LoginOutcome, MonitorStatus, OperationOutcome, SessionMonitor,
    SessionRecord, SessionStore,
};
pub use storage::{FileStorage, MemoryStorage, Storage};

/// Authentication-layer error type
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Your account is pending approval")]
    AccountPendingApproval,

    #[error("User with this email already exists: {email}")]
    DuplicateEmail { email: String },

    #[error("Transport failure: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Core error: {0}")]
    Core(#[from] portal_core::PortalError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    /// Create a transport error
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Create a transport error with source
    pub fn transport_with_source<S: Into<String>>(
        message: S,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Transport {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Whether the error comes from the storage or network layer rather than
    /// from the outcome of an auth decision
    pub fn is_transport_failure(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::Serialization(_) => true,
            Self::Core(error) => error.is_recoverable(),
            Self::InvalidCredentials
            | Self::AccountPendingApproval
            | Self::DuplicateEmail { .. } => false,
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        let message = match error.status() {
            Some(status) => format!("account service returned {}", status),
            None => format!("account service request failed: {}", error),
        };
        Self::transport_with_source(message, Box::new(error))
    }
}
