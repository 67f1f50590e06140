//! Core data type definitions

use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Student,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Student => write!(f, "student"),
        }
    }
}

/// Top-level portal configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    pub backend: BackendConfig,
    #[serde(default)]
    pub session: SessionSettings,
    /// Accounts written to an empty local store on first start
    #[serde(default = "default_seed_accounts")]
    pub seed_accounts: Vec<SeedAccount>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where accounts and sessions live
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    /// JSON documents under a local data directory
    Local { data_dir: String },
    /// HTTP account service
    Remote {
        base_url: String,
        #[serde(default = "default_timeout_seconds")]
        timeout_seconds: u64,
        #[serde(default = "default_user_agent")]
        user_agent: String,
        /// Directory for the locally cached current user
        #[serde(default = "default_cache_dir")]
        cache_dir: String,
    },
}

/// Session liveness settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Seconds between two liveness checks of a student session
    pub poll_interval_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
        }
    }
}

/// Account definition used to bootstrap an empty store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedAccount {
    pub id: u64,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub approved: bool,
}

pub(crate) fn default_timeout_seconds() -> u64 {
    30
}

pub(crate) fn default_user_agent() -> String {
    "portal/0.1".to_string()
}

pub(crate) fn default_cache_dir() -> String {
    "~/.portal/cache".to_string()
}

pub fn default_seed_accounts() -> Vec<SeedAccount> {
    vec![
        SeedAccount {
            id: 1,
            email: "admin@jee.com".to_string(),
            password: "admin123".to_string(),
            role: Role::Admin,
            approved: true,
        },
        SeedAccount {
            id: 2,
            email: "test@gmail.com".to_string(),
            password: "test123".to_string(),
            role: Role::Student,
            approved: true,
        },
    ]
}
