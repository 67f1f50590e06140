//! Configuration management

use crate::error::{ErrorContext, PortalError, PortalResult};
use crate::types::{default_seed_accounts, BackendConfig, PortalConfig, Role, SessionSettings};

use std::collections::HashSet;
use std::path::{Path, PathBuf};

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::Local {
                data_dir: "~/.portal/data".to_string(),
            },
            session: SessionSettings::default(),
            seed_accounts: default_seed_accounts(),
            logging: crate::LoggingConfig::default(),
        }
    }
}

impl PortalConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> PortalResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| PortalError::Config {
            message: format!("Failed to read config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("read_file")
                .with_suggestion("Check if the config file exists and is readable"),
        })?;

        let config: PortalConfig = toml::from_str(&content).map_err(|e| PortalError::Config {
            message: format!("Failed to parse config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("parse_toml")
                .with_suggestion("Check TOML syntax in config file"),
        })?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> PortalResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| PortalError::Config {
            message: format!("Failed to serialize config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config").with_operation("serialize_toml"),
        })?;

        std::fs::write(path, content).map_err(|e| PortalError::Config {
            message: format!("Failed to write config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("write_file")
                .with_suggestion("Check if the directory exists and is writable"),
        })?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> PortalResult<()> {
        if self.session.poll_interval_secs == 0 {
            return Err(PortalError::Config {
                message: "session.poll_interval_secs must be greater than 0".to_string(),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Set session.poll_interval_secs to a positive value"),
            });
        }

        match &self.backend {
            BackendConfig::Local { data_dir } if data_dir.trim().is_empty() => {
                return Err(PortalError::Config {
                    message: "backend.data_dir must not be empty".to_string(),
                    source: None,
                    context: ErrorContext::new("config").with_operation("validate"),
                });
            }
            BackendConfig::Remote { base_url, .. }
                if !(base_url.starts_with("http://") || base_url.starts_with("https://")) =>
            {
                return Err(PortalError::Config {
                    message: format!("backend.base_url is not an http(s) URL: {}", base_url),
                    source: None,
                    context: ErrorContext::new("config")
                        .with_operation("validate")
                        .with_suggestion("Example: base_url = \"http://127.0.0.1:8080/api\""),
                });
            }
            _ => {}
        }

        let mut emails = HashSet::new();
        let mut ids = HashSet::new();
        for account in &self.seed_accounts {
            if !emails.insert(account.email.as_str()) || !ids.insert(account.id) {
                return Err(PortalError::Config {
                    message: format!("Duplicate seed account: {}", account.email),
                    source: None,
                    context: ErrorContext::new("config")
                        .with_operation("validate")
                        .with_suggestion("Seed account ids and emails must be unique"),
                });
            }
        }

        if !self
            .seed_accounts
            .iter()
            .any(|account| account.role == Role::Admin)
        {
            tracing::warn!("No admin seed account configured; approvals will need a remote admin");
        }

        Ok(())
    }

    /// Directory holding local documents: the whole store for the local
    /// backend, only the current-user cache for the remote one
    pub fn storage_dir(&self) -> PathBuf {
        match &self.backend {
            BackendConfig::Local { data_dir } => expand_home(data_dir),
            BackendConfig::Remote { cache_dir, .. } => expand_home(cache_dir),
        }
    }
}

/// Expand a leading `~` to the user's home directory
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix('~') {
        Some(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest.trim_start_matches(['/', '\\'])),
            None => PathBuf::from(path),
        },
        None => PathBuf::from(path),
    }
}
