//! Error types shared by the portal crates
//!
//! Every variant carries an [`ErrorContext`] naming where the failure happened
//! and what the user can do about it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type PortalResult<T> = Result<T, PortalError>;

/// Where an error happened and how to recover from it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Unique id, printed in logs so a report can be matched to its cause
    pub error_id: String,
    pub timestamp: DateTime<Utc>,
    /// Subsystem that raised the error, e.g. `config` or `storage`
    pub component: String,
    pub operation: Option<String>,
    pub recovery_suggestions: Vec<String>,
}

impl ErrorContext {
    pub fn new(component: &str) -> Self {
        Self {
            error_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            component: component.to_string(),
            operation: None,
            recovery_suggestions: Vec::new(),
        }
    }

    pub fn with_operation(mut self, operation: &str) -> Self {
        self.operation = Some(operation.to_string());
        self
    }

    pub fn with_suggestion(mut self, suggestion: &str) -> Self {
        self.recovery_suggestions.push(suggestion.to_string());
        self
    }
}

#[derive(Error, Debug)]
pub enum PortalError {
    /// Unreadable or inconsistent configuration
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    /// Local document storage could not be read or written
    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    /// A caller-supplied value is out of range
    #[error("Invalid {field}: {message}")]
    Validation {
        message: String,
        field: String,
        context: ErrorContext,
    },
}

impl PortalError {
    pub fn context(&self) -> &ErrorContext {
        match self {
            PortalError::Config { context, .. }
            | PortalError::Storage { context, .. }
            | PortalError::Validation { context, .. } => context,
        }
    }

    /// Storage failures may go away on retry; bad input never does
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PortalError::Storage { .. })
    }
}

/// Storage failure during `$operation`, optionally wrapping its cause
#[macro_export]
macro_rules! storage_error {
    ($msg:expr, $operation:expr) => {
        $crate::PortalError::Storage {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new("storage").with_operation($operation),
        }
    };
    ($msg:expr, $operation:expr, $source:expr) => {
        $crate::PortalError::Storage {
            message: $msg.to_string(),
            source: Some(Box::new($source)),
            context: $crate::ErrorContext::new("storage")
                .with_operation($operation)
                .with_suggestion("Check that the data directory exists and is writable"),
        }
    };
}

#[macro_export]
macro_rules! validation_error {
    ($msg:expr, $field:expr, $component:expr) => {
        $crate::PortalError::Validation {
            message: $msg.to_string(),
            field: $field.to_string(),
            context: $crate::ErrorContext::new($component),
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_is_recoverable() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error = storage_error!("Failed to write app_users", "write", io);

        assert!(error.is_recoverable());
        assert_eq!(error.context().component, "storage");
        assert_eq!(error.context().operation.as_deref(), Some("write"));
        assert_eq!(error.context().recovery_suggestions.len(), 1);
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn test_validation_error_names_field() {
        let error = validation_error!("must be greater than 0", "poll_interval", "auth_context");

        assert!(!error.is_recoverable());
        assert_eq!(error.to_string(), "Invalid poll_interval: must be greater than 0");
        assert!(!error.context().error_id.is_empty());
    }
}
