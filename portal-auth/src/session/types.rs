//! Session Types and Structures

use serde::{Deserialize, Serialize};

pub const LOGIN_SUCCESS_MESSAGE: &str = "Login successful";
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid email or password";
pub const PENDING_APPROVAL_MESSAGE: &str = "Your account is pending approval";
pub const STUDENT_ADDED_MESSAGE: &str = "Student added successfully";
pub const DUPLICATE_EMAIL_MESSAGE: &str = "User with this email already exists";
pub const TRANSPORT_FAILURE_MESSAGE: &str = "Unable to reach the account service";

/// One row of the session table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub user_id: u64,
    pub is_active: bool,
}

impl SessionRecord {
    pub fn active(user_id: u64) -> Self {
        Self {
            user_id,
            is_active: true,
        }
    }
}

/// Result of a login attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_admin: Option<bool>,
}

impl LoginOutcome {
    pub fn success(is_admin: bool) -> Self {
        Self {
            success: true,
            message: LOGIN_SUCCESS_MESSAGE.to_string(),
            is_admin: Some(is_admin),
        }
    }

    pub fn failure<S: Into<String>>(message: S) -> Self {
        Self {
            success: false,
            message: message.into(),
            is_admin: None,
        }
    }
}

/// Result of an account mutation reported back to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationOutcome {
    pub success: bool,
    pub message: String,
}

impl OperationOutcome {
    pub fn success<S: Into<String>>(message: S) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure<S: Into<String>>(message: S) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}
