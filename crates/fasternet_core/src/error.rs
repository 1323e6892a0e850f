use serde::{Deserialize, Serialize};
use std::fmt;

pub const INVALID_INCIDENT_TYPE: &str = "INVALID_INCIDENT_TYPE";
pub const CONFIRMATION_MISMATCH: &str = "CONFIRMATION_MISMATCH";
pub const MISSING_REQUIRED_FIELD: &str = "MISSING_REQUIRED_FIELD";
pub const INVALID_TIMESTAMP: &str = "INVALID_TIMESTAMP";
pub const CARD_DELETED: &str = "CARD_DELETED";
pub const AUTH_FAILED: &str = "AUTH_FAILED";
pub const AUTH_REQUIRED: &str = "AUTH_REQUIRED";
pub const NOT_FOUND: &str = "DB_NOT_FOUND";

/// Single structured error shape shared by the core, the store backends and the CLI.
///
/// `code` is stable and machine-readable; `message` is for humans.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppError {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
    pub retryable: bool,
}

impl AppError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            retryable: false,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn missing_field(field: &str) -> Self {
        Self::new(MISSING_REQUIRED_FIELD, format!("{field} is required"))
            .with_details(format!("field={field}"))
    }

    pub fn not_found(what: &str, id: i64) -> Self {
        Self::new(NOT_FOUND, format!("{what} not found")).with_details(format!("id={id}"))
    }

    pub fn is(&self, code: &str) -> bool {
        self.code == code
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}
