//! Error types for the mail pit.

use thiserror::Error;

/// Error label used by the Resend-style validation body.
pub const VALIDATION_ERROR_KIND: &str = "validation_error";

/// Main error type for mail pit operations.
#[derive(Debug, Error)]
pub enum PitError {
    /// An inbound payload was malformed or incomplete.
    #[error("{message}")]
    Validation {
        status: u16,
        message: String,
        kind: String,
    },

    #[error("Delivery to subscriber failed: {0}")]
    Transport(String),

    #[error("Malformed stream message: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Subscription was dropped")]
    SubscriptionDropped,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PitError {
    /// A 422 validation error labelled `validation_error`.
    pub fn validation(message: impl Into<String>) -> Self {
        PitError::Validation {
            status: 422,
            message: message.into(),
            kind: VALIDATION_ERROR_KIND.to_string(),
        }
    }

    /// A validation error with an explicit status and error-kind label.
    pub fn validation_with(status: u16, kind: impl Into<String>, message: impl Into<String>) -> Self {
        PitError::Validation {
            status,
            message: message.into(),
            kind: kind.into(),
        }
    }
}

impl From<serde_json::Error> for PitError {
    fn from(e: serde_json::Error) -> Self {
        PitError::Parse(e.to_string())
    }
}

/// Result type for mail pit operations.
pub type Result<T> = std::result::Result<T, PitError>;
