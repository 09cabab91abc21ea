//! Error types for the E-number service
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for E-number operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the E-number service
#[derive(Error, Debug)]
pub enum Error {
    /// A record with the same sanitized code already exists
    #[error("E-number already exists: {0}")]
    DuplicateCode(String),

    /// No record matches the requested code
    #[error("E-number not found: {0}")]
    NotFound(String),

    /// Missing or empty required field
    #[error("Validation error: {0}")]
    Validation(String),

    /// Storage read/write failure
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// External catalog call failed or returned a malformed body
    #[error("Fetch error ({provider}): {message}")]
    Fetch {
        /// Catalog name
        provider: String,
        /// Error message
        message: String,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a duplicate code error
    pub fn duplicate_code(code: impl Into<String>) -> Self {
        Self::DuplicateCode(code.into())
    }

    /// Create a "not found" error
    pub fn not_found(code: impl Into<String>) -> Self {
        Self::NotFound(code.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a persistence error
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Create a catalog fetch error
    pub fn fetch(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
