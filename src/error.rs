//! Error types for the location store.

use thiserror::Error;

/// Main error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Activation failed: {0}")]
    Activation(String),

    #[error("Deactivation failed: {0}")]
    Deactivation(String),

    #[error("Invalid location: {0}")]
    InvalidLocation(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
