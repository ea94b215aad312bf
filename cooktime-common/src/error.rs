//! Common error types for Cooktime

use thiserror::Error;

/// Common result type for Cooktime operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the Cooktime crates
#[derive(Error, Debug)]
pub enum Error {
    /// User-correctable precondition failure (nothing was mutated)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Input document rejected before it reached the catalog
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Requested meal, dish or stage not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True for errors the user can fix and retry (validation and bad input)
    pub fn is_user_facing(&self) -> bool {
        matches!(self, Error::Validation(_) | Error::MalformedInput(_))
    }
}
