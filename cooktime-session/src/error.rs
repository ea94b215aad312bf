//! Error types for cooktime-session
//!
//! Adds storage, timer and audio failures on top of the shared
//! [`cooktime_common::Error`].

use thiserror::Error;

/// Main error type for the session engine and its adapters
#[derive(Error, Debug)]
pub enum Error {
    /// User-correctable precondition failure; nothing was changed
    #[error("{0}")]
    Validation(String),

    /// Unknown meal, dish or stage
    #[error("Not found: {0}")]
    NotFound(String),

    /// Database connection or query errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Timer facility refused to schedule
    #[error("Timer error: {0}")]
    Timer(String),

    /// Audio output device errors
    #[error("Audio error: {0}")]
    Audio(String),

    /// Persisted document could not be read or written
    #[error("Storage error: {0}")]
    Storage(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors raised by the shared library (model, normalization, config)
    #[error(transparent)]
    Common(#[from] cooktime_common::Error),
}

/// Coarse classification used for status codes and CLI exit messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    MalformedInput,
    NotFound,
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        use cooktime_common::Error as CommonError;

        match self {
            Error::Validation(_) | Error::Common(CommonError::Validation(_)) => ErrorKind::Validation,
            Error::Common(CommonError::MalformedInput(_)) => ErrorKind::MalformedInput,
            Error::NotFound(_) | Error::Common(CommonError::NotFound(_)) => ErrorKind::NotFound,
            _ => ErrorKind::Internal,
        }
    }
}

/// Convenience Result type using the cooktime-session Error
pub type Result<T> = std::result::Result<T, Error>;
