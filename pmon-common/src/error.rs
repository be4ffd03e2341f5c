//! Common error types for the parser monitor

use thiserror::Error;

/// Common result type for monitor operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the monitor crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input or stored value
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error (serialization, invariant breakage)
    #[error("Internal error: {0}")]
    Internal(String),
}
