//! Common error types for Meat-A-Eye

use thiserror::Error;

/// Common result type for Meat-A-Eye operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across Meat-A-Eye services
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

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rejected input (bad date ordering, missing name, malformed trace number)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Caller does not own the resource it tried to mutate
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for SQLite lock contention, the only database error worth retrying
    pub fn is_lock_contention(&self) -> bool {
        match self {
            Error::Database(db_err) => db_err.to_string().contains("database is locked"),
            _ => false,
        }
    }
}
