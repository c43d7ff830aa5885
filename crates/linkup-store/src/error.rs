//! Data store error types.

use linkup_calendar::CalendarError;
use linkup_core::{AppError, DatabaseError, ValidationError};
use thiserror::Error;

/// Errors that can occur during data store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Row was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rejected input (empty title, end before start, unknown username).
    #[error("Validation error: {0}")]
    Validation(String),

    /// The write clashes with existing state (duplicate member, closed vote).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A stored value could not be read back.
    #[error("Corrupt data: {0}")]
    Corrupt(String),

    /// Storage error (database, background task).
    #[error("Storage error: {0}")]
    Storage(String),

    /// Generic error wrapper.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StoreError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }
}

/// Result type for data store operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::FromSqlConversionFailure(column, _, source) => {
                Self::corrupt(format!("column {}: {}", column, source))
            }
            rusqlite::Error::SqliteFailure(failure, message)
                if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Self::conflict(message.unwrap_or_else(|| failure.to_string()))
            }
            other => Self::storage(other.to_string()),
        }
    }
}

impl From<CalendarError> for StoreError {
    fn from(err: CalendarError) -> Self {
        match err {
            CalendarError::VoteClosed(_) => Self::conflict(err.to_string()),
            other => Self::validation(other.to_string()),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => AppError::Database(DatabaseError::NotFound(what)),
            StoreError::Corrupt(msg) => AppError::Database(DatabaseError::Corruption(msg)),
            StoreError::Storage(msg) => AppError::Database(DatabaseError::QueryFailed(msg)),
            StoreError::Validation(msg) => AppError::Validation(ValidationError::field("input", msg)),
            StoreError::Conflict(msg) => AppError::Service(msg),
            StoreError::Other(e) => AppError::Other(e),
        }
    }
}
