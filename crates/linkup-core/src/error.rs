//! Centralized error types for the LinkUp application.
//!
//! This module provides a typed error hierarchy that:
//! - Enables precise error handling throughout the codebase
//! - Provides user-friendly messages suitable for UI display
//! - Preserves full error context for debugging/logging

use thiserror::Error;

/// Top-level application error type.
///
/// Crate-level errors (calendar validation, data store) convert into this
/// type at the application boundary. Use `user_message()` for display.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A write that clashes with current state (closed vote, duplicate member,
    /// repeated friend request).
    #[error("Service error: {0}")]
    Service(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Returns a user-friendly message suitable for display in the UI.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Database(e) => e.user_message(),
            AppError::Config(e) => e.user_message(),
            AppError::Validation(e) => e.user_message(),
            AppError::Service(_) => "That change conflicts with newer data. Refresh and try again.",
            AppError::Other(_) => "An unexpected error occurred. Please try again.",
        }
    }
}

/// Database/storage errors (SQLite, local state).
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Data corruption detected: {0}")]
    Corruption(String),

    #[error("Record not found: {0}")]
    NotFound(String),
}

impl DatabaseError {
    pub fn user_message(&self) -> &'static str {
        match self {
            DatabaseError::QueryFailed(_) => "A data operation failed. Please try again.",
            DatabaseError::Corruption(_) => {
                "Local data may be corrupted. Consider resetting app data."
            }
            DatabaseError::NotFound(_) => "The requested item no longer exists.",
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Missing required setting: {0}")]
    MissingSetting(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
            ConfigError::MissingSetting(_) => "A required setting is missing. Check your settings.",
        }
    }
}

/// Rejected user input.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid field {field}: {message}")]
    Field { field: String, message: String },
}

impl ValidationError {
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationError::Field {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            ValidationError::Field { .. } => "Please check the highlighted fields.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages_are_non_empty() {
        let errors = vec![
            AppError::Database(DatabaseError::QueryFailed("test".into())),
            AppError::Config(ConfigError::Invalid("test".into())),
            AppError::Validation(ValidationError::field("title", "test")),
            AppError::Service("boom".into()),
            AppError::Other(anyhow::anyhow!("boom")),
        ];

        for err in errors {
            assert!(!err.user_message().is_empty());
        }
    }

    #[test]
    fn test_app_error_conversion() {
        let err = ConfigError::MissingSetting("viewer.user_id".into());
        let app_err: AppError = err.into();
        assert!(matches!(
            app_err,
            AppError::Config(ConfigError::MissingSetting(_))
        ));
        assert_eq!(
            app_err.user_message(),
            "A required setting is missing. Check your settings."
        );
    }

    #[test]
    fn test_user_message_propagation() {
        let app_err = AppError::Database(DatabaseError::Corruption("bad row".into()));
        assert_eq!(
            app_err.user_message(),
            "Local data may be corrupted. Consider resetting app data."
        );
    }

    #[test]
    fn test_field_error_display() {
        let err = ValidationError::field("title", "cannot be empty");
        assert_eq!(err.to_string(), "Invalid field title: cannot be empty");
    }
}
