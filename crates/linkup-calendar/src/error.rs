//! Calendar-specific error types.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Invalid time range: {0}")]
    InvalidTimeRange(String),

    #[error("Invalid event data: {0}")]
    InvalidEventData(String),

    #[error("Invalid grid range: {0}")]
    InvalidGridRange(String),

    #[error("Vote {0} is not active")]
    VoteClosed(String),
}

impl CalendarError {
    /// User-friendly error message for UI display.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidTimestamp(value) => format!("Could not read the date \"{}\"", value),
            Self::InvalidTimeRange(_) => "The end time must be after the start time".to_string(),
            Self::InvalidEventData(msg) => format!("Invalid event: {}", msg),
            Self::InvalidGridRange(_) => "That part of the calendar can't be shown".to_string(),
            Self::VoteClosed(_) => "This vote is no longer accepting responses".to_string(),
        }
    }

    /// Whether the error comes from user input rather than stored data.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidTimeRange(_) | Self::InvalidEventData(_) | Self::InvalidTimestamp(_)
        )
    }
}
