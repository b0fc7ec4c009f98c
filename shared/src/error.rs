//! Error types for the reminder service.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while evaluating and delivering reminders.
#[derive(Error, Debug)]
pub enum Error {
    /// Event store query failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// AWS SDK error
    #[error("AWS error: {0}")]
    Aws(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Event time is not a valid "HH:MM" value
    #[error("Invalid time {value:?} for event {event_id}")]
    InvalidTime { event_id: i64, value: String },

    /// A notification channel failed to deliver
    #[error("{channel} delivery failed: {message}")]
    Delivery {
        channel: &'static str,
        message: String,
    },
}

impl Error {
    /// Build a delivery error for the given channel.
    pub fn delivery(channel: &'static str, message: impl Into<String>) -> Self {
        Error::Delivery {
            channel,
            message: message.into(),
        }
    }
}
