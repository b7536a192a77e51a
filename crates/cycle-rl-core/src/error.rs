//! Error types for the cycle RL core

use thiserror::Error;

/// Core error type for learning and notification operations
#[derive(Error, Debug)]
pub enum RLError {
    /// The user has no observation on record, so no state can be encoded
    #[error("State unavailable: no observation on record for user {user}")]
    StateUnavailable {
        /// User the lookup was made for
        user: String,
    },

    /// Feedback referenced a notification that does not exist
    #[error("Notification not found: {0}")]
    NotificationNotFound(u64),

    /// Feedback was already recorded for this notification
    #[error("Feedback already recorded for notification {0}")]
    FeedbackAlreadyRecorded(u64),

    /// The backing store could not complete the operation
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Observation fields out of range
    #[error("Invalid observation: {0}")]
    InvalidObservation(String),

    /// Feedback fields out of range
    #[error("Invalid feedback: {0}")]
    InvalidFeedback(String),

    /// Invalid action
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    /// Invalid state key
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Computation error
    #[error("Computation error: {0}")]
    Computation(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for RL operations
pub type Result<T> = std::result::Result<T, RLError>;
