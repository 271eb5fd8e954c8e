//! The error taxonomy shared by every module in this crate

use thiserror::Error;

/// Errors that can arise while reconciling a single mapping, or loading configuration
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("unknown account '{0}'")]
    AccountNotFound(String),

    #[error("calendar '{calendar}' not found for account '{account}'")]
    CalendarNotFound { account: String, calendar: String },

    #[error("backend error ({account}/{calendar}): {source}")]
    Backend {
        account: String,
        calendar: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A create collided with an existing uid. Recognized internally by the executor
    /// (falls back to update) and should not normally escape to a caller.
    #[error("duplicate uid '{0}' on create")]
    DuplicateUid(String),

    #[error("could not decode event: {0}")]
    Codec(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("state file error: {0}")]
    State(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;
