//! Error types for the notification store

use thiserror::Error;

/// Failures of the notification backend
#[derive(Error, Debug)]
pub enum ApiError {
    /// Transport or decoding failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status
    #[error("Notification API returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Backend unreachable for any other reason
    #[error("Notification API unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Notification not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Api(#[from] ApiError),
}

pub type Result<T> = std::result::Result<T, StoreError>;
