//! Error types for the refresh coordinator

use thiserror::Error;

/// Outcome of a failed reload. Reported on the feedback surface, never
/// retried automatically.
#[derive(Error, Debug)]
pub enum CoordinatorError {
    /// The reload callback returned an error
    #[error("Reload of {consumer} failed: {source}")]
    ReloadFailed {
        consumer: String,
        #[source]
        source: anyhow::Error,
    },

    /// The reload callback panicked
    #[error("Reload of {consumer} panicked")]
    ReloadPanicked { consumer: String },
}

pub type Result<T> = std::result::Result<T, CoordinatorError>;
