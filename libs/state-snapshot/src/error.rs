//! Error types for snapshot storage

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Snapshot storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SnapshotError>;
