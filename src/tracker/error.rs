//! Error taxonomy for tracker operations

use thiserror::Error;

/// Errors surfaced by [`TrackerManager`](super::TrackerManager) operations.
///
/// The API layer maps each variant onto an HTTP status; store and blob
/// seams report through `anyhow` and are folded into `Store` / `Upstream`.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Missing or malformed input
    #[error("{0}")]
    Validation(String),

    /// Referenced client, branch, tracker or file does not exist
    #[error("{0}")]
    NotFound(String),

    /// Duplicate creation
    #[error("{0}")]
    Conflict(String),

    /// The blob store rejected or failed a write
    #[error("file storage failed: {0:#}")]
    Upstream(anyhow::Error),

    /// The system cannot proceed without administrator action
    #[error("{0}")]
    FatalConfig(String),

    /// Unexpected document store failure
    #[error("store error: {0:#}")]
    Store(anyhow::Error),
}

impl From<anyhow::Error> for TrackerError {
    fn from(err: anyhow::Error) -> Self {
        TrackerError::Store(err)
    }
}

pub type TrackerResult<T> = std::result::Result<T, TrackerError>;
