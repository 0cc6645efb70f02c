//! Error types for the recording store

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Invalid recording id: {0}")]
    InvalidId(String),

    #[error("Recording not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::IoError(e.to_string())
    }
}

/// Disk query and eviction failures.
///
/// The janitor logs these and carries on; they never stop recording.
#[derive(Debug, thiserror::Error)]
pub enum DiskError {
    #[error("Failed to get filesystem stats: {0}")]
    StatvfsFailed(String),

    #[error("Free space queries are not supported on this platform")]
    Unsupported,

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Failed to delete {path}: {reason}")]
    DeleteFailed { path: String, reason: String },
}

impl From<std::io::Error> for DiskError {
    fn from(e: std::io::Error) -> Self {
        DiskError::IoError(e.to_string())
    }
}
