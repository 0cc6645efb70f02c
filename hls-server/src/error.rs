use config_manager::ConfigError;
use recording_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HlsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Recording not found: {0}")]
    RecordingNotFound(String),

    #[error("Invalid recording id: {0}")]
    InvalidRecording(String),

    #[error("Segment not found: {0}")]
    SegmentNotFound(String),

    #[error("Invalid segment: {0}")]
    InvalidSegment(String),

    #[error("Duration probe failed: {0}")]
    Probe(String),

    #[error("Segment extraction failed: {0}")]
    Extraction(String),

    #[error("Settings error: {0}")]
    Settings(#[from] ConfigError),

    #[error("Pipeline controller is not running")]
    ControllerGone,

    #[error("Background task failed: {0}")]
    Task(String),
}

impl From<StoreError> for HlsError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::InvalidId(id) => HlsError::InvalidRecording(id),
            StoreError::NotFound(id) => HlsError::RecordingNotFound(id),
            StoreError::IoError(reason) => HlsError::Io(std::io::Error::other(reason)),
        }
    }
}

impl From<tokio::task::JoinError> for HlsError {
    fn from(e: tokio::task::JoinError) -> Self {
        HlsError::Task(e.to_string())
    }
}
