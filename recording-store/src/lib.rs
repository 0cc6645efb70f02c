//! Recording storage for the camera node.
//!
//! The archive writer drops one timestamp-named `.mp4` file per segment into
//! the storage directory. This crate lists and resolves those files, measures
//! disk usage, and runs the [`StorageJanitor`] that evicts the oldest
//! recording whenever the [`StorageQuota`] is exceeded.

mod error;
pub mod janitor;
pub mod quota;
pub mod recordings;
pub mod usage;

pub use error::{DiskError, StoreError};
pub use janitor::{CycleOutcome, StorageJanitor};
pub use quota::StorageQuota;
pub use recordings::{
    list_recordings, recording_path, recordings_by_day, RecordingFile, RecordingId,
    RECORDING_EXTENSION, RECORDING_NAME_FORMAT,
};
pub use usage::{available_bytes, format_bytes, recordings_size};
