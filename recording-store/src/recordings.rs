//! Timestamp-named recording files.
//!
//! The archive writer names every file after the moment it was opened,
//! `YYYY-MM-DD-HH:MM:SS.mp4`, so lexical order of the names is also
//! chronological order.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::StoreError;

/// strftime pattern of a recording file stem
pub const RECORDING_NAME_FORMAT: &str = "%Y-%m-%d-%H:%M:%S";

/// Extension of archived recordings (without the dot)
pub const RECORDING_EXTENSION: &str = "mp4";

/// Length of a formatted name: `2024-12-01-15:30:00`
const RECORDING_NAME_LEN: usize = 19;

/// Name of one recording, i.e. its file stem.
///
/// Only names produced by the archive writer parse, which keeps request
/// paths from ever escaping the storage directory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordingId(String);

impl RecordingId {
    /// Parse a recording name, with or without the `.mp4` extension.
    pub fn parse(name: &str) -> Result<Self, StoreError> {
        let stem = name.strip_suffix(".mp4").unwrap_or(name);
        let invalid = || StoreError::InvalidId(name.to_string());

        if stem.len() != RECORDING_NAME_LEN {
            return Err(invalid());
        }

        // Canonical form only, so one recording has exactly one id
        let recorded_at =
            NaiveDateTime::parse_from_str(stem, RECORDING_NAME_FORMAT).map_err(|_| invalid())?;
        let id = Self::from_datetime(recorded_at);
        if id.0 != stem {
            return Err(invalid());
        }

        Ok(id)
    }

    pub fn from_datetime(recorded_at: NaiveDateTime) -> Self {
        Self(recorded_at.format(RECORDING_NAME_FORMAT).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn recorded_at(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.0, RECORDING_NAME_FORMAT).ok()
    }

    /// `YYYY-MM-DD` part of the name
    pub fn day(&self) -> &str {
        &self.0[..10]
    }

    /// `HH:MM:SS` part of the name
    pub fn time_of_day(&self) -> &str {
        &self.0[11..]
    }

    pub fn file_name(&self) -> String {
        format!("{}.{}", self.0, RECORDING_EXTENSION)
    }
}

impl fmt::Display for RecordingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A recording file on disk
#[derive(Debug, Clone)]
pub struct RecordingFile {
    pub id: RecordingId,
    pub path: PathBuf,
    pub recorded_at: NaiveDateTime,
    pub size_bytes: u64,
}

/// Path of `id` inside `storage_dir`, if the file exists.
pub fn recording_path(storage_dir: &Path, id: &RecordingId) -> Result<PathBuf, StoreError> {
    let path = storage_dir.join(id.file_name());
    if path.is_file() {
        Ok(path)
    } else {
        Err(StoreError::NotFound(id.to_string()))
    }
}

/// List all recordings in a directory, oldest first.
///
/// Files whose names were not produced by the archive writer are skipped.
pub fn list_recordings(storage_dir: &Path) -> Result<Vec<RecordingFile>, StoreError> {
    let mut recordings = Vec::new();

    for entry in std::fs::read_dir(storage_dir)?.filter_map(|e| e.ok()) {
        let path = entry.path();

        let Some(name) = path.file_name().and_then(|f| f.to_str()) else {
            continue;
        };
        if !name.ends_with(".mp4") {
            continue;
        }
        let Ok(id) = RecordingId::parse(name) else {
            continue;
        };
        let Some(recorded_at) = id.recorded_at() else {
            continue;
        };

        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }

        recordings.push(RecordingFile {
            id,
            path,
            recorded_at,
            size_bytes: metadata.len(),
        });
    }

    recordings.sort_by(|a, b| a.id.cmp(&b.id));

    Ok(recordings)
}

/// Group recordings by day: `{"2024-12-01": ["15:30:00", "15:45:00"]}`.
pub fn recordings_by_day(recordings: &[RecordingFile]) -> BTreeMap<String, Vec<String>> {
    let mut days: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for recording in recordings {
        days.entry(recording.id.day().to_string())
            .or_default()
            .push(recording.id.time_of_day().to_string());
    }
    days
}

/// Every `.mp4` file in `dir` with its size, sorted by name.
///
/// Unlike [`list_recordings`] this does not require the name to parse; it
/// is what the janitor measures and evicts from.
pub(crate) fn mp4_files(dir: &Path) -> std::io::Result<Vec<(PathBuf, u64)>> {
    let mut files = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(RECORDING_EXTENSION) {
            continue;
        }

        // Vanishes when the janitor or another writer races us
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if metadata.is_file() {
            files.push((path, metadata.len()));
        }
    }

    files.sort_by(|a, b| a.0.file_name().cmp(&b.0.file_name()));
    Ok(files)
}
