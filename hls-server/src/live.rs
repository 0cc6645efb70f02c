//! Files of the live feed.
//!
//! The live consumer of the capture pipeline writes a rolling playlist and
//! numbered `.ts` segments into the segments directory; they are served
//! as-is.

use std::path::{Path, PathBuf};

use stream_pipeline::commands::LIVE_PLAYLIST_NAME;

use crate::error::HlsError;

pub fn live_playlist_path(segments_dir: &Path) -> PathBuf {
    segments_dir.join(LIVE_PLAYLIST_NAME)
}

/// Whether `name` is a plain segment file name (`12.ts`).
///
/// Anything containing a separator or starting with a dot is rejected so a
/// request can never leave the segments directory.
pub fn is_valid_segment_name(name: &str) -> bool {
    name.ends_with(".ts")
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
}

/// Path of a live segment, if the name is acceptable and the file exists.
pub fn live_segment_path(segments_dir: &Path, name: &str) -> Result<PathBuf, HlsError> {
    if !is_valid_segment_name(name) {
        return Err(HlsError::InvalidSegment(name.to_string()));
    }

    let path = segments_dir.join(name);
    if !path.is_file() {
        return Err(HlsError::SegmentNotFound(name.to_string()));
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_segment_names() {
        assert!(is_valid_segment_name("0.ts"));
        assert!(is_valid_segment_name("segment_001.ts"));
        assert!(!is_valid_segment_name("playlist.m3u8"));
        assert!(!is_valid_segment_name("../0.ts"));
        assert!(!is_valid_segment_name("..ts"));
        assert!(!is_valid_segment_name("a/0.ts"));
        assert!(!is_valid_segment_name(".ts"));
        assert!(!is_valid_segment_name(""));
    }

    #[test]
    fn test_live_segment_path() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("4.ts"), b"ts").unwrap();

        assert_eq!(
            live_segment_path(dir.path(), "4.ts").unwrap(),
            dir.path().join("4.ts")
        );
        assert!(matches!(
            live_segment_path(dir.path(), "5.ts"),
            Err(HlsError::SegmentNotFound(_))
        ));
        assert!(matches!(
            live_segment_path(dir.path(), "../4.ts"),
            Err(HlsError::InvalidSegment(_))
        ));
        assert_eq!(
            live_playlist_path(dir.path()),
            dir.path().join("playlist.m3u8")
        );
    }
}
