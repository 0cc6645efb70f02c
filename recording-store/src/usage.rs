use std::path::Path;

use crate::recordings::mp4_files;
use crate::DiskError;

/// Total size in bytes of the `.mp4` files in `dir`
pub fn recordings_size(dir: &Path) -> Result<u64, DiskError> {
    let files = mp4_files(dir)?;
    Ok(files.iter().map(|(_, size)| size).sum())
}

/// Get available disk space in bytes
#[cfg(unix)]
pub fn available_bytes(path: &Path) -> Result<u64, DiskError> {
    use nix::sys::statvfs::statvfs;

    let stat = statvfs(path).map_err(|e| DiskError::StatvfsFailed(e.to_string()))?;

    #[allow(clippy::unnecessary_cast)]
    let available = stat.blocks_available() as u64 * stat.fragment_size() as u64;
    Ok(available)
}

#[cfg(not(unix))]
pub fn available_bytes(_path: &Path) -> Result<u64, DiskError> {
    Err(DiskError::Unsupported)
}

/// Bytes as decimal megabytes, the unit the eviction log reports
pub fn as_megabytes(bytes: u64) -> f64 {
    bytes as f64 / 1000.0 / 1000.0
}

/// Binary-prefixed size for log lines, e.g. `1.5KB` or `3.0GB`.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{}B", bytes);
    }

    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1}{}", value, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500B");
        assert_eq!(format_bytes(1536), "1.5KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0MB");
        assert_eq!(format_bytes(1024 * 1024 * 1024), "1.0GB");
        assert_eq!(format_bytes(5 * 1024u64.pow(5)), "5120.0TB");
    }

    #[test]
    fn test_as_megabytes_is_decimal() {
        assert_eq!(as_megabytes(500_000_000), 500.0);
    }

    #[test]
    fn test_recordings_size_counts_only_mp4() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("2024-12-01-15:30:00.mp4"), vec![0u8; 100]).unwrap();
        std::fs::write(dir.path().join("2024-12-01-15:45:00.mp4"), vec![0u8; 50]).unwrap();
        std::fs::write(dir.path().join("playlist.m3u8"), vec![0u8; 1000]).unwrap();

        assert_eq!(recordings_size(dir.path()).unwrap(), 150);
    }

    #[test]
    fn test_recordings_size_missing_dir() {
        let dir = tempdir().unwrap();
        assert!(recordings_size(&dir.path().join("missing")).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_available_bytes() {
        let dir = tempdir().unwrap();
        assert!(available_bytes(dir.path()).is_ok());
        assert!(available_bytes(&dir.path().join("missing")).is_err());
    }
}
