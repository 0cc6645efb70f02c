//! Background eviction of old recordings.

use std::path::PathBuf;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::recordings::mp4_files;
use crate::usage::{as_megabytes, available_bytes, format_bytes, recordings_size};
use crate::{DiskError, StorageQuota};

/// Default pause between janitor cycles.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// Result of one janitor pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Usage is within quota
    Idle,
    /// Quota exceeded and this file was deleted
    Evicted(PathBuf),
    /// Quota exceeded but there is no recording left to delete
    NothingToEvict,
}

/// Keeps the storage directory within its [`StorageQuota`].
///
/// Each cycle deletes at most one file: the `.mp4` with the lexically
/// smallest name, which is the oldest recording.
#[derive(Debug, Clone)]
pub struct StorageJanitor {
    storage_dir: PathBuf,
    quota: StorageQuota,
    interval: Duration,
}

impl StorageJanitor {
    pub fn new(storage_dir: impl Into<PathBuf>, quota: StorageQuota) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            quota,
            interval: DEFAULT_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// One blocking pass: measure, and evict one file if over quota.
    pub fn run_cycle(&self) -> Result<CycleOutcome, DiskError> {
        let used = recordings_size(&self.storage_dir)?;
        let free = available_bytes(&self.storage_dir)?;

        if !self.quota.is_exceeded(used, free) {
            return Ok(CycleOutcome::Idle);
        }

        let files = mp4_files(&self.storage_dir)?;
        let Some((oldest, _)) = files.first() else {
            tracing::warn!(
                "Storage over quota ({:.0} MB free) with no recordings to evict",
                as_megabytes(free)
            );
            return Ok(CycleOutcome::NothingToEvict);
        };
        std::fs::remove_file(oldest).map_err(|e| DiskError::DeleteFailed {
            path: oldest.display().to_string(),
            reason: e.to_string(),
        })?;

        tracing::info!(
            "Free space {:.0} MB, removed old recording: {}",
            as_megabytes(free),
            oldest.file_name().and_then(|n| n.to_str()).unwrap_or_default()
        );

        Ok(CycleOutcome::Evicted(oldest.clone()))
    }

    /// Run cycles on a fixed interval until `cancel` fires.
    ///
    /// Failures are logged and never end the loop.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(
            "Storage janitor watching {} (max {}, min free {}, every {:?})",
            self.storage_dir.display(),
            max_total_label(self.quota.max_total_bytes),
            format_bytes(self.quota.min_free_bytes),
            self.interval
        );

        loop {
            let janitor = self.clone();
            match tokio::task::spawn_blocking(move || janitor.run_cycle()).await {
                Ok(Ok(outcome)) => tracing::debug!("Janitor cycle: {:?}", outcome),
                Ok(Err(e)) => tracing::warn!("Clean storage error: {}", e),
                Err(e) => tracing::warn!("Janitor cycle panicked: {}", e),
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        tracing::info!("Storage janitor stopped");
    }
}

fn max_total_label(max_total_bytes: u64) -> String {
    match max_total_bytes {
        0 => "unlimited".to_string(),
        n => format_bytes(n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::tempdir;

    fn write_recordings(dir: &Path, names: &[&str]) {
        for name in names {
            std::fs::write(dir.join(name), vec![0u8; 100]).unwrap();
        }
    }

    fn remaining(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    fn over_total(max_total_bytes: u64) -> StorageQuota {
        StorageQuota {
            max_total_bytes,
            min_free_bytes: 0,
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_evicts_exactly_one_oldest_per_cycle() {
        let dir = tempdir().unwrap();
        write_recordings(
            dir.path(),
            &[
                "2024-12-01-16:00:00.mp4",
                "2024-12-01-15:30:00.mp4",
                "2024-11-30-23:45:00.mp4",
                "2024-12-01-15:45:00.mp4",
            ],
        );
        std::fs::write(dir.path().join("0000-readme.txt"), b"keep").unwrap();

        // 400 bytes stored, 50 allowed: far over quota, still one file per cycle
        let janitor = StorageJanitor::new(dir.path(), over_total(50));

        let outcome = janitor.run_cycle().unwrap();
        assert_eq!(
            outcome,
            CycleOutcome::Evicted(dir.path().join("2024-11-30-23:45:00.mp4"))
        );
        assert_eq!(remaining(dir.path()).len(), 4);

        let outcome = janitor.run_cycle().unwrap();
        assert_eq!(
            outcome,
            CycleOutcome::Evicted(dir.path().join("2024-12-01-15:30:00.mp4"))
        );
        assert_eq!(
            remaining(dir.path()),
            vec!["0000-readme.txt", "2024-12-01-15:45:00.mp4", "2024-12-01-16:00:00.mp4"]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_idle_within_quota() {
        let dir = tempdir().unwrap();
        write_recordings(dir.path(), &["2024-12-01-15:30:00.mp4", "2024-12-01-15:45:00.mp4"]);

        let janitor = StorageJanitor::new(dir.path(), over_total(200));
        assert_eq!(janitor.run_cycle().unwrap(), CycleOutcome::Idle);
        assert_eq!(remaining(dir.path()).len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_low_free_space_triggers_eviction() {
        let dir = tempdir().unwrap();
        write_recordings(dir.path(), &["2024-12-01-15:30:00.mp4", "2024-12-01-15:45:00.mp4"]);

        let quota = StorageQuota {
            max_total_bytes: 0,
            min_free_bytes: u64::MAX,
        };
        let janitor = StorageJanitor::new(dir.path(), quota);
        assert_eq!(
            janitor.run_cycle().unwrap(),
            CycleOutcome::Evicted(dir.path().join("2024-12-01-15:30:00.mp4"))
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_evicts_single_remaining_recording() {
        let dir = tempdir().unwrap();
        write_recordings(dir.path(), &["2024-12-01-15:30:00.mp4"]);

        let janitor = StorageJanitor::new(dir.path(), over_total(1));
        assert_eq!(
            janitor.run_cycle().unwrap(),
            CycleOutcome::Evicted(dir.path().join("2024-12-01-15:30:00.mp4"))
        );
        assert!(remaining(dir.path()).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_nothing_to_evict_without_recordings() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("playlist.m3u8"), b"#EXTM3U").unwrap();

        let quota = StorageQuota {
            max_total_bytes: 0,
            min_free_bytes: u64::MAX,
        };
        let janitor = StorageJanitor::new(dir.path(), quota);
        assert_eq!(janitor.run_cycle().unwrap(), CycleOutcome::NothingToEvict);
        assert_eq!(remaining(dir.path()), vec!["playlist.m3u8"]);
    }

    #[test]
    fn test_max_total_label() {
        assert_eq!(max_total_label(0), "unlimited");
        assert_eq!(max_total_label(2 * 1024 * 1024 * 1024), "2.0GB");
    }

    #[test]
    fn test_missing_dir_is_soft_error() {
        let dir = tempdir().unwrap();
        let janitor = StorageJanitor::new(dir.path().join("missing"), over_total(1));
        assert!(janitor.run_cycle().is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let dir = tempdir().unwrap();
        write_recordings(dir.path(), &["2024-12-01-15:30:00.mp4", "2024-12-01-15:45:00.mp4"]);

        let cancel = CancellationToken::new();
        let janitor = StorageJanitor::new(dir.path(), over_total(50))
            .with_interval(Duration::from_secs(3600));
        let task = tokio::spawn(janitor.run(cancel.clone()));

        // The first cycle runs immediately; wait for it to evict
        let oldest = dir.path().join("2024-12-01-15:30:00.mp4");
        tokio::time::timeout(Duration::from_secs(10), async {
            while oldest.exists() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(10), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(remaining(dir.path()), vec!["2024-12-01-15:45:00.mp4"]);
    }
}
