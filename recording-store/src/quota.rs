/// Default floor of free space on the storage volume: 500 MB.
pub const DEFAULT_MIN_FREE_BYTES: u64 = 500_000_000;

/// Storage budget enforced by the janitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageQuota {
    /// Upper bound on the total size of recordings; 0 = unlimited
    pub max_total_bytes: u64,
    /// Evict while the volume has less free space than this
    pub min_free_bytes: u64,
}

impl Default for StorageQuota {
    fn default() -> Self {
        Self {
            max_total_bytes: 0,
            min_free_bytes: DEFAULT_MIN_FREE_BYTES,
        }
    }
}

impl StorageQuota {
    /// Whether the given usage calls for an eviction.
    pub fn is_exceeded(&self, used_bytes: u64, free_bytes: u64) -> bool {
        (self.max_total_bytes > 0 && used_bytes > self.max_total_bytes)
            || free_bytes < self.min_free_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlimited_total_only_checks_free_space() {
        let quota = StorageQuota::default();
        assert!(!quota.is_exceeded(u64::MAX, DEFAULT_MIN_FREE_BYTES));
        assert!(quota.is_exceeded(0, DEFAULT_MIN_FREE_BYTES - 1));
    }

    #[test]
    fn test_max_total_is_strict() {
        let quota = StorageQuota {
            max_total_bytes: 1000,
            min_free_bytes: 0,
        };
        assert!(!quota.is_exceeded(1000, 0));
        assert!(quota.is_exceeded(1001, 0));
    }
}
