use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Directory name created under the user's home when no data dir is given.
const DATA_DIR_NAME: &str = "nvr-data";

/// Get the default data directory
/// Returns ~/nvr-data
pub fn default_data_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|p| p.join(DATA_DIR_NAME))
        .ok_or(ConfigError::NoHomeDir)
}

/// On-disk layout of the node, one directory per concern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    /// Archived recordings (flat, timestamp-named files)
    pub storage_dir: PathBuf,
    /// Rolling live playlist and segments, owned by the running pipeline
    pub segments_dir: PathBuf,
    /// Camera settings file
    pub settings_path: PathBuf,
}

impl DataLayout {
    /// Standard layout beneath a data root.
    pub fn under(root: &Path) -> Self {
        Self {
            storage_dir: root.join("storage"),
            segments_dir: root.join("segments"),
            settings_path: root.join("settings.toml"),
        }
    }

    /// Create every directory the layout needs.
    pub fn ensure(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.storage_dir)?;
        std::fs::create_dir_all(&self.segments_dir)?;
        if let Some(parent) = self.settings_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}
