use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Camera settings as stored.
///
/// Values are kept as the raw strings the user submitted; turning them into
/// a usable capture configuration (and falling back on bad input) happens
/// when a pipeline starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraSettings {
    #[serde(default = "default_fps")]
    pub fps: String,
    #[serde(default = "default_rotation")]
    pub rotation: String,
    /// "WIDTHxHEIGHT"
    #[serde(default = "default_resolution")]
    pub resolution: String,
}

fn default_fps() -> String {
    "30".to_string()
}

fn default_rotation() -> String {
    "0".to_string()
}

fn default_resolution() -> String {
    "800x600".to_string()
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            rotation: default_rotation(),
            resolution: default_resolution(),
        }
    }
}

/// TOML-backed store for [`CameraSettings`].
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings from disk
    pub fn load(&self) -> Result<CameraSettings, ConfigError> {
        if !self.path.exists() {
            return Err(ConfigError::NotFound(self.path.display().to_string()));
        }
        let content = std::fs::read_to_string(&self.path)?;
        let settings: CameraSettings = toml::from_str(&content)?;
        Ok(settings)
    }

    /// Load settings, falling back to defaults when the file is missing or corrupt.
    pub fn load_or_default(&self) -> CameraSettings {
        match self.load() {
            Ok(settings) => settings,
            Err(ConfigError::NotFound(_)) => CameraSettings::default(),
            Err(e) => {
                tracing::warn!(
                    "Failed to load camera settings from {}: {}, using defaults",
                    self.path.display(),
                    e
                );
                CameraSettings::default()
            }
        }
    }

    /// Write the default settings if nothing is stored yet.
    pub fn seed(&self) -> Result<CameraSettings, ConfigError> {
        if self.path.exists() {
            return Ok(self.load_or_default());
        }
        let settings = CameraSettings::default();
        self.save(&settings)?;
        tracing::info!("Seeded camera settings at {}", self.path.display());
        Ok(settings)
    }

    /// Save settings to disk.
    ///
    /// Writes to a sibling temp file and renames it into place so a pipeline
    /// start never reads a half-written file.
    pub fn save(&self, settings: &CameraSettings) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(settings)?;
        let tmp_path = self.path.with_extension("toml.tmp");
        std::fs::write(&tmp_path, content)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}
