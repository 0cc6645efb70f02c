//! Configuration for the camera node.
//!
//! Holds the two pieces of state that outlive a single pipeline run:
//!
//! - **Camera settings**: fps, rotation and resolution, persisted as TOML and
//!   re-read every time the capture pipeline starts.
//! - **Data layout**: where recordings, live segments and the settings file
//!   live on disk.

mod error;
mod paths;
mod settings;

pub use error::ConfigError;
pub use paths::{default_data_dir, DataLayout};
pub use settings::{CameraSettings, SettingsStore};
