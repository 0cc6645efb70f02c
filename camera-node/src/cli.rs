use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use config_manager::{default_data_dir, ConfigError, DataLayout};
use hls_server::VodTools;
use recording_store::{quota::DEFAULT_MIN_FREE_BYTES, StorageQuota};
use stream_pipeline::capture::{DEFAULT_HEIGHT, DEFAULT_WIDTH};
use stream_pipeline::{CameraDefaults, Toolchain};

/// What to do when the capture pipeline fails on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FailurePolicy {
    /// Exit non-zero and let the service manager restart the node
    Exit,
    /// Log and leave the pipeline down until a restart is requested
    Wait,
}

/// Camera Node - single-camera recorder
///
/// - Captures the camera and fans the stream out to an archive writer and a
///   live HLS segmenter
/// - Evicts the oldest recordings when storage runs low
/// - Serves live video, archived recordings (as on-demand HLS) and settings
#[derive(Parser, Debug)]
#[command(name = "camera-node")]
#[command(about = "Single-camera recorder with live and on-demand HLS")]
pub struct Cli {
    /// HTTP port
    #[arg(long, env = "NVR_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Data root; defaults to ~/nvr-data
    #[arg(long, env = "NVR_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Recordings directory (default: <data-dir>/storage)
    #[arg(long, env = "NVR_STORAGE")]
    pub storage: Option<PathBuf>,

    /// Live segments directory (default: <data-dir>/segments)
    #[arg(long, env = "NVR_SEGMENTS")]
    pub segments: Option<PathBuf>,

    /// Camera settings file (default: <data-dir>/settings.toml)
    #[arg(long, env = "NVR_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Capture width when the stored resolution is unusable
    #[arg(long, env = "NVR_CAM_WIDTH", default_value_t = DEFAULT_WIDTH)]
    pub cam_width: u32,

    /// Capture height when the stored resolution is unusable
    #[arg(long, env = "NVR_CAM_HEIGHT", default_value_t = DEFAULT_HEIGHT)]
    pub cam_height: u32,

    /// Flip the image horizontally and vertically
    #[arg(long, env = "NVR_CAM_FLIP")]
    pub cam_flip: bool,

    /// Maximum total size of recordings in bytes (0 = unlimited)
    #[arg(long, env = "NVR_MAX_STORAGE", default_value_t = 0)]
    pub max_storage: u64,

    /// Minimum free space on the storage volume in bytes
    #[arg(long, env = "NVR_MIN_FREE", default_value_t = DEFAULT_MIN_FREE_BYTES)]
    pub min_free: u64,

    /// Seconds between storage janitor cycles
    #[arg(long, env = "NVR_JANITOR_INTERVAL", default_value_t = 60)]
    pub janitor_interval: u64,

    /// Capture binary
    #[arg(long, env = "NVR_CAPTURE_BIN", default_value = "raspivid")]
    pub capture_bin: String,

    /// Transcoder binary
    #[arg(long, env = "NVR_FFMPEG_BIN", default_value = "ffmpeg")]
    pub ffmpeg_bin: String,

    /// Prober binary
    #[arg(long, env = "NVR_FFPROBE_BIN", default_value = "ffprobe")]
    pub ffprobe_bin: String,

    /// Behaviour when the pipeline fails
    #[arg(long, env = "NVR_ON_FAILURE", value_enum, default_value_t = FailurePolicy::Exit)]
    pub on_failure: FailurePolicy,
}

impl Cli {
    /// Directory layout with per-directory overrides applied.
    pub fn layout(&self) -> Result<DataLayout, ConfigError> {
        let root = match &self.data_dir {
            Some(dir) => dir.clone(),
            None => default_data_dir()?,
        };

        let mut layout = DataLayout::under(&root);
        if let Some(storage) = &self.storage {
            layout.storage_dir = storage.clone();
        }
        if let Some(segments) = &self.segments {
            layout.segments_dir = segments.clone();
        }
        if let Some(settings) = &self.settings {
            layout.settings_path = settings.clone();
        }
        Ok(layout)
    }

    pub fn quota(&self) -> StorageQuota {
        StorageQuota {
            max_total_bytes: self.max_storage,
            min_free_bytes: self.min_free,
        }
    }

    pub fn janitor_interval(&self) -> Duration {
        Duration::from_secs(self.janitor_interval.max(1))
    }

    pub fn camera_defaults(&self) -> CameraDefaults {
        CameraDefaults {
            width: self.cam_width,
            height: self.cam_height,
            flip: self.cam_flip,
        }
    }

    pub fn toolchain(&self) -> Toolchain {
        Toolchain {
            capture: self.capture_bin.clone(),
            ffmpeg: self.ffmpeg_bin.clone(),
        }
    }

    pub fn vod_tools(&self) -> VodTools {
        VodTools {
            ffmpeg: self.ffmpeg_bin.clone(),
            ffprobe: self.ffprobe_bin.clone(),
        }
    }
}
