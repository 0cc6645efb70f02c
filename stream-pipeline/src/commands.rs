//! Invocation builders for the capture binary and the two ffmpeg consumers.

use std::path::Path;

use recording_store::{RECORDING_EXTENSION, RECORDING_NAME_FORMAT};

use crate::capture::CaptureConfig;
use crate::process::ProcessSpec;

/// Length of one archived recording file in seconds.
pub const ARCHIVE_SEGMENT_SECS: u32 = 900;

/// Number of segments kept in the rolling live playlist.
pub const LIVE_LIST_SIZE: u32 = 10;

/// File name of the live playlist inside the segments directory.
pub const LIVE_PLAYLIST_NAME: &str = "playlist.m3u8";

/// URL prefix written in front of every live segment in the playlist.
pub const LIVE_BASE_URL: &str = "/live/stream/";

pub const CAPTURE_NAME: &str = "capture";
pub const ARCHIVE_NAME: &str = "archive";
pub const LIVE_NAME: &str = "live";

/// External binaries used by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    pub capture: String,
    pub ffmpeg: String,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            capture: "raspivid".to_string(),
            ffmpeg: "ffmpeg".to_string(),
        }
    }
}

/// Camera process writing raw H.264 to stdout until killed.
pub fn capture_command(tools: &Toolchain, config: &CaptureConfig) -> ProcessSpec {
    let mut spec = ProcessSpec::new(CAPTURE_NAME, &tools.capture).args([
        // Run forever, variable bitrate at fixed quantisation
        "-t", "0", "-b", "0", "-qp", "30",
        // Timestamp annotation
        "-ae", "16", "-a", "1036", "-a", "%Y-%m-%d %X",
        "-ex", "night",
    ]);

    spec = spec.args([
        "-w".to_string(),
        config.width.to_string(),
        "-h".to_string(),
        config.height.to_string(),
        "-fps".to_string(),
        config.framerate.to_string(),
        "-rot".to_string(),
        config.rotation.degrees().to_string(),
    ]);

    if config.flip {
        spec = spec.args(["-hf", "-vf"]);
    }

    spec.args(["-vs", "-o", "-"]).piped_stdout()
}

/// ffmpeg consumer cutting the stream into timestamp-named mp4 files.
pub fn archive_command(tools: &Toolchain, config: &CaptureConfig, storage_dir: &Path) -> ProcessSpec {
    let pattern = storage_dir.join(format!("{}.{}", RECORDING_NAME_FORMAT, RECORDING_EXTENSION));

    ProcessSpec::new(ARCHIVE_NAME, &tools.ffmpeg)
        .args(["-y", "-loglevel", "fatal"])
        .args(["-framerate".to_string(), config.framerate.to_string()])
        .args(["-i", "pipe:0"])
        // Output options - copy without re-encoding
        .args(["-codec", "copy"])
        // Segmentation
        .args(["-f", "segment", "-strftime", "1"])
        .args(["-segment_time".to_string(), ARCHIVE_SEGMENT_SECS.to_string()])
        .args(["-segment_format", "mp4"])
        // Fragmented so a file is playable while still being written
        .args(["-segment_format_options", "movflags=frag_keyframe+empty_moov"])
        .arg(pattern.to_string_lossy())
        .piped_stdin()
}

/// ffmpeg consumer producing the rolling live HLS playlist.
pub fn live_command(tools: &Toolchain, config: &CaptureConfig, segments_dir: &Path) -> ProcessSpec {
    let playlist = segments_dir.join(LIVE_PLAYLIST_NAME);
    let segments = segments_dir.join("%d.ts");

    ProcessSpec::new(LIVE_NAME, &tools.ffmpeg)
        .args(["-y", "-loglevel", "fatal"])
        .args(["-framerate".to_string(), config.framerate.to_string()])
        .args(["-i", "pipe:0"])
        .args(["-codec", "copy", "-bsf:v", "h264_mp4toannexb", "-map", "0"])
        .args(["-hls_list_size".to_string(), LIVE_LIST_SIZE.to_string()])
        .args(["-hls_base_url", LIVE_BASE_URL])
        .arg("-hls_segment_filename")
        .arg(segments.to_string_lossy())
        .args(["-hls_segment_type", "mpegts"])
        .args(["-hls_flags", "delete_segments+temp_file"])
        .arg(playlist.to_string_lossy())
        .piped_stdin()
}
