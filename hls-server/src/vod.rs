//! On-demand segment extraction from archived recordings.
//!
//! Nothing is pre-transcoded or cached: every playlist request probes the
//! file's duration and every segment request seeks into the recording and
//! copies one window out as MPEG-TS.

use std::path::Path;
use std::process::Stdio;

use bytes::Bytes;
use tokio::process::Command;

use crate::error::HlsError;
use crate::playlist::VOD_WINDOW_SECS;

/// External binaries used for VOD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VodTools {
    pub ffmpeg: String,
    pub ffprobe: String,
}

impl Default for VodTools {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
        }
    }
}

/// Duration in seconds of the media file at `path`.
pub async fn probe_duration(tools: &VodTools, path: &Path) -> Result<f64, HlsError> {
    let output = Command::new(&tools.ffprobe)
        .args([
            "-loglevel",
            "fatal",
            "-print_format",
            "compact",
            "-show_entries",
            "format=duration",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| HlsError::Probe(format!("Failed to spawn {}: {}", tools.ffprobe, e)))?;

    if !output.status.success() {
        return Err(HlsError::Probe(format!(
            "{} exited with {}: {}",
            tools.ffprobe,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_probe_output(&stdout)
        .ok_or_else(|| HlsError::Probe(format!("Unable to parse duration from {:?}", stdout.trim())))
}

/// Parse `format|duration=123.456` as printed by the compact writer.
pub fn parse_probe_output(output: &str) -> Option<f64> {
    let (key, value) = output.trim().split_once('=')?;
    if key != "format|duration" {
        return None;
    }
    value.trim().parse().ok()
}

/// Seek offset in seconds of segment `index`; negative indexes clamp to 0.
pub fn seek_offset(index: i64) -> f64 {
    (index as f64 * VOD_WINDOW_SECS).max(0.0)
}

/// Parse the segment index out of a request path component like `3.ts`.
pub fn parse_segment_index(name: &str) -> Result<i64, HlsError> {
    let stem = name.strip_suffix(".ts").unwrap_or(name);
    stem.parse()
        .map_err(|_| HlsError::InvalidSegment(name.to_string()))
}

/// ffmpeg arguments that cut one window starting at `offset` out of `path`.
pub fn extraction_args(path: &Path, offset: f64) -> Vec<String> {
    let offset = format!("{:.6}", offset);
    vec![
        "-loglevel".to_string(),
        "fatal".to_string(),
        "-ss".to_string(),
        offset.clone(),
        "-i".to_string(),
        path.to_string_lossy().into_owned(),
        "-t".to_string(),
        format!("{:.1}", VOD_WINDOW_SECS),
        "-codec".to_string(),
        "copy".to_string(),
        "-bsf:v".to_string(),
        "h264_mp4toannexb".to_string(),
        "-map".to_string(),
        "0".to_string(),
        "-output_ts_offset".to_string(),
        offset,
        "-f".to_string(),
        "mpegts".to_string(),
        "pipe:1".to_string(),
    ]
}

/// Cut segment `index` out of the recording at `path`.
///
/// Output is buffered in full. The child is killed if the returned future is
/// dropped, so an abandoned request does not leave ffmpeg running.
pub async fn extract_segment(tools: &VodTools, path: &Path, index: i64) -> Result<Bytes, HlsError> {
    let offset = seek_offset(index);
    tracing::debug!("Extracting segment {} of {} at {:.1}s", index, path.display(), offset);

    let output = Command::new(&tools.ffmpeg)
        .args(extraction_args(path, offset))
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| HlsError::Extraction(format!("Failed to spawn {}: {}", tools.ffmpeg, e)))?;

    if !output.status.success() {
        return Err(HlsError::Extraction(format!(
            "{} exited with {}: {}",
            tools.ffmpeg,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    if output.stdout.is_empty() {
        return Err(HlsError::Extraction(format!(
            "No output for segment {} of {}",
            index,
            path.display()
        )));
    }

    Ok(Bytes::from(output.stdout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_parse_probe_output() {
        assert_eq!(parse_probe_output("format|duration=45.000000\n"), Some(45.0));
        assert_eq!(parse_probe_output("  format|duration=900.48  "), Some(900.48));
        assert_eq!(parse_probe_output("format|duration=N/A"), None);
        assert_eq!(parse_probe_output("stream|duration=45.0"), None);
        assert_eq!(parse_probe_output(""), None);
    }

    #[test]
    fn test_seek_offset() {
        assert_eq!(seek_offset(0), 0.0);
        assert_eq!(seek_offset(1), 30.0);
        assert_eq!(seek_offset(29), 870.0);
        assert_eq!(seek_offset(-1), 0.0);
        assert_eq!(seek_offset(i64::MIN), 0.0);
    }

    #[test]
    fn test_parse_segment_index() {
        assert_eq!(parse_segment_index("3.ts").unwrap(), 3);
        assert_eq!(parse_segment_index("0").unwrap(), 0);
        assert_eq!(parse_segment_index("-2.ts").unwrap(), -2);
        assert!(matches!(
            parse_segment_index("abc.ts"),
            Err(HlsError::InvalidSegment(_))
        ));
        assert!(parse_segment_index("1.5.ts").is_err());
    }

    #[test]
    fn test_extraction_args() {
        let path = PathBuf::from("/data/storage/2024-12-01-15:30:00.mp4");
        let args = extraction_args(&path, seek_offset(2));

        let pos = |flag: &str| args.iter().position(|a| a == flag).unwrap();
        assert_eq!(args[pos("-ss") + 1], "60.000000");
        assert_eq!(args[pos("-output_ts_offset") + 1], "60.000000");
        assert_eq!(args[pos("-i") + 1], "/data/storage/2024-12-01-15:30:00.mp4");
        assert_eq!(args[pos("-t") + 1], "30.0");
        assert_eq!(args[pos("-codec") + 1], "copy");
        assert_eq!(args[pos("-f") + 1], "mpegts");
        assert_eq!(args.last().unwrap(), "pipe:1");
        // Input seek must come before -i
        assert!(pos("-ss") < pos("-i"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_probe_with_stub() {
        let dir = tempfile::tempdir().unwrap();
        let probe = dir.path().join("fake-ffprobe");
        crate::test_support::write_script(&probe, "#!/bin/sh\necho 'format|duration=45.500000'\n");

        let tools = VodTools {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: probe.to_string_lossy().into_owned(),
        };
        let duration = probe_duration(&tools, Path::new("/any.mp4")).await.unwrap();
        assert_eq!(duration, 45.5);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_extract_with_stub() {
        let dir = tempfile::tempdir().unwrap();
        let ffmpeg = dir.path().join("fake-ffmpeg");
        // Echo the seek offset so the test can see it was passed through
        crate::test_support::write_script(&ffmpeg, "#!/bin/sh\nprintf 'ts@%s' \"$4\"\n");

        let tools = VodTools {
            ffmpeg: ffmpeg.to_string_lossy().into_owned(),
            ffprobe: "ffprobe".to_string(),
        };
        let bytes = extract_segment(&tools, Path::new("/any.mp4"), 3).await.unwrap();
        assert_eq!(&bytes[..], b"ts@90.000000");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_extract_failures() {
        let silent = VodTools {
            ffmpeg: "true".to_string(),
            ffprobe: "true".to_string(),
        };
        assert!(matches!(
            extract_segment(&silent, Path::new("/any.mp4"), 0).await,
            Err(HlsError::Extraction(_))
        ));

        let failing = VodTools {
            ffmpeg: "false".to_string(),
            ffprobe: "false".to_string(),
        };
        assert!(matches!(
            extract_segment(&failing, Path::new("/any.mp4"), 0).await,
            Err(HlsError::Extraction(_))
        ));
        assert!(matches!(
            probe_duration(&failing, Path::new("/any.mp4")).await,
            Err(HlsError::Probe(_))
        ));

        let missing = VodTools {
            ffmpeg: "/nonexistent/ffmpeg".to_string(),
            ffprobe: "/nonexistent/ffprobe".to_string(),
        };
        assert!(matches!(
            extract_segment(&missing, Path::new("/any.mp4"), 0).await,
            Err(HlsError::Extraction(_))
        ));
    }
}
