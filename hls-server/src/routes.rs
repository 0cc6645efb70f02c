use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use config_manager::CameraSettings;
use recording_store::{list_recordings, recordings_by_day};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::io::ReaderStream;

use crate::error::HlsError;
use crate::live::{live_playlist_path, live_segment_path};
use crate::playlist::{build_vod_manifest, render_vod_playlist, VOD_WINDOW_SECS};
use crate::state::{HlsState, RestartRequest};
use crate::vod::{extract_segment, parse_segment_index, probe_duration};

const PLAYLIST_CONTENT_TYPE: &str = "application/x-mpegURL";
const SEGMENT_CONTENT_TYPE: &str = "video/MP2T";
const NO_CACHE: &str = "no-cache";
const CACHE_HOUR: &str = "max-age=3600";

/// Create the router with all endpoints.
pub fn router(state: Arc<HlsState>) -> Router {
    Router::new()
        // Live feed, written by the running pipeline
        .route("/live/playlist", get(live_playlist_handler))
        .route("/live/stream/{segment}", get(live_segment_handler))
        // Archived recordings
        .route("/video/{id}", get(video_file_handler))
        .route("/video/{id}/playlist", get(video_playlist_handler))
        .route("/video/{id}/stream/{segment}", get(video_segment_handler))
        // API
        .route("/api/storage", get(storage_handler))
        .route(
            "/api/setting/camera",
            get(get_camera_settings).post(save_camera_settings),
        )
        .route("/api/pipeline/restart", post(restart_handler))
        .with_state(state)
}

/// Serve the rolling live playlist.
async fn live_playlist_handler(
    State(state): State<Arc<HlsState>>,
) -> Result<impl IntoResponse, HlsErrorResponse> {
    let path = live_playlist_path(&state.layout.segments_dir);

    let playlist = match tokio::fs::read_to_string(&path).await {
        Ok(playlist) => playlist,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(HlsError::SegmentNotFound("live playlist".to_string()).into());
        }
        Err(e) => return Err(HlsError::Io(e).into()),
    };

    Ok((
        [
            (header::CONTENT_TYPE, PLAYLIST_CONTENT_TYPE),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (header::CACHE_CONTROL, NO_CACHE),
        ],
        playlist,
    ))
}

/// Serve a live HLS segment.
async fn live_segment_handler(
    Path(segment): Path<String>,
    State(state): State<Arc<HlsState>>,
) -> Result<impl IntoResponse, HlsErrorResponse> {
    let path = live_segment_path(&state.layout.segments_dir, &segment)?;

    // The live writer may have rotated it out since the check
    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(HlsError::SegmentNotFound(segment).into());
        }
        Err(e) => return Err(HlsError::Io(e).into()),
    };

    Ok((
        [
            (header::CONTENT_TYPE, SEGMENT_CONTENT_TYPE),
            (header::CACHE_CONTROL, NO_CACHE),
        ],
        Body::from_stream(ReaderStream::new(file)),
    ))
}

/// Serve a recording file unmodified.
async fn video_file_handler(
    Path(id): Path<String>,
    State(state): State<Arc<HlsState>>,
) -> Result<impl IntoResponse, HlsErrorResponse> {
    let path = state.recording_path(&id)?;

    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(HlsError::RecordingNotFound(id).into());
        }
        Err(e) => return Err(HlsError::Io(e).into()),
    };

    Ok((
        [
            (header::CONTENT_TYPE, "video/mp4"),
            (header::CACHE_CONTROL, CACHE_HOUR),
        ],
        Body::from_stream(ReaderStream::new(file)),
    ))
}

/// Synthesize the VOD playlist of a recording from its current duration.
async fn video_playlist_handler(
    Path(id): Path<String>,
    State(state): State<Arc<HlsState>>,
) -> Result<impl IntoResponse, HlsErrorResponse> {
    let path = state.recording_path(&id)?;

    let duration = probe_duration(&state.tools, &path).await?;
    let segments = build_vod_manifest(duration, VOD_WINDOW_SECS);
    tracing::debug!("VOD playlist for {}: {:.1}s, {} segments", id, duration, segments.len());

    Ok((
        [
            (header::CONTENT_TYPE, PLAYLIST_CONTENT_TYPE),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        ],
        render_vod_playlist(&id, &segments),
    ))
}

/// Cut one segment out of a recording on demand.
async fn video_segment_handler(
    Path((id, segment)): Path<(String, String)>,
    State(state): State<Arc<HlsState>>,
) -> Result<impl IntoResponse, HlsErrorResponse> {
    let path = state.recording_path(&id)?;
    let index = parse_segment_index(&segment)?;

    let data = extract_segment(&state.tools, &path, index).await?;

    Ok((
        [
            (header::CONTENT_TYPE, SEGMENT_CONTENT_TYPE),
            (header::CACHE_CONTROL, CACHE_HOUR),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        ],
        data,
    ))
}

/// Recordings grouped by day.
async fn storage_handler(
    State(state): State<Arc<HlsState>>,
) -> Result<Json<BTreeMap<String, Vec<String>>>, HlsErrorResponse> {
    let storage_dir = state.layout.storage_dir.clone();
    let recordings = tokio::task::spawn_blocking(move || list_recordings(&storage_dir))
        .await
        .map_err(HlsError::from)?
        .map_err(HlsError::from)?;

    Ok(Json(recordings_by_day(&recordings)))
}

async fn get_camera_settings(
    State(state): State<Arc<HlsState>>,
) -> Result<Json<CameraSettings>, HlsErrorResponse> {
    let store = state.settings.clone();
    let settings = tokio::task::spawn_blocking(move || store.load_or_default())
        .await
        .map_err(HlsError::from)?;

    Ok(Json(settings))
}

/// Persist camera settings and restart the pipeline so they take effect.
async fn save_camera_settings(
    State(state): State<Arc<HlsState>>,
    Json(settings): Json<CameraSettings>,
) -> Result<Json<CameraSettings>, HlsErrorResponse> {
    let store = state.settings.clone();
    let saved = settings.clone();
    tokio::task::spawn_blocking(move || store.save(&saved))
        .await
        .map_err(HlsError::from)?
        .map_err(HlsError::from)?;

    tracing::info!(
        "Camera settings saved: fps={} rotation={} resolution={}",
        settings.fps,
        settings.rotation,
        settings.resolution
    );
    state.request_restart(RestartRequest::SettingsChanged)?;

    Ok(Json(settings))
}

async fn restart_handler(
    State(state): State<Arc<HlsState>>,
) -> Result<StatusCode, HlsErrorResponse> {
    state.request_restart(RestartRequest::Manual)?;
    Ok(StatusCode::ACCEPTED)
}

/// Error response wrapper for HlsError
pub struct HlsErrorResponse(HlsError);

impl From<HlsError> for HlsErrorResponse {
    fn from(e: HlsError) -> Self {
        HlsErrorResponse(e)
    }
}

impl IntoResponse for HlsErrorResponse {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self.0 {
            HlsError::RecordingNotFound(_) | HlsError::SegmentNotFound(_) => {
                (StatusCode::NOT_FOUND, self.0.to_string())
            }
            HlsError::InvalidRecording(_) | HlsError::InvalidSegment(_) => {
                (StatusCode::BAD_REQUEST, self.0.to_string())
            }
            HlsError::ControllerGone => (StatusCode::SERVICE_UNAVAILABLE, self.0.to_string()),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string()),
        };

        tracing::warn!("HTTP error: {}", self.0);

        (status, message).into_response()
    }
}
