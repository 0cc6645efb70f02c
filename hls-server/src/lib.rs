//! HTTP surface of the camera node.
//!
//! Serves the live feed written by the capture pipeline, archived
//! recordings as on-demand HLS, and the small settings/storage API.
//!
//! - **Live**: the rolling playlist and `.ts` files are served straight from
//!   the segments directory.
//! - **VOD**: no pre-transcoding. A playlist request probes the recording's
//!   duration and synthesizes fixed 30 s segments; a segment request seeks
//!   into the file and copies that window out as MPEG-TS.
//!
//! # Endpoints
//!
//! | Endpoint | Description |
//! |----------|-------------|
//! | `GET /live/playlist` | Live HLS playlist |
//! | `GET /live/stream/{segment}` | Live segment |
//! | `GET /video/{id}` | Raw recording |
//! | `GET /video/{id}/playlist` | VOD playlist of a recording |
//! | `GET /video/{id}/stream/{index}.ts` | VOD segment, cut on demand |
//! | `GET /api/storage` | Recordings grouped by day |
//! | `GET/POST /api/setting/camera` | Camera settings (POST restarts the pipeline) |
//! | `POST /api/pipeline/restart` | Restart the pipeline |

pub mod error;
pub mod live;
pub mod playlist;
pub mod routes;
pub mod state;
pub mod vod;

#[cfg(all(test, unix))]
mod test_support;

pub use error::HlsError;
pub use routes::router;
pub use state::{HlsState, RestartRequest};
pub use vod::VodTools;
