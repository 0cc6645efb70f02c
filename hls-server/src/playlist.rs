//! Synthesized VOD playlists for archived recordings.

use std::fmt::Write;

/// Fixed length of one virtual segment in seconds.
pub const VOD_WINDOW_SECS: f64 = 30.0;

/// One entry of a VOD manifest.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VodSegment {
    pub index: u64,
    pub duration: f64,
}

/// Split a recording of `duration` seconds into fixed windows.
///
/// Every segment is `window` long except the last, which holds the
/// remainder. A non-positive or non-finite duration yields no segments.
pub fn build_vod_manifest(duration: f64, window: f64) -> Vec<VodSegment> {
    if !duration.is_finite() || duration <= 0.0 || !window.is_finite() || window <= 0.0 {
        return Vec::new();
    }

    let count = (duration / window).ceil() as u64;
    (0..count)
        .map(|index| VodSegment {
            index,
            duration: window.min(duration - index as f64 * window),
        })
        .filter(|segment| segment.duration > 0.0)
        .collect()
}

/// Render a VOD playlist whose segments point at `/video/{id}/stream/{i}.ts`.
///
/// The playlist is complete (`#EXT-X-ENDLIST`); an empty segment list still
/// renders a valid, immediately ended playlist.
pub fn render_vod_playlist(recording_id: &str, segments: &[VodSegment]) -> String {
    let mut playlist = format!(
        "#EXTM3U\n\
         #EXT-X-VERSION:3\n\
         #EXT-X-PLAYLIST-TYPE:VOD\n\
         #EXT-X-TARGETDURATION:{}\n\
         #EXT-X-MEDIA-SEQUENCE:0\n\
         #EXT-X-ALLOW-CACHE:YES\n",
        VOD_WINDOW_SECS as u64
    );

    for segment in segments {
        // Writing to a String cannot fail
        let _ = write!(
            playlist,
            "#EXTINF:{:.6},\n/video/{}/stream/{}.ts\n",
            segment.duration, recording_id, segment.index
        );
    }

    playlist.push_str("#EXT-X-ENDLIST\n");
    playlist
}
