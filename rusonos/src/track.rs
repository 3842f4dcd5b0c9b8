//! Playback info types and the metadata heuristics behind them.

use std::collections::HashMap;

use rusonos_parsers::parse_didl;
use xmltree::Element;

/// Current playback state of a player, from `GetTransportInfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportInfo {
    /// `PLAYING`, `TRANSITIONING`, `PAUSED_PLAYBACK` or `STOPPED`.
    pub state: String,
    /// `OK`, as far as anyone knows.
    pub status: String,
    /// Playback speed; `1` in practice.
    pub speed: String,
}

impl TransportInfo {
    pub(crate) fn from_args(args: &HashMap<String, String>) -> Self {
        let get = |key: &str| args.get(key).cloned().unwrap_or_default();
        Self {
            state: get("CurrentTransportState"),
            status: get("CurrentTransportStatus"),
            speed: get("CurrentSpeed"),
        }
    }
}

/// What the player is currently playing, from `GetPositionInfo`.
///
/// Fields that could not be determined are empty strings (a track may
/// simply lack an album name, and radio streams carry very little metadata
/// at all), so check values before relying on them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TrackInfo {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub album_art: String,
    /// Position within the track, `H:MM:SS`.
    pub position: String,
    /// 1-based position within the queue.
    pub playlist_position: String,
    pub duration: String,
    pub uri: String,
    /// The raw DIDL-Lite metadata, kept so callers can restart this URI.
    pub metadata: String,
}

/// Interpret a `GetPositionInfo` result.
///
/// The metadata needs per-source heuristics: radio streams report a
/// duration of `0:00:00` and smuggle "artist - title" through the
/// `streamContent` element, line-in reports the literal `NOT_IMPLEMENTED`,
/// and everything else is ordinary DIDL-Lite.
pub(crate) fn parse_track_info(args: &HashMap<String, String>) -> TrackInfo {
    let get = |key: &str| args.get(key).cloned().unwrap_or_default();

    let mut track = TrackInfo {
        playlist_position: get("Track"),
        duration: get("TrackDuration"),
        uri: get("TrackURI"),
        position: get("RelTime"),
        metadata: get("TrackMetaData"),
        ..TrackInfo::default()
    };

    let metadata = track.metadata.clone();
    if !metadata.is_empty() && metadata != "NOT_IMPLEMENTED" && track.duration == "0:00:00" {
        // Radio stream: whatever metadata exists is in streamContent.
        if let Ok(tree) = Element::parse(metadata.as_bytes()) {
            let stream_content = find_text(&tree, "streamContent").unwrap_or_default();
            match stream_content.split_once(" - ") {
                Some((artist, title)) => {
                    track.artist = artist.to_string();
                    track.title = title.to_string();
                }
                None => {
                    track.title = find_text(&tree, "title").unwrap_or(stream_content);
                }
            }
        }
    } else if !metadata.is_empty() && metadata != "NOT_IMPLEMENTED" {
        match parse_didl(&metadata) {
            Ok(items) if !items.is_empty() => {
                let item = &items[0];
                track.title = item.title.clone().unwrap_or_default();
                track.artist = item.creator.clone().unwrap_or_default();
                track.album = item.album.clone().unwrap_or_default();
                track.album_art = item.album_art_uri.clone().unwrap_or_default();
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "undecodable track metadata");
            }
        }
    }

    track
}

/// Text of the first descendant with the given local name.
fn find_text(element: &Element, name: &str) -> Option<String> {
    for child in element.children.iter().filter_map(|node| node.as_element()) {
        if child.name == name {
            return child.get_text().map(|t| t.into_owned());
        }
        if let Some(found) = find_text(child, name) {
            return Some(found);
        }
    }
    None
}
