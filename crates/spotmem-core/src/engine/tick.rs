//! Reconciliation of one sample against the session state.

use std::time::Instant;

use tracing::debug;

use crate::engine::listener::Event;
use crate::engine::state::PlaybackState;
use crate::metadata::TrackMetadata;
use crate::playback::{PlaybackSample, WindowTitle};
use crate::track::{Track, is_valid_track_id};

/// Apply `sample` to `state` and return the events it produced, in dispatch order.
///
/// `seek_threshold_ms` is the largest gap between a raw position and the
/// interpolated one that still counts as drift. `lookup` is consulted for name
/// and artist only when the sample carries no window title.
pub fn reconcile(
    state: &mut PlaybackState,
    sample: &PlaybackSample,
    now: Instant,
    seek_threshold_ms: u32,
    lookup: impl FnOnce(&str) -> Option<TrackMetadata>,
) -> Vec<Event> {
    let mut events = Vec::new();

    if is_valid_track_id(&sample.track_id)
        && state.current_track.as_ref().map(|t| t.id.as_str()) != Some(sample.track_id.as_str())
    {
        let first = state.current_track.is_none();
        let track = build_track(sample, lookup);
        debug!("Track changed: {}", track);

        state.current_track = Some(track.clone());
        events.push(Event::TrackChanged(track));

        if !first {
            state.anchor(0, now);
            state.position_known = true;
            events.push(Event::PositionChanged(0));
        }
    }

    if sample.is_playing != state.is_playing {
        if let Some(position) = state.interpolate(now) {
            state.anchor(position, now);
        }
        state.is_playing = sample.is_playing;
        if !state.is_playing && state.current_position.is_some() {
            state.position_known = true;
        }
        debug!("Playing: {}", state.is_playing);
        events.push(Event::PlaybackChanged(state.is_playing));
    }

    if let Some(raw) = sample.position
        && state.last_raw_position != Some(raw)
    {
        let had_raw = state.last_raw_position.is_some();
        if let Some(expected) = state.interpolate(now)
            && raw.abs_diff(expected) > seek_threshold_ms
        {
            debug!("Seek detected: expected {} ms, read {} ms", expected, raw);
            events.push(Event::PositionChanged(raw));
        }

        state.anchor(raw, now);
        state.last_raw_position = Some(raw);
        if had_raw || !state.is_playing {
            state.position_known = true;
        }
    }

    events.push(Event::Sync);
    events
}

fn build_track(
    sample: &PlaybackSample,
    lookup: impl FnOnce(&str) -> Option<TrackMetadata>,
) -> Track {
    let length = sample.length;
    let (title, metadata_length) = match &sample.title {
        Some(title) => (title.clone(), None),
        None => match lookup(&sample.track_id) {
            Some(metadata) => (
                WindowTitle::new(metadata.name, metadata.artist),
                metadata.length,
            ),
            None => (WindowTitle::unknown(), None),
        },
    };

    Track::new(
        sample.track_id.clone(),
        title.name,
        title.artist,
        length.or(metadata_length).unwrap_or(0),
    )
}
