use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::playback::SourceKind;
use crate::track::Track;

/// Session state owned by the engine.
#[derive(Debug, Clone, Default)]
pub struct PlaybackState {
    pub current_track: Option<Track>,
    /// Anchor position in ms at `last_position_update`
    pub current_position: Option<u32>,
    pub position_known: bool,
    pub is_playing: bool,
    pub last_position_update: Option<Instant>,
    /// Last position exactly as the source reported it
    pub last_raw_position: Option<u32>,
    pub connected: bool,
}

impl PlaybackState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Estimated position at `now`.
    ///
    /// While playing, the anchor advances with wall time. The result never
    /// exceeds the track length when that is known.
    pub fn interpolate(&self, now: Instant) -> Option<u32> {
        let current = self.current_position?;
        let estimate = if self.is_playing {
            let elapsed = self
                .last_position_update
                .map(|at| now.saturating_duration_since(at).as_millis())
                .unwrap_or(0);
            u32::try_from(u128::from(current) + elapsed).unwrap_or(u32::MAX)
        } else {
            current
        };

        match self.track_length() {
            Some(length) => Some(estimate.min(length)),
            None => Some(estimate),
        }
    }

    /// Interpolated position, only once it is trusted
    pub fn position(&self, now: Instant) -> Option<u32> {
        if self.position_known {
            self.interpolate(now)
        } else {
            None
        }
    }

    fn track_length(&self) -> Option<u32> {
        self.current_track
            .as_ref()
            .filter(|t| t.has_length())
            .map(|t| t.length)
    }

    /// Move the anchor to `position` at `now`
    pub fn anchor(&mut self, position: u32, now: Instant) {
        self.current_position = Some(position);
        self.last_position_update = Some(now);
    }
}

/// Connection lifecycle as seen by the engine.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Point-in-time view of the engine.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub initialized: bool,
    pub connection: ConnectionState,
    pub source: Option<SourceKind>,
    pub track: Option<Track>,
    /// Interpolated position in ms, only when known
    pub position: Option<u32>,
    pub is_playing: bool,
    pub last_sync: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn playing_at(position: u32, length: u32, now: Instant) -> PlaybackState {
        let mut state = PlaybackState {
            current_track: Some(Track::new("4uLU6hMCjMI75M1A2tKUQC", "Song", "Artist", length)),
            is_playing: true,
            position_known: true,
            ..Default::default()
        };
        state.anchor(position, now);
        state
    }

    #[test]
    fn test_interpolate_advances_while_playing() {
        let start = Instant::now();
        let state = playing_at(1000, 200_000, start);

        assert_eq!(state.interpolate(start), Some(1000));
        assert_eq!(
            state.interpolate(start + Duration::from_millis(2500)),
            Some(3500)
        );
    }

    #[test]
    fn test_interpolate_is_monotonic() {
        let start = Instant::now();
        let state = playing_at(0, 10_000, start);

        let mut previous = 0;
        for step in 0..30 {
            let position = state
                .interpolate(start + Duration::from_millis(step * 700))
                .unwrap();
            assert!(position >= previous);
            previous = position;
        }
    }

    #[test]
    fn test_interpolate_clamped_to_length() {
        let start = Instant::now();
        let state = playing_at(9000, 10_000, start);

        assert_eq!(
            state.interpolate(start + Duration::from_secs(60)),
            Some(10_000)
        );
    }

    #[test]
    fn test_anchor_past_length_is_clamped() {
        let start = Instant::now();
        let mut state = playing_at(12_000, 10_000, start);

        assert_eq!(state.interpolate(start), Some(10_000));
        assert_eq!(
            state.interpolate(start + Duration::from_secs(5)),
            Some(10_000)
        );

        state.is_playing = false;
        assert_eq!(state.interpolate(start), Some(10_000));
    }

    #[test]
    fn test_interpolate_unclamped_without_length() {
        let start = Instant::now();
        let state = playing_at(9000, 0, start);

        assert_eq!(
            state.interpolate(start + Duration::from_secs(60)),
            Some(69_000)
        );
    }

    #[test]
    fn test_interpolate_paused_holds() {
        let start = Instant::now();
        let mut state = playing_at(5000, 200_000, start);
        state.is_playing = false;

        assert_eq!(state.interpolate(start + Duration::from_secs(5)), Some(5000));
    }

    #[test]
    fn test_position_hidden_until_known() {
        let start = Instant::now();
        let mut state = playing_at(5000, 200_000, start);
        state.position_known = false;

        assert_eq!(state.position(start), None);
        assert_eq!(state.interpolate(start), Some(5000));
    }

    #[test]
    fn test_connection_state_names() {
        assert_eq!(ConnectionState::Connected.to_string(), "connected");
        assert_eq!(
            "error".parse::<ConnectionState>().unwrap(),
            ConnectionState::Error
        );
    }
}
