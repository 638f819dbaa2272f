//! Engine configuration.
//!
//! This module contains:
//! - `EngineConfig` and its builder
//! - TOML loading for config files
//! - Timing and scan constants shared by the engine and the discovery code

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::offset::{PlaybackLayout, TrackIdLayout};

/// Tick and reconnect timing defaults.
pub mod timing {
    /// Delay between two ticks of the engine worker (ms).
    pub const TICK_INTERVAL_MS: u64 = 1000;

    /// Delay before reconnecting after a failed tick (ms).
    pub const EXCEPTION_RECONNECT_DELAY_MS: u64 = 10_000;
}

/// Memory scan configuration.
pub mod scan {
    /// Chunk size for pattern scans (64KB).
    pub const CHUNK_SIZE: usize = 64 * 1024;
}

/// Executable name of the player process.
pub const DEFAULT_PROCESS_NAME: &str = "Spotify.exe";

/// Cache and helper file directory name, relative to the user data dir.
pub const DEFAULT_DATA_DIR: &str = "spotmem";

/// Configuration for the reconciliation engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Executable name of the player
    pub process_name: String,
    /// Delay between ticks (ms)
    pub tick_interval_ms: u64,
    /// Minimum delay between a failed tick and the next reconnect attempt (ms)
    pub exception_reconnect_delay_ms: u64,
    /// Whether the engine reconnects on its own after a failed tick
    pub auto_reconnect: bool,
    /// Directory for extracted helper files and the discovery cache
    pub data_dir: PathBuf,
    /// Track id discovery layout
    pub track_id: TrackIdLayout,
    /// Playback structure discovery layout
    pub playback: PlaybackLayout,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            process_name: DEFAULT_PROCESS_NAME.to_string(),
            tick_interval_ms: timing::TICK_INTERVAL_MS,
            exception_reconnect_delay_ms: timing::EXCEPTION_RECONNECT_DELAY_MS,
            auto_reconnect: true,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            track_id: TrackIdLayout::default(),
            playback: PlaybackLayout::default(),
        }
    }
}

impl EngineConfig {
    /// Create a new configuration builder
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Load a configuration from a TOML file.
    ///
    /// Missing keys fall back to their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse a configuration from TOML content
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigParseError(e.to_string()))
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn exception_reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.exception_reconnect_delay_ms)
    }
}

/// Builder for EngineConfig
#[derive(Debug, Clone, Default)]
pub struct EngineConfigBuilder {
    process_name: Option<String>,
    tick_interval_ms: Option<u64>,
    exception_reconnect_delay_ms: Option<u64>,
    auto_reconnect: Option<bool>,
    data_dir: Option<PathBuf>,
    track_id: Option<TrackIdLayout>,
    playback: Option<PlaybackLayout>,
}

impl EngineConfigBuilder {
    /// Set the executable name of the player
    pub fn process_name<S: Into<String>>(mut self, name: S) -> Self {
        self.process_name = Some(name.into());
        self
    }

    /// Set the delay between ticks
    pub fn tick_interval_ms(mut self, ms: u64) -> Self {
        self.tick_interval_ms = Some(ms);
        self
    }

    /// Set the delay between reconnects when a tick fails
    pub fn exception_reconnect_delay_ms(mut self, ms: u64) -> Self {
        self.exception_reconnect_delay_ms = Some(ms);
        self
    }

    /// Enable or disable automatic reconnects
    pub fn auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = Some(enabled);
        self
    }

    /// Set the directory for helper files and the discovery cache
    pub fn data_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.data_dir = Some(path.into());
        self
    }

    /// Override the track id layout
    pub fn track_id_layout(mut self, layout: TrackIdLayout) -> Self {
        self.track_id = Some(layout);
        self
    }

    /// Override the playback layout
    pub fn playback_layout(mut self, layout: PlaybackLayout) -> Self {
        self.playback = Some(layout);
        self
    }

    /// Build the configuration
    pub fn build(self) -> EngineConfig {
        let default = EngineConfig::default();
        EngineConfig {
            process_name: self.process_name.unwrap_or(default.process_name),
            tick_interval_ms: self.tick_interval_ms.unwrap_or(default.tick_interval_ms),
            exception_reconnect_delay_ms: self
                .exception_reconnect_delay_ms
                .unwrap_or(default.exception_reconnect_delay_ms),
            auto_reconnect: self.auto_reconnect.unwrap_or(default.auto_reconnect),
            data_dir: self.data_dir.unwrap_or(default.data_dir),
            track_id: self.track_id.unwrap_or(default.track_id),
            playback: self.playback.unwrap_or(default.playback),
        }
    }
}
