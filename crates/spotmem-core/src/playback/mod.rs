//! Playback sources: where each tick's raw sample comes from.

mod memory;
mod pseudo;
mod source;
pub mod title;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::Result;

pub use memory::MemoryPlaybackSource;
pub use pseudo::PseudoPlaybackSource;
pub use source::{ProcessConnector, ProcessSource, SourceConnector};
pub use title::{TitleCache, WindowTitle};

/// One raw reading of the player, taken once per tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackSample {
    /// Track id as read, possibly empty or malformed
    pub track_id: String,
    /// Position in ms, `None` when the source cannot tell
    pub position: Option<u32>,
    /// Track length in ms, `None` when the source cannot tell
    pub length: Option<u32>,
    pub is_playing: bool,
    /// Passed the source's own consistency checks
    pub valid: bool,
    /// Name and artist read next to the sample
    pub title: Option<WindowTitle>,
}

impl PlaybackSample {
    pub fn new(track_id: impl Into<String>, is_playing: bool) -> Self {
        Self {
            track_id: track_id.into(),
            position: None,
            length: None,
            is_playing,
            valid: true,
            title: None,
        }
    }

    pub fn with_position(mut self, position: u32) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_title(mut self, title: WindowTitle) -> Self {
        self.title = Some(title);
        self
    }

    pub fn invalid(mut self) -> Self {
        self.valid = false;
        self
    }
}

/// Which strategy produced a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Position, length and playing flag read from memory
    Memory,
    /// Playing flag guessed from the window title
    Pseudo,
    /// Anything provided by the application
    External,
}

/// A provider of playback samples.
pub trait PlaybackSource: Send {
    /// Take a new sample.
    ///
    /// `Err` means the source is broken for good; a sample with
    /// `valid == false` means this one reading could not be trusted.
    fn refresh(&mut self) -> Result<PlaybackSample>;

    /// Whether the source can still produce samples
    fn is_usable(&self) -> bool;

    fn kind(&self) -> SourceKind {
        SourceKind::External
    }
}

impl<S: PlaybackSource + ?Sized> PlaybackSource for Box<S> {
    fn refresh(&mut self) -> Result<PlaybackSample> {
        (**self).refresh()
    }

    fn is_usable(&self) -> bool {
        (**self).is_usable()
    }

    fn kind(&self) -> SourceKind {
        (**self).kind()
    }
}
