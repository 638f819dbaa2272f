use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Length of a track id (the part after `spotify:track:`).
pub const TRACK_ID_LENGTH: usize = 22;

/// Check that `id` has exactly 22 ASCII letters or digits.
pub fn is_valid_track_id(id: &str) -> bool {
    is_alphanumeric_id(id, TRACK_ID_LENGTH)
}

/// Check that `id` has exactly `length` ASCII letters or digits.
pub fn is_alphanumeric_id(id: &str, length: usize) -> bool {
    id.len() == length && id.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// A track as seen by the player.
///
/// Two tracks are equal when their ids are equal, whatever the other fields say.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    pub artist: String,
    /// Length in milliseconds, 0 when the source cannot tell
    pub length: u32,
    #[serde(skip)]
    pub cover_art: Option<Vec<u8>>,
}

impl Track {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        artist: impl Into<String>,
        length: u32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            artist: artist.into(),
            length,
            cover_art: None,
        }
    }

    pub fn with_cover_art(mut self, bytes: Vec<u8>) -> Self {
        self.cover_art = Some(bytes);
        self
    }

    pub fn has_length(&self) -> bool {
        self.length > 0
    }
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Track {}

impl Hash for Track {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} - {}", self.id, self.name, self.artist)
    }
}
