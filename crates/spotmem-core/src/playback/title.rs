use std::fmt;

use serde::{Deserialize, Serialize};

/// Separator between artist and track name in the player's window title.
pub const DELIMITER: &str = " - ";

/// Track name and artist shown in the player's window title.
///
/// While a track plays the title reads `Artist - Name`; when paused it shows
/// only the application name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowTitle {
    pub name: String,
    pub artist: String,
}

impl WindowTitle {
    pub fn new(name: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            artist: artist.into(),
        }
    }

    /// Placeholder used before any track has been seen
    pub fn unknown() -> Self {
        Self::new("Unknown", "No song playing")
    }

    /// Parse `Artist - Name`; `None` when the delimiter is missing.
    ///
    /// Only the first delimiter splits, so a name containing `" - "` stays whole.
    pub fn parse(title: &str) -> Option<Self> {
        let (artist, name) = title.split_once(DELIMITER)?;
        Some(Self::new(name, artist))
    }
}

impl Default for WindowTitle {
    fn default() -> Self {
        Self::unknown()
    }
}

impl fmt::Display for WindowTitle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.name, DELIMITER, self.artist)
    }
}

/// Keeps the last title that carried a track.
#[derive(Debug, Clone, Default)]
pub struct TitleCache {
    previous: Option<WindowTitle>,
}

impl TitleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a raw window title.
    ///
    /// Returns the title it carries, or the last one seen while paused.
    /// `None` until a title with a track has been seen.
    pub fn update(&mut self, raw: &str) -> Option<&WindowTitle> {
        if let Some(title) = WindowTitle::parse(raw) {
            self.previous = Some(title);
        }
        self.previous.as_ref()
    }

    /// Last known title, or the placeholder
    pub fn current(&self) -> WindowTitle {
        self.previous.clone().unwrap_or_default()
    }
}

/// Whether the raw window title indicates a playing track
pub fn is_playing_title(raw: &str) -> bool {
    raw.contains(DELIMITER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_artist_then_name() {
        let title = WindowTitle::parse("Daft Punk - One More Time").unwrap();
        assert_eq!(title.artist, "Daft Punk");
        assert_eq!(title.name, "One More Time");
    }

    #[test]
    fn test_parse_keeps_later_delimiters_in_name() {
        let title = WindowTitle::parse("Artist - Song - Remastered 2011").unwrap();
        assert_eq!(title.artist, "Artist");
        assert_eq!(title.name, "Song - Remastered 2011");
    }

    #[test]
    fn test_parse_without_delimiter() {
        assert_eq!(WindowTitle::parse("Spotify Premium"), None);
        assert_eq!(WindowTitle::parse("AC-DC"), None);
    }

    #[test]
    fn test_cache_keeps_previous_title_when_paused() {
        let mut cache = TitleCache::new();
        assert_eq!(cache.update("Spotify Free"), None);
        assert_eq!(cache.current(), WindowTitle::unknown());

        cache.update("Artist - Song");
        let title = cache.update("Spotify Free").cloned();
        assert_eq!(title, Some(WindowTitle::new("Song", "Artist")));
        assert_eq!(cache.current(), WindowTitle::new("Song", "Artist"));
    }

    #[test]
    fn test_is_playing_title() {
        assert!(is_playing_title("Artist - Song"));
        assert!(!is_playing_title("Spotify"));
        assert!(!is_playing_title(""));
    }
}
