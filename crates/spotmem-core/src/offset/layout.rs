//! Version-pinned memory layouts of the player.
//!
//! Every constant that depends on the player build lives here as data so a
//! config file can re-pin it without a rebuild.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::offset::PointerRegistry;
use crate::process::ReadMemory;

/// Registry field names used by the playback layout.
pub mod fields {
    pub const POSITION: &str = "position";
    pub const LENGTH: &str = "length";
    pub const IS_PLAYING: &str = "is_playing";
}

/// Where to find the `spotify:track:<id>` string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackIdLayout {
    /// Module whose base the offsets are relative to
    pub anchor_module: String,
    /// Text directly preceding the id
    pub prefix: String,
    /// Length of the id in bytes
    pub id_length: usize,
    /// Offsets from the module base seen in past builds, most recent first
    pub historical_offsets: Vec<u64>,
    /// The fallback scan extends this many offset spreads past the known range
    pub scan_spread_factor: u64,
}

impl Default for TrackIdLayout {
    fn default() -> Self {
        Self {
            anchor_module: "chrome_elf.dll".to_string(),
            prefix: "spotify:track:".to_string(),
            id_length: 22,
            historical_offsets: vec![
                0x18BC90, // 64-bit 1.2.66
                0x154A60, // 64-bit 1.2.26
                0x14FA30, // 64-bit 1.2.21
                0x106198, // 32-bit 1.2.21
                0x14C9F0, 0x102178, 0x1499F0, 0xFEFE8,
            ],
            scan_spread_factor: 3,
        }
    }
}

impl TrackIdLayout {
    /// Range to scan for the prefix when no historical offset validates.
    ///
    /// `None` when there are no historical offsets to center the scan on.
    pub fn scan_range(&self, module_base: u64) -> Option<(u64, u64)> {
        let min = *self.historical_offsets.iter().min()?;
        let max = *self.historical_offsets.iter().max()?;
        let threshold = (max - min).saturating_mul(self.scan_spread_factor);

        let start = module_base.saturating_add(min).saturating_sub(threshold);
        let end = module_base.saturating_add(max).saturating_add(threshold);
        Some((start, end))
    }

    /// Address of the id given the address of its prefix
    pub fn id_address(&self, prefix_address: u64) -> u64 {
        prefix_address + self.prefix.len() as u64
    }
}

/// Text that must appear at a fixed distance from a playback anchor candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marker {
    pub offset: i64,
    pub text: String,
}

impl Marker {
    pub fn new(offset: i64, text: impl Into<String>) -> Self {
        Self {
            offset,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParityKind {
    /// The byte read as a bool (`== 1`) must differ from the playing flag
    FlagDiffersFromPlaying,
    /// "The byte is zero" must differ from the playing flag
    ZeroDiffersFromPlaying,
}

/// A byte near the playback structure whose value tracks the playing flag.
///
/// Used to reject candidates that only look like the structure by chance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParityRule {
    pub field: String,
    /// Address in the reference build
    pub address: u64,
    pub kind: ParityKind,
}

impl ParityRule {
    pub fn new(field: impl Into<String>, address: u64, kind: ParityKind) -> Self {
        Self {
            field: field.into(),
            address,
            kind,
        }
    }

    pub fn holds(&self, byte: u8, is_playing: bool) -> bool {
        match self.kind {
            ParityKind::FlagDiffersFromPlaying => (byte == 1) != is_playing,
            ParityKind::ZeroDiffersFromPlaying => (byte == 0) != is_playing,
        }
    }
}

/// Layout of the playback structure (position, length, playing flag).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackLayout {
    /// Text located at the structure base
    pub anchor: String,
    pub markers: Vec<Marker>,
    /// Structure base in the reference build
    pub reference_base: u64,
    pub position: u64,
    pub length: u64,
    pub is_playing: u64,
    pub parity: Vec<ParityRule>,
    pub min_length_ms: i32,
    pub max_length_ms: i32,
}

impl Default for PlaybackLayout {
    fn default() -> Self {
        Self {
            anchor: "playing".to_string(),
            markers: vec![Marker::new(0x08, "paused")],
            reference_base: 0x0D3A2064,
            position: 0x0D3A2178,
            length: 0x0D3A2188,
            is_playing: 0x0D3A21AC,
            parity: vec![
                ParityRule::new("parity_1", 0x0D3A2199, ParityKind::FlagDiffersFromPlaying),
                ParityRule::new("parity_2", 0x0D3A21A4, ParityKind::FlagDiffersFromPlaying),
                ParityRule::new("parity_3", 0x0D3A216E, ParityKind::ZeroDiffersFromPlaying),
            ],
            min_length_ms: 1000,
            max_length_ms: 10 * 60 * 1000,
        }
    }
}

/// Raw values read through a playback registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackReading {
    pub position: i32,
    pub length: i32,
    pub is_playing: bool,
    /// Range and parity checks passed
    pub valid: bool,
}

impl PlaybackLayout {
    /// Registry for a structure whose live base is `discovered_base`
    pub fn registry(&self, discovered_base: u64) -> PointerRegistry {
        let mut registry = PointerRegistry::new(self.reference_base, discovered_base)
            .with_field(fields::POSITION, self.position)
            .with_field(fields::LENGTH, self.length)
            .with_field(fields::IS_PLAYING, self.is_playing);
        for rule in &self.parity {
            registry.register(rule.field.clone(), rule.address);
        }
        registry
    }

    /// Position and length are within the plausible range for a track
    pub fn is_plausible(&self, position: i32, length: i32) -> bool {
        position >= 0
            && position <= length
            && length >= self.min_length_ms
            && length <= self.max_length_ms
    }

    /// Every marker text is present at its offset from `candidate`
    pub fn markers_match<R: ReadMemory + ?Sized>(&self, reader: &R, candidate: u64) -> bool {
        self.markers.iter().all(|marker| {
            let address = candidate.wrapping_add_signed(marker.offset);
            reader
                .read_bytes(address, marker.text.len())
                .is_ok_and(|bytes| bytes == marker.text.as_bytes())
        })
    }

    /// Read position, length and playing flag and check them.
    ///
    /// Read failures are errors; implausible values are a reading with
    /// `valid == false`.
    pub fn read<R: ReadMemory + ?Sized>(
        &self,
        reader: &R,
        registry: &PointerRegistry,
    ) -> Result<PlaybackReading> {
        let position = reader.read_i32(registry.address(fields::POSITION)?)?;
        let length = reader.read_i32(registry.address(fields::LENGTH)?)?;
        let is_playing = reader.read_bool(registry.address(fields::IS_PLAYING)?)?;

        let mut valid = self.is_plausible(position, length);
        if valid {
            for rule in &self.parity {
                let byte = reader.read_u8(registry.address(&rule.field)?)?;
                if !rule.holds(byte, is_playing) {
                    valid = false;
                    break;
                }
            }
        }

        Ok(PlaybackReading {
            position,
            length,
            is_playing,
            valid,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::MockMemoryBuilder;

    /// Memory with a default-layout structure whose base sits at 0x1000 + 0x10
    fn structure(position: i32, length: i32, playing: bool, parity: [u8; 3]) -> MockMemoryBuilder {
        let base = 0x10;
        let rel = |reference: u64| base + (reference - 0x0D3A2064) as usize;
        MockMemoryBuilder::new()
            .with_size(0x200)
            .write_bytes(base, b"playing")
            .write_bytes(base + 8, b"paused")
            .write_i32(rel(0x0D3A2178), position)
            .write_i32(rel(0x0D3A2188), length)
            .write_u8(rel(0x0D3A21AC), playing as u8)
            .write_u8(rel(0x0D3A2199), parity[0])
            .write_u8(rel(0x0D3A21A4), parity[1])
            .write_u8(rel(0x0D3A216E), parity[2])
    }

    #[test]
    fn test_track_id_scan_range() {
        let layout = TrackIdLayout::default();
        let (start, end) = layout.scan_range(0x7FF8_0000_0000).unwrap();

        let spread = 0x18BC90 - 0xFEFE8;
        assert_eq!(start, 0x7FF8_0000_0000 + 0xFEFE8 - spread * 3);
        assert_eq!(end, 0x7FF8_0000_0000 + 0x18BC90 + spread * 3);
    }

    #[test]
    fn test_track_id_scan_range_saturates_at_zero() {
        let layout = TrackIdLayout::default();
        let (start, _) = layout.scan_range(0).unwrap();
        assert_eq!(start, 0);
    }

    #[test]
    fn test_track_id_scan_range_without_offsets() {
        let layout = TrackIdLayout {
            historical_offsets: Vec::new(),
            ..Default::default()
        };
        assert_eq!(layout.scan_range(0x1000), None);
    }

    #[test]
    fn test_parity_rules() {
        let flag = ParityRule::new("p", 0, ParityKind::FlagDiffersFromPlaying);
        assert!(flag.holds(0, true));
        assert!(flag.holds(1, false));
        assert!(!flag.holds(1, true));
        // Only 1 counts as a set flag
        assert!(flag.holds(2, true));

        let zero = ParityRule::new("p", 0, ParityKind::ZeroDiffersFromPlaying);
        assert!(zero.holds(5, true));
        assert!(zero.holds(0, false));
        assert!(!zero.holds(0, true));
    }

    #[test]
    fn test_plausibility_bounds() {
        let layout = PlaybackLayout::default();
        assert!(layout.is_plausible(0, 1000));
        assert!(layout.is_plausible(600_000, 600_000));
        assert!(!layout.is_plausible(0, 999));
        assert!(!layout.is_plausible(0, 600_001));
        assert!(!layout.is_plausible(-1, 5000));
        assert!(!layout.is_plausible(5001, 5000));
    }

    #[test]
    fn test_read_valid_structure() {
        let layout = PlaybackLayout::default();
        let reader = structure(42_000, 180_000, true, [0, 0, 7]).build();
        let registry = layout.registry(0x1010);

        assert!(layout.markers_match(&reader, 0x1010));
        let reading = layout.read(&reader, &registry).unwrap();
        assert_eq!(reading.position, 42_000);
        assert_eq!(reading.length, 180_000);
        assert!(reading.is_playing);
        assert!(reading.valid);
    }

    #[test]
    fn test_read_paused_structure() {
        let layout = PlaybackLayout::default();
        let reader = structure(1000, 200_000, false, [1, 1, 0]).build();

        let reading = layout.read(&reader, &layout.registry(0x1010)).unwrap();
        assert!(!reading.is_playing);
        assert!(reading.valid);
    }

    #[test]
    fn test_read_parity_mismatch_is_invalid() {
        let layout = PlaybackLayout::default();
        let reader = structure(42_000, 180_000, true, [1, 0, 7]).build();

        let reading = layout.read(&reader, &layout.registry(0x1010)).unwrap();
        assert!(!reading.valid);
    }

    #[test]
    fn test_markers_mismatch() {
        let layout = PlaybackLayout::default();
        let reader = structure(0, 5000, true, [0, 0, 1])
            .write_bytes(0x18, b"stoppd")
            .build();
        assert!(!layout.markers_match(&reader, 0x1010));
    }

    #[test]
    fn test_layout_from_toml() {
        let layout: PlaybackLayout = toml::from_str(
            r#"
            anchor = "ctx"
            reference_base = 0x100
            parity = [{ field = "p", address = 0x180, kind = "zero_differs_from_playing" }]
            "#,
        )
        .unwrap();

        assert_eq!(layout.anchor, "ctx");
        assert_eq!(layout.reference_base, 0x100);
        assert_eq!(layout.parity.len(), 1);
        assert_eq!(layout.parity[0].kind, ParityKind::ZeroDiffersFromPlaying);
        assert_eq!(layout.position, PlaybackLayout::default().position);
    }
}
