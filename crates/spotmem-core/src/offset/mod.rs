//! Memory discovery: where the player keeps the values we read.

pub mod cache;
pub mod layout;
pub mod playback;
mod registry;
mod scanner;
pub mod track_id;

pub use cache::{DiscoveredAddresses, DiscoveryCache};
pub use layout::{Marker, ParityKind, ParityRule, PlaybackLayout, PlaybackReading, TrackIdLayout};
pub use playback::find_playback_registry;
pub use registry::PointerRegistry;
pub use scanner::{PatternScanner, SearchRule};
pub use track_id::{find_track_id_address, read_track_id};
