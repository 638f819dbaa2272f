pub mod config;
pub mod engine;
pub mod error;
pub mod metadata;
pub mod offset;
pub mod playback;
pub mod process;
pub mod track;

pub use config::EngineConfig;
pub use engine::{
    ConnectionState, Engine, EngineBuilder, EngineStatus, ListenerId, PlaybackListener,
    PlaybackState, TickStatus,
};
pub use error::{Error, Result};
pub use metadata::{MetadataProvider, TokenRetry, TrackMetadata};
pub use offset::{DiscoveryCache, PatternScanner, PointerRegistry, SearchRule};
pub use playback::{
    PlaybackSample, PlaybackSource, ProcessConnector, ProcessSource, SourceConnector, SourceKind,
    WindowTitle,
};
pub use process::{MediaKey, MediaKeySender, ProcessHandle, ReadMemory, SystemMediaKeys};
pub use track::{Track, is_valid_track_id};
