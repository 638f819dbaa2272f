//! Source selection at connect time.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::offset::playback::validate_candidate;
use crate::offset::track_id::has_track_id_at;
use crate::offset::{
    DiscoveredAddresses, DiscoveryCache, PointerRegistry, find_playback_registry,
    find_track_id_address,
};
use crate::playback::{
    MemoryPlaybackSource, PlaybackSample, PlaybackSource, PseudoPlaybackSource, SourceKind,
};
use crate::process::{ProcessInfo, ProcessProvider, ReadMemory, SystemProcessProvider};

/// The sources a player process can back, picked once per connection.
pub enum ProcessSource<P> {
    Memory(MemoryPlaybackSource<P>),
    Pseudo(PseudoPlaybackSource<P>),
}

impl<P: ReadMemory + ProcessInfo> ProcessSource<P> {
    /// Run discovery on `process` and pick the richest source that works.
    ///
    /// Discovery failures are not errors: without the playback structure the
    /// pseudo source is used, with the track id if that was found.
    pub fn discover(process: P, config: &EngineConfig, cache: &DiscoveryCache) -> Self {
        let pid = process.pid();
        let cached = cache.lookup(pid);

        let track_id_address = cached
            .as_ref()
            .and_then(|entry| entry.track_id)
            .filter(|&address| has_track_id_at(&process, address, &config.track_id))
            .or_else(|| match find_track_id_address(&process, &config.track_id) {
                Ok(address) => Some(address),
                Err(e) => {
                    warn!("Track id discovery failed: {}", e);
                    None
                }
            });

        let registry = cached
            .as_ref()
            .and_then(|entry| entry.playback_base)
            .filter(|&base| validate_candidate(&process, &config.playback, base))
            .map(|base| {
                debug!("Reusing cached playback base 0x{:X}", base);
                config.playback.registry(base)
            })
            .or_else(|| match find_playback_registry(&process, &config.playback) {
                Ok(registry) => Some(registry),
                Err(e) => {
                    warn!("Playback discovery failed: {}", e);
                    None
                }
            });

        let entry = DiscoveredAddresses::new(
            pid,
            track_id_address,
            registry.as_ref().map(PointerRegistry::discovered_base),
        );
        let unchanged = cached.as_ref().is_some_and(|c| {
            c.track_id == entry.track_id && c.playback_base == entry.playback_base
        });
        if !unchanged {
            cache.store(entry);
        }

        match (track_id_address, registry) {
            (Some(address), Some(registry)) => {
                info!("Using memory playback source");
                ProcessSource::Memory(MemoryPlaybackSource::new(
                    process,
                    address,
                    registry,
                    config.track_id.clone(),
                    config.playback.clone(),
                ))
            }
            (address, _) => {
                warn!("Falling back to window title playback source");
                ProcessSource::Pseudo(PseudoPlaybackSource::new(
                    process,
                    address,
                    config.track_id.clone(),
                ))
            }
        }
    }

    pub fn process(&self) -> &P {
        match self {
            ProcessSource::Memory(source) => source.process(),
            ProcessSource::Pseudo(source) => source.process(),
        }
    }

    /// Address of the track id prefix, if discovery found it
    pub fn track_id_address(&self) -> Option<u64> {
        match self {
            ProcessSource::Memory(source) => Some(source.track_id_address()),
            ProcessSource::Pseudo(source) => source.track_id_address(),
        }
    }

    /// Registry of the playback structure (memory source only)
    pub fn registry(&self) -> Option<&PointerRegistry> {
        match self {
            ProcessSource::Memory(source) => Some(source.registry()),
            ProcessSource::Pseudo(_) => None,
        }
    }
}

impl<P: ReadMemory + ProcessInfo + Send> PlaybackSource for ProcessSource<P> {
    fn refresh(&mut self) -> Result<PlaybackSample> {
        match self {
            ProcessSource::Memory(source) => source.refresh(),
            ProcessSource::Pseudo(source) => source.refresh(),
        }
    }

    fn is_usable(&self) -> bool {
        match self {
            ProcessSource::Memory(source) => source.is_usable(),
            ProcessSource::Pseudo(source) => source.is_usable(),
        }
    }

    fn kind(&self) -> SourceKind {
        match self {
            ProcessSource::Memory(_) => SourceKind::Memory,
            ProcessSource::Pseudo(_) => SourceKind::Pseudo,
        }
    }
}

/// Acquires a fresh playback source for the engine.
pub trait SourceConnector: Send + Sync {
    fn connect(&self) -> Result<Box<dyn PlaybackSource>>;
}

/// Opens the player process and runs discovery on it.
pub struct ProcessConnector<Pr> {
    provider: Pr,
    config: EngineConfig,
    cache: Arc<DiscoveryCache>,
}

impl ProcessConnector<SystemProcessProvider> {
    /// Connector for the real player with a cache file in the data directory
    pub fn system(config: &EngineConfig) -> Self {
        let cache = Arc::new(DiscoveryCache::in_dir(&config.data_dir));
        Self::new(SystemProcessProvider, config, cache)
    }
}

impl<Pr: ProcessProvider> ProcessConnector<Pr>
where
    Pr::Process: ReadMemory + ProcessInfo,
{
    pub fn new(provider: Pr, config: &EngineConfig, cache: Arc<DiscoveryCache>) -> Self {
        Self {
            provider,
            config: config.clone(),
            cache,
        }
    }

    pub fn cache(&self) -> &Arc<DiscoveryCache> {
        &self.cache
    }

    /// Open the process and pick a source for it
    pub fn open(&self) -> Result<ProcessSource<Pr::Process>> {
        let process = self.provider.open_by_name(&self.config.process_name)?;
        info!(
            "Opened {} (PID: {})",
            self.config.process_name,
            process.pid()
        );
        Ok(ProcessSource::discover(process, &self.config, &self.cache))
    }
}

impl<Pr> SourceConnector for ProcessConnector<Pr>
where
    Pr: ProcessProvider + Send + Sync,
    Pr::Process: ReadMemory + ProcessInfo + Send + 'static,
{
    fn connect(&self) -> Result<Box<dyn PlaybackSource>> {
        Ok(Box::new(self.open()?))
    }
}
