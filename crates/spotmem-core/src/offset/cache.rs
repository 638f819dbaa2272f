//! Discovery cache for faster reconnects
//!
//! Remembers the addresses found for one player process so a reconnect to the
//! same process skips the memory scan. Addresses are only meaningful for the
//! process id they were found in; a different id misses.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::Result;

/// Cache file name inside the data directory
pub const CACHE_FILE: &str = ".spotmem-cache.json";

/// Addresses discovered in one process instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredAddresses {
    pub pid: u32,
    /// Address of the track id prefix
    pub track_id: Option<u64>,
    /// Base of the playback structure
    pub playback_base: Option<u64>,
    pub created_at: DateTime<Utc>,
}

impl DiscoveredAddresses {
    pub fn new(pid: u32, track_id: Option<u64>, playback_base: Option<u64>) -> Self {
        Self {
            pid,
            track_id,
            playback_base,
            created_at: Utc::now(),
        }
    }

    /// Load an entry from a JSON file
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let path = path.as_ref();

        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                debug!("Cache file not found or unreadable: {}", e);
                return None;
            }
        };

        match serde_json::from_str::<DiscoveredAddresses>(&content) {
            Ok(entry) => {
                debug!(
                    "Loaded cache: pid={}, created_at={}",
                    entry.pid, entry.created_at
                );
                Some(entry)
            }
            Err(e) => {
                warn!("Failed to parse cache file: {}", e);
                None
            }
        }
    }

    /// Save the entry as JSON
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        debug!("Saved discovery cache to {}", path.display());
        Ok(())
    }
}

#[derive(Debug, Default)]
struct CacheState {
    loaded: bool,
    entry: Option<DiscoveredAddresses>,
}

/// Shared, lazily populated discovery cache.
///
/// Meant to be wrapped in an `Arc` and handed to every connector that should
/// share it. With a backing file the entry is read on first lookup and written
/// on every store.
#[derive(Debug, Default)]
pub struct DiscoveryCache {
    path: Option<PathBuf>,
    state: Mutex<CacheState>,
}

impl DiscoveryCache {
    /// Cache that lives only as long as the process
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Cache backed by a JSON file
    pub fn persistent<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: Some(path.into()),
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Cache backed by [`CACHE_FILE`] inside `data_dir`
    pub fn in_dir<P: AsRef<Path>>(data_dir: P) -> Self {
        Self::persistent(data_dir.as_ref().join(CACHE_FILE))
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Cached addresses for `pid`, if any
    pub fn lookup(&self, pid: u32) -> Option<DiscoveredAddresses> {
        let mut state = self.state.lock().ok()?;
        if !state.loaded {
            state.loaded = true;
            if let Some(path) = &self.path {
                state.entry = DiscoveredAddresses::load_from_path(path);
            }
        }

        match &state.entry {
            Some(entry) if entry.pid == pid => Some(entry.clone()),
            Some(entry) => {
                debug!("Cache is for PID {}, not {}", entry.pid, pid);
                None
            }
            None => None,
        }
    }

    /// Replace the cached entry
    pub fn store(&self, entry: DiscoveredAddresses) {
        if let Some(path) = &self.path {
            match entry.save_to_path(path) {
                Ok(()) => info!("Saved discovery cache for PID {}", entry.pid),
                Err(e) => warn!("Failed to save discovery cache: {}", e),
            }
        }

        if let Ok(mut state) = self.state.lock() {
            state.loaded = true;
            state.entry = Some(entry);
        }
    }

    /// Forget the cached entry (the backing file is left alone)
    pub fn invalidate(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.loaded = true;
            state.entry = None;
        }
    }
}
