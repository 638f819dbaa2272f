//! Tick-driven reconciliation engine.

pub mod clock;
mod listener;
pub mod shutdown;
mod state;
pub mod tick;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{debug, info, trace, warn};

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::metadata::{MetadataProvider, TrackMetadata};
use crate::playback::{PlaybackSource, ProcessConnector, SourceConnector, SourceKind};
use crate::process::{MediaKey, MediaKeySender, SystemMediaKeys};
use crate::track::Track;

pub use clock::{Clock, ManualClock, SystemClock};
use listener::DispatchQueue;
pub use listener::{Event, ListenerId, ListenerSet, PlaybackListener};
pub use shutdown::ShutdownSignal;
pub use state::{ConnectionState, EngineStatus, PlaybackState};

/// Outcome of a tick that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStatus {
    /// A sample was read and reconciled
    Synced,
    /// The engine is not initialized
    Idle,
    /// Disconnected and waiting out the reconnect delay
    Backoff,
}

/// Turns periodic raw samples into a stable playback timeline.
///
/// A worker thread ticks at a fixed delay once [`Engine::initialize`] was
/// called. Ticks can also be driven by hand with [`Engine::tick`].
pub struct Engine {
    inner: Arc<Inner>,
    worker: Mutex<Option<Worker>>,
    background: bool,
}

struct Worker {
    handle: JoinHandle<()>,
    signal: Arc<ShutdownSignal>,
}

struct Inner {
    config: EngineConfig,
    connector: Box<dyn SourceConnector>,
    media_keys: Box<dyn MediaKeySender>,
    metadata: Option<Box<dyn MetadataProvider>>,
    clock: Arc<dyn Clock>,
    listeners: ListenerSet,
    /// Serializes ticks with initialize and stop
    tick_lock: Mutex<()>,
    dispatch: DispatchQueue,
    session: Mutex<Session>,
    shut_down: AtomicBool,
}

#[derive(Default)]
struct Session {
    initialized: bool,
    source: Option<Box<dyn PlaybackSource>>,
    source_kind: Option<SourceKind>,
    state: PlaybackState,
    connection: ConnectionState,
    last_error_at: Option<Instant>,
    last_sync: Option<DateTime<Utc>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl Engine {
    /// Engine for the real player with system defaults
    pub fn new(config: EngineConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    /// Start ticking.
    ///
    /// The first tick runs before this returns; its failure is reported to
    /// listeners, not to the caller.
    pub fn initialize(&self) -> Result<()> {
        {
            let _tick = lock(&self.inner.tick_lock);
            if self.inner.shut_down.load(Ordering::SeqCst) {
                return Err(Error::EngineShutDown);
            }
            let mut session = lock(&self.inner.session);
            if session.initialized {
                return Err(Error::AlreadyInitialized);
            }
            session.initialized = true;
        }
        info!("Engine initialized");

        if let Err(e) = self.inner.tick() {
            debug!("Initial tick failed: {}", e);
        }
        if !self.background {
            return Ok(());
        }

        let signal = Arc::new(ShutdownSignal::new());
        let inner = Arc::clone(&self.inner);
        let worker_signal = Arc::clone(&signal);
        let spawned = thread::Builder::new()
            .name("spotmem-engine".to_string())
            .spawn(move || inner.run(&worker_signal));

        match spawned {
            Ok(handle) => {
                *lock(&self.worker) = Some(Worker { handle, signal });
                Ok(())
            }
            Err(e) => {
                *lock(&self.inner.session) = Session::default();
                Err(e.into())
            }
        }
    }

    /// Run one tick now, serialized with the worker
    pub fn tick(&self) -> Result<TickStatus> {
        self.inner.tick()
    }

    /// Stop the worker and forget the session. `initialize` may be called again.
    pub fn stop(&self) {
        let worker = lock(&self.worker).take();
        if let Some(worker) = &worker {
            worker.signal.trigger();
        }

        {
            let _tick = lock(&self.inner.tick_lock);
            let mut session = lock(&self.inner.session);
            if session.initialized {
                info!("Engine stopped");
            }
            *session = Session::default();
        }

        if let Some(worker) = worker
            && worker.handle.thread().id() != thread::current().id()
            && worker.handle.join().is_err()
        {
            warn!("Engine worker panicked");
        }
    }

    /// Stop for good. Later `initialize` calls fail.
    pub fn shutdown(&self) {
        self.stop();
        self.inner.shut_down.store(true, Ordering::SeqCst);
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::SeqCst)
    }

    /// Press a media key, then tick so the change shows up right away
    pub fn press_media_key(&self, key: MediaKey) -> Result<()> {
        if self.is_shut_down() {
            return Err(Error::EngineShutDown);
        }
        if let Err(e) = self.inner.media_keys.press(key) {
            warn!("Failed to send media key {}: {}", key, e);
            return Err(e);
        }
        debug!("Sent media key {}", key);

        if let Err(e) = self.inner.tick() {
            debug!("Tick after media key failed: {}", e);
        }
        Ok(())
    }

    pub fn register_listener(&self, listener: Arc<dyn PlaybackListener>) -> ListenerId {
        self.inner.listeners.add(listener)
    }

    pub fn unregister_listener(&self, id: ListenerId) -> bool {
        self.inner.listeners.remove(id)
    }

    pub fn track(&self) -> Option<Track> {
        lock(&self.inner.session).state.current_track.clone()
    }

    pub fn has_track(&self) -> bool {
        lock(&self.inner.session).state.current_track.is_some()
    }

    /// Interpolated position in ms, `None` until it is known
    pub fn position(&self) -> Option<u32> {
        let now = self.inner.clock.now();
        lock(&self.inner.session).state.position(now)
    }

    pub fn has_position(&self) -> bool {
        lock(&self.inner.session).state.position_known
    }

    pub fn is_playing(&self) -> bool {
        lock(&self.inner.session).state.is_playing
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.inner.session).state.connected
    }

    pub fn is_initialized(&self) -> bool {
        lock(&self.inner.session).initialized
    }

    pub fn connection_state(&self) -> ConnectionState {
        lock(&self.inner.session).connection
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn status(&self) -> EngineStatus {
        let now = self.inner.clock.now();
        let session = lock(&self.inner.session);
        EngineStatus {
            initialized: session.initialized,
            connection: session.connection,
            source: session.source_kind,
            track: session.state.current_track.clone(),
            position: session.state.position(now),
            is_playing: session.state.is_playing,
            last_sync: session.last_sync,
        }
    }

    /// Cover art of the current track from the metadata provider
    pub fn cover_art(&self) -> Result<Option<Vec<u8>>> {
        let Some(provider) = &self.inner.metadata else {
            return Ok(None);
        };
        match self.track() {
            Some(track) => provider.cover_art(&track.id),
            None => Ok(None),
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Some(worker) = lock(&self.worker).take() {
            worker.signal.trigger();
            if worker.handle.join().is_err() {
                warn!("Engine worker panicked");
            }
        }
    }
}

impl Inner {
    fn run(&self, signal: &ShutdownSignal) {
        debug!("Engine worker started");
        while !signal.wait(self.config.tick_interval()) {
            match self.tick() {
                Ok(status) => trace!("Tick: {:?}", status),
                Err(e) => debug!("Tick failed: {}", e),
            }
        }
        debug!("Engine worker stopped");
    }

    /// Run one tick.
    ///
    /// Listeners are called after the tick lock is released. The dispatch
    /// ticket is drawn while it is still held, so ticks from different
    /// threads deliver in the order they committed. A tick driven from inside
    /// a callback delivers inline.
    fn tick(&self) -> Result<TickStatus> {
        let guard = lock(&self.tick_lock);
        let (result, events) = self.tick_locked();
        let ticket = (!self.dispatch.is_dispatching()).then(|| self.dispatch.ticket());
        drop(guard);

        let _turn = ticket.map(|ticket| self.dispatch.wait_turn(ticket));
        self.listeners.dispatch(&events);
        if let Err(e) = &result {
            self.listeners.disconnect(e);
        }
        result
    }

    fn tick_locked(&self) -> (Result<TickStatus>, Vec<Event>) {
        let now = self.clock.now();
        let mut events = Vec::new();

        let (source, mut state) = {
            let mut session = lock(&self.session);
            if !session.initialized {
                return (Ok(TickStatus::Idle), events);
            }
            if session.source.is_none() {
                if let Some(failed_at) = session.last_error_at
                    && (!self.config.auto_reconnect
                        || now.saturating_duration_since(failed_at)
                            < self.config.exception_reconnect_delay())
                {
                    return (Ok(TickStatus::Backoff), events);
                }
                session.connection = ConnectionState::Connecting;
            }
            (session.source.take(), session.state.clone())
        };

        let mut source = match source {
            Some(source) => source,
            None => match self.connector.connect() {
                Ok(source) => {
                    info!("Connected ({} source)", source.kind());
                    state.connected = true;
                    events.push(Event::Connect);
                    source
                }
                Err(e) => return (Err(self.fail(e, now)), events),
            },
        };

        if !source.is_usable() {
            let error = Error::ProcessNotFound(format!("{} source is gone", source.kind()));
            return (Err(self.fail(error, now)), events);
        }

        let sample = match source.refresh() {
            Ok(sample) if sample.valid => sample,
            Ok(sample) => {
                let error = Error::InvalidSample(format!(
                    "reading for track '{}' failed consistency checks",
                    sample.track_id
                ));
                return (Err(self.fail(error, now)), events);
            }
            Err(e) => return (Err(self.fail(e, now)), events),
        };

        let seek_threshold = u32::try_from(self.config.tick_interval_ms).unwrap_or(u32::MAX);
        events.extend(tick::reconcile(
            &mut state,
            &sample,
            now,
            seek_threshold,
            |id| self.lookup(id),
        ));

        let mut session = lock(&self.session);
        session.source_kind = Some(source.kind());
        session.source = Some(source);
        session.state = state;
        session.connection = ConnectionState::Connected;
        session.last_error_at = None;
        session.last_sync = Some(Utc::now());

        (Ok(TickStatus::Synced), events)
    }

    /// Tear down the source. Nothing from the working state is kept.
    fn fail(&self, error: Error, now: Instant) -> Error {
        let mut session = lock(&self.session);
        session.source = None;
        session.source_kind = None;
        session.state.connected = false;
        session.connection = ConnectionState::Error;
        session.last_error_at = Some(now);
        info!("Disconnected: {}", error);
        error
    }

    fn lookup(&self, track_id: &str) -> Option<TrackMetadata> {
        let provider = self.metadata.as_ref()?;
        match provider.track_metadata(track_id) {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("Metadata lookup for {} failed: {}", track_id, e);
                None
            }
        }
    }
}

/// Builder for [`Engine`]; anything not set falls back to the system implementation.
pub struct EngineBuilder {
    config: EngineConfig,
    connector: Option<Box<dyn SourceConnector>>,
    media_keys: Option<Box<dyn MediaKeySender>>,
    metadata: Option<Box<dyn MetadataProvider>>,
    clock: Option<Arc<dyn Clock>>,
    background: bool,
}

impl EngineBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            connector: None,
            media_keys: None,
            metadata: None,
            clock: None,
            background: true,
        }
    }

    pub fn connector(mut self, connector: impl SourceConnector + 'static) -> Self {
        self.connector = Some(Box::new(connector));
        self
    }

    pub fn media_keys(mut self, sender: impl MediaKeySender + 'static) -> Self {
        self.media_keys = Some(Box::new(sender));
        self
    }

    pub fn metadata(mut self, provider: impl MetadataProvider + 'static) -> Self {
        self.metadata = Some(Box::new(provider));
        self
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Whether `initialize` starts the worker thread. Without it the caller
    /// drives every tick through [`Engine::tick`].
    pub fn background(mut self, enabled: bool) -> Self {
        self.background = enabled;
        self
    }

    pub fn build(self) -> Engine {
        let connector = self
            .connector
            .unwrap_or_else(|| Box::new(ProcessConnector::system(&self.config)));
        let inner = Inner {
            connector,
            media_keys: self
                .media_keys
                .unwrap_or_else(|| Box::new(SystemMediaKeys)),
            metadata: self.metadata,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            listeners: ListenerSet::new(),
            tick_lock: Mutex::new(()),
            dispatch: DispatchQueue::default(),
            session: Mutex::new(Session::default()),
            shut_down: AtomicBool::new(false),
            config: self.config,
        };
        Engine {
            inner: Arc::new(inner),
            worker: Mutex::new(None),
            background: self.background,
        }
    }
}
