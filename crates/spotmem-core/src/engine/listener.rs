use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, RwLock};
use std::thread::{self, ThreadId};

use crate::error::Error;
use crate::track::Track;

/// Receives engine events. Every method defaults to a no-op.
///
/// Callbacks run on the thread that ran the tick, after the tick committed.
pub trait PlaybackListener: Send + Sync {
    fn on_connect(&self) {}

    fn on_track_changed(&self, _track: &Track) {}

    /// Position jumped (seek or track change), in ms
    fn on_position_changed(&self, _position: u32) {}

    fn on_playback_changed(&self, _is_playing: bool) {}

    /// A tick completed successfully
    fn on_sync(&self) {}

    fn on_disconnect(&self, _error: &Error) {}
}

/// Handle returned by registration, used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// An engine event, recorded during a tick and dispatched after it commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Connect,
    TrackChanged(Track),
    PositionChanged(u32),
    PlaybackChanged(bool),
    Sync,
}

impl Event {
    fn deliver(&self, listener: &dyn PlaybackListener) {
        match self {
            Event::Connect => listener.on_connect(),
            Event::TrackChanged(track) => listener.on_track_changed(track),
            Event::PositionChanged(position) => listener.on_position_changed(*position),
            Event::PlaybackChanged(playing) => listener.on_playback_changed(*playing),
            Event::Sync => listener.on_sync(),
        }
    }
}

/// Registered listeners. Dispatch iterates a snapshot, so a callback may
/// register or unregister listeners without deadlocking.
#[derive(Default)]
pub struct ListenerSet {
    next_id: AtomicU64,
    listeners: RwLock<Vec<(ListenerId, Arc<dyn PlaybackListener>)>>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: Arc<dyn PlaybackListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        match self.listeners.write() {
            Ok(mut listeners) => listeners.push((id, listener)),
            Err(poisoned) => poisoned.into_inner().push((id, listener)),
        }
        id
    }

    pub fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = match self.listeners.write() {
            Ok(listeners) => listeners,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Vec<Arc<dyn PlaybackListener>> {
        let listeners = match self.listeners.read() {
            Ok(listeners) => listeners,
            Err(poisoned) => poisoned.into_inner(),
        };
        listeners.iter().map(|(_, l)| Arc::clone(l)).collect()
    }

    /// Deliver events in order to every listener
    pub fn dispatch(&self, events: &[Event]) {
        if events.is_empty() {
            return;
        }
        let listeners = self.snapshot();
        for event in events {
            for listener in &listeners {
                event.deliver(listener.as_ref());
            }
        }
    }

    pub fn disconnect(&self, error: &Error) {
        for listener in self.snapshot() {
            listener.on_disconnect(error);
        }
    }
}

/// Hands out dispatch turns in ticket order.
///
/// Tickets are drawn under the engine's tick lock, so turns follow commit
/// order. Waiting holds no other lock.
#[derive(Default)]
pub(crate) struct DispatchQueue {
    state: Mutex<DispatchState>,
    turn: Condvar,
}

#[derive(Default)]
struct DispatchState {
    issued: u64,
    serving: u64,
    thread: Option<ThreadId>,
}

impl DispatchQueue {
    fn state(&self) -> MutexGuard<'_, DispatchState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Whether the calling thread is inside a dispatch turn
    pub(crate) fn is_dispatching(&self) -> bool {
        self.state().thread == Some(thread::current().id())
    }

    pub(crate) fn ticket(&self) -> u64 {
        let mut state = self.state();
        let ticket = state.issued;
        state.issued += 1;
        ticket
    }

    /// Block until `ticket` is served. The turn ends when the guard drops.
    pub(crate) fn wait_turn(&self, ticket: u64) -> DispatchTurn<'_> {
        let mut state = self.state();
        while state.serving != ticket {
            state = match self.turn.wait(state) {
                Ok(state) => state,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
        state.thread = Some(thread::current().id());
        DispatchTurn { queue: self }
    }
}

pub(crate) struct DispatchTurn<'a> {
    queue: &'a DispatchQueue,
}

impl Drop for DispatchTurn<'_> {
    fn drop(&mut self) {
        let mut state = self.queue.state();
        state.thread = None;
        state.serving += 1;
        drop(state);
        self.queue.turn.notify_all();
    }
}
