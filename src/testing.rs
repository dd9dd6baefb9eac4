// Test doubles shared by the unit tests: a scripted media backend, a
// switchable focus arbiter and an observer that records what it sees.

use crate::audio::{MediaBackend, MediaStream, PlayerError};
use crate::session::{AudioFocus, SessionError, SessionObserver, Snapshot};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct BackendState {
    durations: Mutex<HashMap<String, u64>>,
    failing: Mutex<HashSet<String>>,
    opened: AtomicUsize,
    released: AtomicUsize,
    finished: AtomicBool,
}

#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<BackendState>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_track(self, locator: &str, duration_ms: u64) -> Self {
        self.state
            .durations
            .lock()
            .unwrap()
            .insert(locator.to_string(), duration_ms);
        self
    }

    pub fn failing(self, locator: &str) -> Self {
        self.state
            .failing
            .lock()
            .unwrap()
            .insert(locator.to_string());
        self
    }

    /// Make the live stream report that it ran to its end.
    pub fn finish_stream(&self) {
        self.state.finished.store(true, Ordering::SeqCst);
    }

    pub fn opened(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.state.released.load(Ordering::SeqCst)
    }

    pub fn live(&self) -> usize {
        self.opened() - self.released()
    }
}

impl MediaBackend for MockBackend {
    type Stream = MockStream;

    fn open(&self, locator: &str) -> Result<MockStream, PlayerError> {
        if self.state.failing.lock().unwrap().contains(locator) {
            return Err(PlayerError::Decode {
                locator: locator.to_string(),
                reason: "scripted failure".to_string(),
            });
        }
        let Some(duration_ms) = self.state.durations.lock().unwrap().get(locator).copied() else {
            return Err(PlayerError::Open {
                locator: locator.to_string(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        };

        self.state.opened.fetch_add(1, Ordering::SeqCst);
        self.state.finished.store(false, Ordering::SeqCst);
        Ok(MockStream {
            state: Arc::clone(&self.state),
            duration_ms,
            position_ms: 0,
            playing: false,
        })
    }
}

pub struct MockStream {
    state: Arc<BackendState>,
    duration_ms: u64,
    position_ms: u64,
    playing: bool,
}

impl MediaStream for MockStream {
    fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    fn position_ms(&self) -> u64 {
        if self.state.finished.load(Ordering::SeqCst) {
            self.duration_ms
        } else {
            self.position_ms
        }
    }

    fn play(&mut self) {
        self.playing = true;
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn seek(&mut self, position_ms: u64) {
        self.position_ms = position_ms;
        self.state.finished.store(false, Ordering::SeqCst);
    }

    fn is_playing(&self) -> bool {
        self.playing && !self.is_finished()
    }

    fn is_finished(&self) -> bool {
        self.state.finished.load(Ordering::SeqCst)
    }
}

impl Drop for MockStream {
    fn drop(&mut self) {
        self.state.released.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Clone, Default)]
pub struct MockFocus {
    denied: Arc<AtomicBool>,
    held: Arc<AtomicBool>,
}

impl MockFocus {
    pub fn deny(&self, denied: bool) {
        self.denied.store(denied, Ordering::SeqCst);
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }
}

impl AudioFocus for MockFocus {
    fn request(&mut self) -> bool {
        let granted = !self.denied.load(Ordering::SeqCst);
        if granted {
            self.held.store(true, Ordering::SeqCst);
        }
        granted
    }

    fn abandon(&mut self) {
        self.held.store(false, Ordering::SeqCst);
    }
}

#[derive(Clone, Default)]
pub struct Recorder {
    snapshots: Arc<Mutex<Vec<Snapshot>>>,
    errors: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn snapshots(&self) -> Vec<Snapshot> {
        self.snapshots.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }
}

impl SessionObserver for Recorder {
    fn on_state_changed(&mut self, snapshot: &Snapshot) {
        self.snapshots.lock().unwrap().push(snapshot.clone());
    }

    fn on_error(&mut self, error: &SessionError) {
        self.errors.lock().unwrap().push(error.to_string());
    }
}
