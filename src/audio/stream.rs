//! Single-stream player.
//!
//! Owns at most one opened media resource. Opening happens off the control
//! thread; the result comes back as a [`Prepared`] message on the completion
//! channel handed out by [`StreamPlayer::new`], tagged with the generation of
//! the request that started it. Whoever drains that channel feeds the message
//! back through [`StreamPlayer::complete`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("cannot open {locator}: {source}")]
    Open {
        locator: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported audio format or corrupted file {locator}: {reason}")]
    Decode { locator: String, reason: String },
    #[error("audio output unavailable: {0}")]
    Output(String),
}

/// An opened, decodable resource. Dropping it releases it.
pub trait MediaStream: Send + 'static {
    fn duration_ms(&self) -> u64;
    fn position_ms(&self) -> u64;
    fn play(&mut self);
    fn pause(&mut self);
    fn seek(&mut self, position_ms: u64);
    fn is_playing(&self) -> bool;
    /// True once the stream has played through to its end.
    fn is_finished(&self) -> bool;
}

pub trait MediaBackend: Send + Sync + 'static {
    type Stream: MediaStream;

    /// Blocking open. Only ever called from a worker thread.
    fn open(&self, locator: &str) -> Result<Self::Stream, PlayerError>;
}

pub enum LoadResult<S> {
    Opened(S),
    Failed(PlayerError),
    /// The request was superseded or released before the open finished.
    Cancelled,
}

impl<S> fmt::Debug for LoadResult<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadResult::Opened(_) => f.write_str("Opened"),
            LoadResult::Failed(err) => write!(f, "Failed({err})"),
            LoadResult::Cancelled => f.write_str("Cancelled"),
        }
    }
}

#[derive(Debug)]
pub struct Prepared<S> {
    pub generation: u64,
    pub locator: String,
    pub result: LoadResult<S>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadTicket {
    /// Same locator was already prepared; nothing was reopened.
    Ready,
    /// An open is in flight under this generation.
    Pending(u64),
}

#[derive(Debug)]
pub enum PrepareOutcome {
    Ready { duration_ms: u64 },
    Failed(PlayerError),
    Cancelled,
    Stale,
}

enum Slot<S> {
    Empty,
    Preparing { generation: u64 },
    Prepared(S),
}

/// Run `job` away from the calling thread: on the runtime's blocking pool
/// when there is one, on a fresh thread otherwise.
pub(crate) fn run_blocking<F>(job: F)
where
    F: FnOnce() + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn_blocking(job);
        }
        Err(_) => {
            std::thread::spawn(job);
        }
    }
}

pub struct StreamPlayer<B: MediaBackend> {
    backend: Arc<B>,
    slot: Slot<B::Stream>,
    locator: Option<String>,
    // Latest issued generation, shared with workers so they can drop a
    // stream nobody wants anymore.
    latest: Arc<AtomicU64>,
    completions: mpsc::UnboundedSender<Prepared<B::Stream>>,
    end_reported: bool,
}

impl<B: MediaBackend> StreamPlayer<B> {
    pub fn new(backend: B) -> (Self, mpsc::UnboundedReceiver<Prepared<B::Stream>>) {
        let (completions, receiver) = mpsc::unbounded_channel();
        let player = Self {
            backend: Arc::new(backend),
            slot: Slot::Empty,
            locator: None,
            latest: Arc::new(AtomicU64::new(0)),
            completions,
            end_reported: false,
        };
        (player, receiver)
    }

    /// Start preparing `locator`. Re-issuing the locator that is already
    /// prepared returns [`LoadTicket::Ready`] without touching the resource.
    pub fn load(&mut self, locator: &str) -> LoadTicket {
        if matches!(self.slot, Slot::Prepared(_)) && self.locator.as_deref() == Some(locator) {
            debug!(locator, "stream already prepared, reusing it");
            return LoadTicket::Ready;
        }

        self.release();
        let generation = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        self.slot = Slot::Preparing { generation };
        self.locator = Some(locator.to_string());

        let backend = Arc::clone(&self.backend);
        let latest = Arc::clone(&self.latest);
        let completions = self.completions.clone();
        let locator = locator.to_string();

        let job = move || {
            let result = match backend.open(&locator) {
                Ok(stream) if latest.load(Ordering::SeqCst) == generation => {
                    LoadResult::Opened(stream)
                }
                Ok(stream) => {
                    drop(stream);
                    LoadResult::Cancelled
                }
                Err(err) => LoadResult::Failed(err),
            };
            // A closed channel hands the message back; dropping it releases
            // whatever stream it carries.
            if completions
                .send(Prepared {
                    generation,
                    locator,
                    result,
                })
                .is_err()
            {
                debug!(generation, "player gone before open finished");
            }
        };

        run_blocking(job);
        LoadTicket::Pending(generation)
    }

    /// Install the result of an open. Anything that does not match the
    /// request in flight is dropped (and thereby released) and reported stale.
    pub fn complete(&mut self, prepared: Prepared<B::Stream>) -> PrepareOutcome {
        let in_flight = matches!(
            self.slot,
            Slot::Preparing { generation } if generation == prepared.generation
        );
        if !in_flight {
            debug!(generation = prepared.generation, "dropping stale open result");
            return PrepareOutcome::Stale;
        }

        match prepared.result {
            LoadResult::Opened(stream) => {
                let duration_ms = stream.duration_ms();
                self.slot = Slot::Prepared(stream);
                self.end_reported = false;
                PrepareOutcome::Ready { duration_ms }
            }
            LoadResult::Failed(err) => {
                warn!(locator = %prepared.locator, error = %err, "failed to open stream");
                self.slot = Slot::Empty;
                self.locator = None;
                PrepareOutcome::Failed(err)
            }
            LoadResult::Cancelled => {
                self.slot = Slot::Empty;
                self.locator = None;
                PrepareOutcome::Cancelled
            }
        }
    }

    pub fn play(&mut self) {
        if let Slot::Prepared(stream) = &mut self.slot {
            stream.play();
            self.end_reported = false;
        }
    }

    pub fn pause(&mut self) {
        if let Slot::Prepared(stream) = &mut self.slot {
            stream.pause();
        }
    }

    pub fn seek(&mut self, position_ms: u64) {
        if let Slot::Prepared(stream) = &mut self.slot {
            stream.seek(position_ms);
            self.end_reported = false;
        }
    }

    pub fn position_ms(&self) -> u64 {
        match &self.slot {
            Slot::Prepared(stream) => stream.position_ms(),
            _ => 0,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        match &self.slot {
            Slot::Prepared(stream) => stream.duration_ms(),
            _ => 0,
        }
    }

    pub fn is_playing(&self) -> bool {
        match &self.slot {
            Slot::Prepared(stream) => stream.is_playing(),
            _ => false,
        }
    }

    pub fn is_prepared(&self) -> bool {
        matches!(self.slot, Slot::Prepared(_))
    }

    pub fn is_preparing(&self) -> bool {
        matches!(self.slot, Slot::Preparing { .. })
    }

    /// Reports end-of-stream once per playback. Playing or seeking re-arms it.
    pub fn take_completion(&mut self) -> bool {
        match &self.slot {
            Slot::Prepared(stream) if !self.end_reported && stream.is_finished() => {
                self.end_reported = true;
                true
            }
            _ => false,
        }
    }

    /// Drop the current resource and invalidate any open in flight.
    /// Safe to call any number of times.
    pub fn release(&mut self) {
        self.latest.fetch_add(1, Ordering::SeqCst);
        if let Slot::Prepared(_) = std::mem::replace(&mut self.slot, Slot::Empty) {
            debug!(locator = ?self.locator, "released stream");
        }
        self.locator = None;
        self.end_reported = false;
    }
}

impl<B: MediaBackend> Drop for StreamPlayer<B> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockBackend;
    use std::time::Duration;
    use tokio::time::timeout;

    async fn next_prepared<S>(rx: &mut mpsc::UnboundedReceiver<Prepared<S>>) -> Prepared<S> {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("open did not finish")
            .expect("completion channel closed")
    }

    #[tokio::test]
    async fn test_run_blocking_leaves_the_calling_thread() {
        let caller = std::thread::current().id();
        let (tx, rx) = tokio::sync::oneshot::channel();
        run_blocking(move || {
            let _ = tx.send(std::thread::current().id());
        });

        let worker = timeout(Duration::from_secs(5), rx).await.unwrap().unwrap();
        assert_ne!(worker, caller);
    }

    #[test]
    fn test_run_blocking_without_runtime_uses_a_thread() {
        let caller = std::thread::current().id();
        let (tx, rx) = std::sync::mpsc::channel();
        run_blocking(move || {
            let _ = tx.send(std::thread::current().id());
        });

        let worker = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_ne!(worker, caller);
    }

    #[tokio::test]
    async fn test_load_then_complete_reports_duration() {
        let backend = MockBackend::new().with_track("a.mp3", 4_000);
        let (mut player, mut rx) = StreamPlayer::new(backend.clone());

        let ticket = player.load("a.mp3");
        assert!(matches!(ticket, LoadTicket::Pending(_)));
        assert!(player.is_preparing());

        // everything is a no-op while the open is pending
        player.play();
        player.pause();
        player.seek(1_000);
        assert_eq!(player.duration_ms(), 0);
        assert!(!player.is_playing());

        let prepared = next_prepared(&mut rx).await;
        assert!(matches!(
            player.complete(prepared),
            PrepareOutcome::Ready { duration_ms: 4_000 }
        ));
        assert!(player.is_prepared());
        assert_eq!(player.duration_ms(), 4_000);

        player.play();
        assert!(player.is_playing());
    }

    #[tokio::test]
    async fn test_same_locator_is_not_reopened() {
        let backend = MockBackend::new().with_track("a.mp3", 4_000);
        let (mut player, mut rx) = StreamPlayer::new(backend.clone());

        player.load("a.mp3");
        let prepared = next_prepared(&mut rx).await;
        player.complete(prepared);

        assert_eq!(player.load("a.mp3"), LoadTicket::Ready);
        assert_eq!(backend.opened(), 1);
        assert_eq!(backend.live(), 1);
    }

    #[tokio::test]
    async fn test_switching_locator_releases_previous_stream() {
        let backend = MockBackend::new()
            .with_track("a.mp3", 4_000)
            .with_track("b.mp3", 6_000);
        let (mut player, mut rx) = StreamPlayer::new(backend.clone());

        player.load("a.mp3");
        let prepared = next_prepared(&mut rx).await;
        player.complete(prepared);

        player.load("b.mp3");
        assert_eq!(backend.released(), 1);
        let prepared = next_prepared(&mut rx).await;
        player.complete(prepared);
        assert_eq!(player.duration_ms(), 6_000);
        assert_eq!(backend.live(), 1);
    }

    #[tokio::test]
    async fn test_release_mid_flight_leaks_nothing() {
        let backend = MockBackend::new().with_track("a.mp3", 4_000);
        let (mut player, mut rx) = StreamPlayer::new(backend.clone());

        player.load("a.mp3");
        player.release();
        player.release();

        let prepared = next_prepared(&mut rx).await;
        assert!(matches!(player.complete(prepared), PrepareOutcome::Stale));
        assert!(!player.is_prepared());
        assert_eq!(backend.live(), 0);
    }

    #[tokio::test]
    async fn test_failed_open_is_reported() {
        let backend = MockBackend::new().failing("broken.ogg");
        let (mut player, mut rx) = StreamPlayer::new(backend.clone());

        player.load("broken.ogg");
        let prepared = next_prepared(&mut rx).await;
        assert!(matches!(
            player.complete(prepared),
            PrepareOutcome::Failed(PlayerError::Decode { .. })
        ));
        assert!(!player.is_prepared());
        assert!(!player.is_preparing());
    }

    #[tokio::test]
    async fn test_completion_is_reported_once_per_playback() {
        let backend = MockBackend::new().with_track("a.mp3", 4_000);
        let (mut player, mut rx) = StreamPlayer::new(backend.clone());

        player.load("a.mp3");
        let prepared = next_prepared(&mut rx).await;
        player.complete(prepared);
        player.play();
        assert!(!player.take_completion());

        backend.finish_stream();
        assert!(player.take_completion());
        assert!(!player.take_completion());

        player.seek(0);
        player.play();
        assert!(!player.take_completion());
    }

    #[test]
    fn test_load_outside_runtime_uses_a_thread() {
        let backend = MockBackend::new().with_track("a.mp3", 1_000);
        let (mut player, mut rx) = StreamPlayer::new(backend.clone());

        player.load("a.mp3");
        let prepared = rx.blocking_recv().expect("completion channel closed");
        assert!(matches!(
            player.complete(prepared),
            PrepareOutcome::Ready { duration_ms: 1_000 }
        ));
    }
}
