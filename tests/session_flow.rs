// End-to-end: drive a session runner through its handle with a fake backend
// and a real in-memory catalog.

use mixtape::audio::{MediaBackend, MediaStream, PlayerError};
use mixtape::session::{AlwaysGranted, FocusChange, Readiness, Snapshot, Transport};
use mixtape::{SessionHandle, SessionRunner, SqliteCatalog, Track, TrackCatalog};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

#[derive(Default)]
struct Counters {
    live: AtomicUsize,
    finished: AtomicBool,
}

#[derive(Clone)]
struct FakeBackend {
    durations: Arc<HashMap<String, u64>>,
    counters: Arc<Counters>,
}

impl FakeBackend {
    fn new(tracks: &[(&str, u64)]) -> Self {
        Self {
            durations: Arc::new(
                tracks
                    .iter()
                    .map(|(locator, ms)| (locator.to_string(), *ms))
                    .collect(),
            ),
            counters: Arc::default(),
        }
    }
}

struct FakeStream {
    counters: Arc<Counters>,
    duration_ms: u64,
    position_ms: u64,
    playing: bool,
}

impl MediaBackend for FakeBackend {
    type Stream = FakeStream;

    fn open(&self, locator: &str) -> Result<FakeStream, PlayerError> {
        let duration_ms = *self.durations.get(locator).ok_or_else(|| PlayerError::Decode {
            locator: locator.to_string(),
            reason: "unknown test file".to_string(),
        })?;
        self.counters.live.fetch_add(1, Ordering::SeqCst);
        self.counters.finished.store(false, Ordering::SeqCst);
        Ok(FakeStream {
            counters: Arc::clone(&self.counters),
            duration_ms,
            position_ms: 0,
            playing: false,
        })
    }
}

impl MediaStream for FakeStream {
    fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    fn position_ms(&self) -> u64 {
        self.position_ms
    }

    fn play(&mut self) {
        self.playing = true;
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn seek(&mut self, position_ms: u64) {
        self.position_ms = position_ms;
        self.counters.finished.store(false, Ordering::SeqCst);
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn is_finished(&self) -> bool {
        self.counters.finished.load(Ordering::SeqCst)
    }
}

impl Drop for FakeStream {
    fn drop(&mut self) {
        self.counters.live.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn wait_until(handle: &SessionHandle, predicate: impl FnMut(&Snapshot) -> bool) -> Snapshot {
    let mut rx = handle.subscribe();
    let snapshot = timeout(Duration::from_secs(5), rx.wait_for(predicate))
        .await
        .expect("session never reached the expected state")
        .expect("session closed");
    Snapshot::clone(&snapshot)
}

#[tokio::test]
async fn test_catalog_to_playback_round() {
    let catalog = SqliteCatalog::open_in_memory().unwrap();
    let first = Track::new("First", "first.ogg");
    let second = Track::from_parts(
        uuid::Uuid::new_v4(),
        "Second",
        "second.ogg",
        first.added_at() + chrono::Duration::seconds(1),
    );
    catalog.insert(&first).unwrap();
    catalog.insert(&second).unwrap();

    let backend = FakeBackend::new(&[("first.ogg", 2_000), ("second.ogg", 3_000)]);
    let counters = Arc::clone(&backend.counters);
    let (runner, handle) =
        SessionRunner::new(backend, Box::new(AlwaysGranted), Duration::from_millis(20));
    let task = tokio::spawn(runner.run());

    handle.set_playlist(catalog.list_all().unwrap()).unwrap();

    // nothing loaded yet; play loads and starts the first track
    handle.play_pause().unwrap();
    let state = wait_until(&handle, |s| s.is_playing()).await;
    assert_eq!(state.loaded_track_id, Some(first.id()));
    assert_eq!(state.duration_ms, 2_000);

    // transient focus loss and regain
    handle.focus(FocusChange::LostTransient).unwrap();
    wait_until(&handle, |s| s.transport == Transport::Paused).await;
    handle.focus(FocusChange::Gained).unwrap();
    wait_until(&handle, |s| s.is_playing()).await;

    // explicit next keeps playing
    handle.next().unwrap();
    let state = wait_until(&handle, |s| {
        s.loaded_track_id == Some(second.id()) && s.readiness == Readiness::Ready
    })
    .await;
    assert!(state.is_playing());
    assert_eq!(state.title.as_deref(), Some("Second"));

    // running off the end of the list pauses at the start of the last track
    counters.finished.store(true, Ordering::SeqCst);
    let state = wait_until(&handle, |s| s.transport == Transport::Paused).await;
    assert_eq!(state.loaded_track_id, Some(second.id()));
    assert_eq!(state.position_ms, 0);

    handle.shutdown().unwrap();
    task.await.unwrap();
    assert_eq!(counters.live.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_switching_tracks_quickly_settles_on_the_last() {
    let backend = FakeBackend::new(&[("a.wav", 1_000), ("b.wav", 1_000), ("c.wav", 4_000)]);
    let counters = Arc::clone(&backend.counters);
    let (runner, handle) =
        SessionRunner::new(backend, Box::new(AlwaysGranted), Duration::from_millis(20));
    let task = tokio::spawn(runner.run());

    let tracks = vec![
        Track::new("A", "a.wav"),
        Track::new("B", "b.wav"),
        Track::new("C", "c.wav"),
    ];
    handle.set_playlist(tracks.clone()).unwrap();
    for track in &tracks {
        handle.select_track(track.id(), true).unwrap();
    }

    let state = wait_until(&handle, |s| {
        s.loaded_track_id == Some(tracks[2].id()) && s.is_playing()
    })
    .await;
    assert_eq!(state.duration_ms, 4_000);

    handle.shutdown().unwrap();
    task.await.unwrap();
    // superseded opens may still be finishing on the blocking pool
    timeout(Duration::from_secs(5), async {
        while counters.live.load(Ordering::SeqCst) > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("a stream was never released");
}
