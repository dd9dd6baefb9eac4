use super::focus::{AudioFocus, FocusAction, FocusChange, FocusPolicy};
use super::{Activity, Readiness, SessionError, SessionObserver, Snapshot, Transport};
use crate::audio::{
    LoadTicket, MediaBackend, PlaylistCursor, PrepareOutcome, Prepared, StreamPlayer, Track,
};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug)]
struct PendingLoad {
    generation: u64,
    auto_play: bool,
    // stop() arrived while opening; the session lands Idle
    stopped: bool,
}

/// The playback session state machine.
///
/// Every method runs on one control task and finishes synchronously; the
/// only asynchronous step is the player's open, whose result comes back
/// through [`Session::on_prepared`]. Each open carries a generation and a
/// result for anything but the latest request is dropped.
///
/// Invariants kept by every method:
/// - `Transport::Playing` implies `Readiness::Ready`
/// - `position_ms <= duration_ms` whenever the duration is known
/// - at most one open is pending
pub struct Session<B: MediaBackend> {
    player: StreamPlayer<B>,
    cursor: PlaylistCursor,
    focus: Box<dyn AudioFocus>,
    focus_policy: FocusPolicy,
    pending: Option<PendingLoad>,
    loaded: Option<Track>,
    readiness: Readiness,
    transport: Transport,
    position_ms: u64,
    duration_ms: u64,
    repeat_one: bool,
    activity: Activity,
    observers: Vec<Box<dyn SessionObserver>>,
    published: watch::Sender<Snapshot>,
    last_emitted: Snapshot,
}

impl<B: MediaBackend> Session<B> {
    pub fn new(player: StreamPlayer<B>, focus: Box<dyn AudioFocus>) -> Self {
        let (published, _) = watch::channel(Snapshot::default());
        Self {
            player,
            cursor: PlaylistCursor::new(),
            focus,
            focus_policy: FocusPolicy::default(),
            pending: None,
            loaded: None,
            readiness: Readiness::NotLoaded,
            transport: Transport::Stopped,
            position_ms: 0,
            duration_ms: 0,
            repeat_one: false,
            activity: Activity::Idle,
            observers: Vec::new(),
            published,
            last_emitted: Snapshot::default(),
        }
    }

    pub fn add_observer(&mut self, observer: Box<dyn SessionObserver>) {
        self.observers.push(observer);
    }

    /// Poll side: the receiver always holds the latest snapshot, including
    /// position updates made on ticks.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.published.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            loaded_track_id: self.loaded.as_ref().map(|track| track.id()),
            title: self.loaded.as_ref().map(|track| track.title().to_string()),
            readiness: self.readiness,
            transport: self.transport,
            position_ms: self.position_ms,
            duration_ms: self.duration_ms,
            repeat_one: self.repeat_one,
            activity: self.activity,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.transport == Transport::Playing
    }

    pub fn cursor(&self) -> &PlaylistCursor {
        &self.cursor
    }

    pub fn resume_on_gain(&self) -> bool {
        self.focus_policy.resume_on_gain()
    }

    pub fn set_playlist(&mut self, tracks: Vec<Track>) {
        debug!(count = tracks.len(), "playlist replaced");
        self.cursor.set_list(tracks);
        self.emit();
    }

    pub fn set_repeat_one(&mut self, on: bool) {
        self.repeat_one = on;
        self.emit();
    }

    /// Point the cursor at `id` and load it.
    pub fn select_track(&mut self, id: Uuid, auto_play: bool) -> Result<(), SessionError> {
        if self.cursor.is_empty() {
            return Err(SessionError::EmptyPlaylist);
        }
        if !self.cursor.set_current_by_id(id) {
            return Err(SessionError::TrackNotFound(id));
        }
        if let Some(track) = self.cursor.current().cloned() {
            self.load_track(track, auto_play);
        }
        Ok(())
    }

    pub fn load_track(&mut self, track: Track, auto_play: bool) {
        info!(title = %track.title(), auto_play, "loading track");

        match self.player.load(track.source()) {
            LoadTicket::Ready => {
                self.pending = None;
                self.loaded = Some(track);
                self.readiness = Readiness::Ready;
                self.duration_ms = self.player.duration_ms();
                self.sync_position();
                if self.transport == Transport::Playing && self.player.is_playing() {
                    debug!("track already prepared and playing");
                } else {
                    self.finish_prepare(auto_play);
                }
            }
            LoadTicket::Pending(generation) => {
                self.pending = Some(PendingLoad {
                    generation,
                    auto_play,
                    stopped: false,
                });
                self.loaded = Some(track);
                self.readiness = Readiness::Loading;
                self.transport = Transport::Stopped;
                self.position_ms = 0;
                self.duration_ms = 0;
            }
        }

        self.emit();
    }

    /// Result of an open started by [`Session::load_track`].
    pub fn on_prepared(&mut self, prepared: Prepared<B::Stream>) {
        let (auto_play, stopped) = match &self.pending {
            Some(pending) if pending.generation == prepared.generation => {
                (pending.auto_play, pending.stopped)
            }
            _ => {
                debug!(generation = prepared.generation, "discarding stale completion");
                return;
            }
        };
        self.pending = None;

        match self.player.complete(prepared) {
            PrepareOutcome::Ready { duration_ms } => {
                self.readiness = Readiness::Ready;
                self.duration_ms = duration_ms;
                self.position_ms = 0;
                self.finish_prepare(auto_play);
                if stopped {
                    self.activity = Activity::Idle;
                }
            }
            PrepareOutcome::Failed(source) => {
                self.readiness = Readiness::NotLoaded;
                self.transport = Transport::Stopped;
                self.position_ms = 0;
                self.duration_ms = 0;
                let failed = self.loaded.as_ref().map(|t| (t.id(), t.title().to_string()));
                if let Some((track_id, title)) = failed {
                    warn!(%title, error = %source, "track could not be loaded");
                    let error = SessionError::LoadFailed {
                        track_id,
                        title,
                        source,
                    };
                    self.report(&error);
                }
                self.drop_foreground();
            }
            PrepareOutcome::Cancelled | PrepareOutcome::Stale => {
                self.readiness = Readiness::NotLoaded;
                self.transport = Transport::Stopped;
                self.drop_foreground();
            }
        }

        self.emit();
    }

    pub fn toggle_play_pause(&mut self) {
        if self.readiness != Readiness::Ready {
            self.prepare_current();
            return;
        }

        if self.transport == Transport::Playing {
            self.pause();
        } else {
            self.play();
        }
    }

    pub fn play(&mut self) {
        if self.readiness != Readiness::Ready {
            self.prepare_current();
            return;
        }
        if self.transport == Transport::Playing {
            return;
        }

        self.start_playing();
        self.emit();
    }

    pub fn pause(&mut self) {
        self.focus_policy.clear();
        self.pause_playback(true);
        self.emit();
    }

    /// Pause, drop the pinned presence, stay loaded.
    pub fn stop(&mut self) {
        info!("stopping playback");
        self.focus_policy.clear();
        self.pause_playback(true);
        if let Some(pending) = self.pending.as_mut() {
            pending.stopped = true;
        }
        self.activity = Activity::Idle;
        self.emit();
    }

    /// Clamped to `[0, duration]` when the duration is known. Ignored unless
    /// a track is ready.
    pub fn seek(&mut self, position_ms: i64) {
        if self.readiness != Readiness::Ready {
            debug!(position_ms, "seek ignored, nothing ready");
            return;
        }

        let mut target = position_ms.max(0) as u64;
        if self.duration_ms > 0 {
            target = target.min(self.duration_ms);
        }
        self.position_ms = target;
        self.player.seek(target);
        self.emit();
    }

    pub fn next(&mut self, inherit_playing: bool) {
        match self.cursor.next().cloned() {
            Some(track) => self.load_track(track, inherit_playing),
            None => debug!("no next track"),
        }
    }

    pub fn prev(&mut self, inherit_playing: bool) {
        match self.cursor.prev().cloned() {
            Some(track) => self.load_track(track, inherit_playing),
            None => debug!("no previous track"),
        }
    }

    /// The loaded stream ran to its end.
    pub fn on_natural_completion(&mut self) {
        if self.readiness != Readiness::Ready {
            return;
        }

        if self.repeat_one {
            info!("repeating track");
            self.position_ms = 0;
            self.player.seek(0);
            self.player.play();
            self.transport = Transport::Playing;
            self.activity = Activity::Foreground;
            self.emit();
            return;
        }

        if self.cursor.has_next() {
            self.next(true);
            return;
        }

        info!("end of playlist");
        self.player.pause();
        self.player.seek(0);
        self.position_ms = 0;
        self.transport = Transport::Paused;
        self.activity = Activity::Background;
        self.focus.abandon();
        self.emit();
    }

    pub fn on_focus_change(&mut self, change: FocusChange) {
        let was_playing = self.transport == Transport::Playing;
        match self.focus_policy.on_change(change, was_playing) {
            FocusAction::Pause { abandon } => {
                info!(?change, "focus lost, pausing");
                self.pause_playback(abandon);
                self.emit();
            }
            FocusAction::Resume => {
                info!("focus regained, resuming");
                self.play();
            }
            FocusAction::Ignore => {}
        }
    }

    pub fn on_focus_lost(&mut self, transient: bool) {
        let change = if transient {
            FocusChange::LostTransient
        } else {
            FocusChange::Lost
        };
        self.on_focus_change(change);
    }

    pub fn on_focus_gained(&mut self) {
        self.on_focus_change(FocusChange::Gained);
    }

    /// Periodic check: detects end-of-stream and refreshes the polled position.
    pub fn tick(&mut self) {
        if self.readiness != Readiness::Ready {
            return;
        }
        if self.player.take_completion() {
            self.on_natural_completion();
            return;
        }

        self.sync_position();
        let snapshot = self.snapshot();
        self.published.send_if_modified(move |current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }

    /// Release the stream (also one still being opened) and go idle.
    pub fn teardown(&mut self) {
        info!("tearing down playback session");
        self.pending = None;
        self.player.release();
        self.focus.abandon();
        self.loaded = None;
        self.readiness = Readiness::NotLoaded;
        self.transport = Transport::Stopped;
        self.position_ms = 0;
        self.duration_ms = 0;
        self.activity = Activity::Idle;
        self.emit();
    }

    pub(crate) fn report(&mut self, error: &SessionError) {
        for observer in &mut self.observers {
            observer.on_error(error);
        }
    }

    // Lazy prepare-then-play of the cursor's current track.
    fn prepare_current(&mut self) {
        let Some(track) = self.cursor.current().cloned() else {
            debug!("no current track, nothing to play");
            return;
        };

        if let Some(pending) = self.pending.as_mut() {
            if self.loaded.as_ref().map(|t| t.id()) == Some(track.id()) {
                debug!("track already loading, will start when ready");
                pending.auto_play = true;
                pending.stopped = false;
                return;
            }
        }

        self.load_track(track, true);
    }

    fn finish_prepare(&mut self, auto_play: bool) {
        if auto_play && self.start_playing() {
            return;
        }
        self.player.pause();
        self.transport = Transport::Paused;
        self.activity = Activity::Background;
    }

    fn start_playing(&mut self) -> bool {
        if !self.focus.request() {
            info!("audio focus denied, not starting playback");
            self.report(&SessionError::FocusDenied);
            return false;
        }

        self.player.play();
        self.transport = Transport::Playing;
        self.activity = Activity::Foreground;
        true
    }

    fn pause_playback(&mut self, abandon_focus: bool) {
        // a pending open must not start playing on its own anymore
        if let Some(pending) = self.pending.as_mut() {
            pending.auto_play = false;
        }

        if self.readiness == Readiness::Ready {
            self.player.pause();
            self.sync_position();
            if self.transport == Transport::Playing {
                self.transport = Transport::Paused;
            }
        }

        if self.activity == Activity::Foreground {
            self.activity = Activity::Background;
        }
        if abandon_focus {
            self.focus.abandon();
        }
    }

    // Nothing is playable anymore, so nothing may stay pinned in front.
    fn drop_foreground(&mut self) {
        if self.activity == Activity::Foreground {
            self.activity = Activity::Background;
        }
        self.focus.abandon();
    }

    fn sync_position(&mut self) {
        let mut position = self.player.position_ms();
        if self.duration_ms > 0 {
            position = position.min(self.duration_ms);
        }
        self.position_ms = position;
    }

    fn emit(&mut self) {
        let snapshot = self.snapshot();
        if snapshot == self.last_emitted {
            return;
        }

        for observer in &mut self.observers {
            observer.on_state_changed(&snapshot);
        }
        self.published.send_replace(snapshot.clone());
        self.last_emitted = snapshot;
    }
}
