//! Serialized driver for a [`Session`].
//!
//! One task owns the session and handles, one at a time, user commands,
//! finished opens, catalog refresh results and a periodic tick. Callers talk
//! to it through a cloneable [`SessionHandle`].

use super::focus::{AudioFocus, FocusChange};
use super::machine::Session;
use super::{SessionError, SessionObserver, Snapshot};
use crate::audio::{MediaBackend, Prepared, StreamPlayer, Track};
use crate::catalog::{CatalogError, TrackCatalog};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug)]
pub enum SessionCommand {
    PlayPause,
    Play,
    Pause,
    Next,
    Prev,
    Seek(i64),
    SetRepeatOne(bool),
    Stop,
    SelectTrack { id: Uuid, auto_play: bool },
    SetPlaylist(Vec<Track>),
    /// Re-read the attached catalog off the control task.
    RefreshPlaylist,
    Focus(FocusChange),
    Shutdown,
}

#[derive(Debug, Error)]
#[error("playback session has shut down")]
pub struct SessionClosed;

#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
    snapshots: watch::Receiver<Snapshot>,
}

impl SessionHandle {
    pub fn send(&self, command: SessionCommand) -> Result<(), SessionClosed> {
        self.commands.send(command).map_err(|_| SessionClosed)
    }

    pub fn play_pause(&self) -> Result<(), SessionClosed> {
        self.send(SessionCommand::PlayPause)
    }

    pub fn play(&self) -> Result<(), SessionClosed> {
        self.send(SessionCommand::Play)
    }

    pub fn pause(&self) -> Result<(), SessionClosed> {
        self.send(SessionCommand::Pause)
    }

    pub fn next(&self) -> Result<(), SessionClosed> {
        self.send(SessionCommand::Next)
    }

    pub fn prev(&self) -> Result<(), SessionClosed> {
        self.send(SessionCommand::Prev)
    }

    pub fn seek(&self, position_ms: i64) -> Result<(), SessionClosed> {
        self.send(SessionCommand::Seek(position_ms))
    }

    pub fn set_repeat_one(&self, on: bool) -> Result<(), SessionClosed> {
        self.send(SessionCommand::SetRepeatOne(on))
    }

    pub fn stop(&self) -> Result<(), SessionClosed> {
        self.send(SessionCommand::Stop)
    }

    pub fn select_track(&self, id: Uuid, auto_play: bool) -> Result<(), SessionClosed> {
        self.send(SessionCommand::SelectTrack { id, auto_play })
    }

    pub fn set_playlist(&self, tracks: Vec<Track>) -> Result<(), SessionClosed> {
        self.send(SessionCommand::SetPlaylist(tracks))
    }

    pub fn refresh_playlist(&self) -> Result<(), SessionClosed> {
        self.send(SessionCommand::RefreshPlaylist)
    }

    pub fn focus(&self, change: FocusChange) -> Result<(), SessionClosed> {
        self.send(SessionCommand::Focus(change))
    }

    pub fn shutdown(&self) -> Result<(), SessionClosed> {
        self.send(SessionCommand::Shutdown)
    }

    /// Latest published state, including tick-driven position updates.
    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.clone()
    }
}

type Refreshed = Result<Vec<Track>, CatalogError>;

pub struct SessionRunner<B: MediaBackend> {
    session: Session<B>,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    prepared: mpsc::UnboundedReceiver<Prepared<B::Stream>>,
    catalog: Option<Arc<dyn TrackCatalog>>,
    refreshed_tx: mpsc::UnboundedSender<Refreshed>,
    refreshed_rx: mpsc::UnboundedReceiver<Refreshed>,
    tick: Duration,
}

impl<B: MediaBackend> SessionRunner<B> {
    pub fn new(backend: B, focus: Box<dyn AudioFocus>, tick: Duration) -> (Self, SessionHandle) {
        let (player, prepared) = StreamPlayer::new(backend);
        let session = Session::new(player, focus);
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (refreshed_tx, refreshed_rx) = mpsc::unbounded_channel();

        let handle = SessionHandle {
            commands: commands_tx,
            snapshots: session.subscribe(),
        };
        let runner = Self {
            session,
            commands,
            prepared,
            catalog: None,
            refreshed_tx,
            refreshed_rx,
            tick: tick.max(Duration::from_millis(10)),
        };
        (runner, handle)
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn TrackCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn add_observer(&mut self, observer: Box<dyn SessionObserver>) {
        self.session.add_observer(observer);
    }

    /// Runs until a `Shutdown` command arrives or every handle is dropped,
    /// then tears the session down.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("session runner started");

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(SessionCommand::Shutdown) | None => break,
                    Some(command) => self.handle(command),
                },
                Some(prepared) = self.prepared.recv() => self.session.on_prepared(prepared),
                Some(refreshed) = self.refreshed_rx.recv() => self.on_refreshed(refreshed),
                _ = ticker.tick() => self.session.tick(),
            }
        }

        self.session.teardown();
        info!("session runner stopped");
    }

    fn handle(&mut self, command: SessionCommand) {
        debug!(?command, "session command");
        match command {
            SessionCommand::PlayPause => self.session.toggle_play_pause(),
            SessionCommand::Play => self.session.play(),
            SessionCommand::Pause => self.session.pause(),
            // skipping from the host always starts the neighbor
            SessionCommand::Next => self.session.next(true),
            SessionCommand::Prev => self.session.prev(true),
            SessionCommand::Seek(position_ms) => self.session.seek(position_ms),
            SessionCommand::SetRepeatOne(on) => self.session.set_repeat_one(on),
            SessionCommand::Stop => self.session.stop(),
            SessionCommand::SelectTrack { id, auto_play } => {
                if let Err(e) = self.session.select_track(id, auto_play) {
                    warn!(error = %e, "track selection failed");
                    self.session.report(&e);
                }
            }
            SessionCommand::SetPlaylist(tracks) => self.session.set_playlist(tracks),
            SessionCommand::RefreshPlaylist => self.refresh(),
            SessionCommand::Focus(change) => self.session.on_focus_change(change),
            // consumed by the run loop
            SessionCommand::Shutdown => {}
        }
    }

    fn refresh(&self) {
        let Some(catalog) = self.catalog.clone() else {
            debug!("no catalog attached, refresh ignored");
            return;
        };

        let results = self.refreshed_tx.clone();
        tokio::task::spawn_blocking(move || {
            if results.send(catalog.list_all()).is_err() {
                debug!("runner gone before catalog refresh finished");
            }
        });
    }

    fn on_refreshed(&mut self, refreshed: Refreshed) {
        match refreshed {
            Ok(tracks) => {
                info!(count = tracks.len(), "playlist refreshed from catalog");
                self.session.set_playlist(tracks);
            }
            Err(e) => {
                warn!(error = %e, "catalog refresh failed");
                self.session.report(&SessionError::Catalog(e));
            }
        }
    }
}
