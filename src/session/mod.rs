// Playback session - the part with actual state-machine work
// Everything touching "what is loaded and is it playing" goes through here

pub mod focus;   // focus-change signals and resume-on-gain policy
pub mod machine; // the session state machine itself
pub mod runner;  // serialized command queue driving the session

pub use focus::{AlwaysGranted, AudioFocus, FocusAction, FocusChange, FocusPolicy};
pub use machine::Session;
pub use runner::{SessionClosed, SessionCommand, SessionHandle, SessionRunner};

use crate::audio::PlayerError;
use crate::catalog::CatalogError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    NotLoaded,
    Loading,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Stopped,
    Playing,
    Paused,
}

/// How present the player should be on the host (notification, lock screen).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    /// Nothing shown; fresh session or after `stop`.
    Idle,
    /// Playing, keep the host's "now playing" surface pinned.
    Foreground,
    /// Loaded but not playing; surface stays but can be dismissed.
    Background,
}

/// What observers get after every transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub loaded_track_id: Option<Uuid>,
    pub title: Option<String>,
    pub readiness: Readiness,
    pub transport: Transport,
    pub position_ms: u64,
    pub duration_ms: u64,
    pub repeat_one: bool,
    pub activity: Activity,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            loaded_track_id: None,
            title: None,
            readiness: Readiness::NotLoaded,
            transport: Transport::Stopped,
            position_ms: 0,
            duration_ms: 0,
            repeat_one: false,
            activity: Activity::Idle,
        }
    }
}

impl Snapshot {
    pub fn is_playing(&self) -> bool {
        self.transport == Transport::Playing
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("could not load \"{title}\": {source}")]
    LoadFailed {
        track_id: Uuid,
        title: String,
        #[source]
        source: PlayerError,
    },
    #[error("audio focus denied, playback did not start")]
    FocusDenied,
    #[error("playlist is empty")]
    EmptyPlaylist,
    #[error("track {0} is not in the playlist")]
    TrackNotFound(Uuid),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Push-style listener, called synchronously on the session's control task
/// in the same order as the commands that caused each change.
pub trait SessionObserver: Send {
    fn on_state_changed(&mut self, snapshot: &Snapshot);

    fn on_error(&mut self, _error: &SessionError) {}
}
