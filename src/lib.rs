// mixtape library - playback core for a local-file music player
// The session owns all playback state; everything else feeds it or watches it

pub mod audio;   // single-stream player, playlist cursor, track records
pub mod catalog; // persistent list of picked tracks
pub mod config;  // settings and preferences
pub mod session; // playback state machine and its command runner
pub mod ui;      // console reporting and line commands

#[cfg(test)]
mod testing;

// Export the stuff other modules actually use
pub use audio::{PlaylistCursor, StreamPlayer, Track};
pub use catalog::{CatalogError, SqliteCatalog, TrackCatalog};
pub use config::Config;
pub use session::{
    Session, SessionCommand, SessionError, SessionHandle, SessionObserver, SessionRunner, Snapshot,
};
