// Track catalog - the user's picked files, in the order they were added
// The session only ever reads the whole list; the CLI adds and removes

pub mod database; // SQLite-backed catalog

pub use database::SqliteCatalog;

use crate::audio::Track;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("catalog i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("catalog connection poisoned by a panicked writer")]
    Poisoned,
}

/// Ordered store of track records, oldest first.
pub trait TrackCatalog: Send + Sync {
    fn list_all(&self) -> Result<Vec<Track>, CatalogError>;

    /// Inserting an id that already exists replaces the record.
    fn insert(&self, track: &Track) -> Result<(), CatalogError>;

    /// Returns whether a record was removed.
    fn delete_by_id(&self, id: Uuid) -> Result<bool, CatalogError>;

    fn get_by_id(&self, id: Uuid) -> Result<Option<Track>, CatalogError>;
}
