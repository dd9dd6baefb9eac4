use super::{CatalogError, TrackCatalog};
use crate::audio::Track;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

pub struct SqliteCatalog {
    conn: Mutex<Connection>,
}

impl SqliteCatalog {
    /// Opens (and creates if needed) the catalog at `db_path`.
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self, CatalogError> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        debug!(path = %db_path.display(), "opening track catalog");
        Self::from_connection(Connection::open(db_path)?)
    }

    pub fn open_in_memory() -> Result<Self, CatalogError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, CatalogError> {
        // added_at is stored as microseconds since the epoch
        conn.execute(
            "CREATE TABLE IF NOT EXISTS tracks (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                source TEXT NOT NULL,
                added_at INTEGER NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_tracks_added_at ON tracks(added_at)",
            [],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, CatalogError> {
        self.conn.lock().map_err(|_| CatalogError::Poisoned)
    }

    fn row_to_track(row: &Row) -> rusqlite::Result<Track> {
        let id_str: String = row.get(0)?;
        let id = Uuid::parse_str(&id_str).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?;

        let added_micros: i64 = row.get(3)?;
        let added_at = DateTime::<Utc>::from_timestamp_micros(added_micros).ok_or(
            rusqlite::Error::IntegralValueOutOfRange(3, added_micros),
        )?;

        let title: String = row.get(1)?;
        let source: String = row.get(2)?;
        Ok(Track::from_parts(id, title, source, added_at))
    }
}

impl TrackCatalog for SqliteCatalog {
    fn list_all(&self) -> Result<Vec<Track>, CatalogError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, title, source, added_at FROM tracks ORDER BY added_at, rowid",
        )?;
        let tracks = stmt
            .query_map([], Self::row_to_track)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tracks)
    }

    fn insert(&self, track: &Track) -> Result<(), CatalogError> {
        self.conn()?.execute(
            "INSERT OR REPLACE INTO tracks (id, title, source, added_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                track.id().to_string(),
                track.title(),
                track.source(),
                track.added_at().timestamp_micros(),
            ],
        )?;
        Ok(())
    }

    fn delete_by_id(&self, id: Uuid) -> Result<bool, CatalogError> {
        let removed = self
            .conn()?
            .execute("DELETE FROM tracks WHERE id = ?1", params![id.to_string()])?;
        Ok(removed > 0)
    }

    fn get_by_id(&self, id: Uuid) -> Result<Option<Track>, CatalogError> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT id, title, source, added_at FROM tracks WHERE id = ?1")?;
        let track = stmt
            .query_row(params![id.to_string()], Self::row_to_track)
            .optional()?;
        Ok(track)
    }
}
