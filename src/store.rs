//! Storage collaborator.
//!
//! [`CatalogStore`] is the only way the resolver, loader and deletion guard
//! touch persisted state. [`SqliteCatalogStore`] implements it on a single
//! rusqlite connection; every statement runs in autocommit mode, so each
//! insert is durable on its own.

use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{is_unique_violation, StoreError};
use crate::models::{AlbumId, ArtistId, SongId, SongRecord};
use crate::schema;

/// Result of an insert into a relation with a uniqueness constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inserted<T> {
    Created(T),
    /// The natural key already exists; some other writer got there first.
    Duplicate,
}

pub trait CatalogStore {
    fn find_artist(&self, name: &str) -> Result<Option<ArtistId>, StoreError>;

    fn insert_artist(&self, name: &str) -> Result<Inserted<ArtistId>, StoreError>;

    fn find_album(&self, name: &str, artist: ArtistId) -> Result<Option<AlbumId>, StoreError>;

    fn insert_album(&self, name: &str, artist: ArtistId) -> Result<Inserted<AlbumId>, StoreError>;

    fn insert_song(
        &self,
        song: &SongRecord,
        artist: ArtistId,
        album: AlbumId,
    ) -> Result<SongId, StoreError>;

    /// Returns false when no row had that id.
    fn delete_artist(&self, id: ArtistId) -> Result<bool, StoreError>;

    fn delete_album(&self, id: AlbumId) -> Result<bool, StoreError>;
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// How long a statement waits on a locked database before failing.
    pub busy_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogCounts {
    pub artists: i64,
    pub albums: i64,
    pub songs: i64,
}

pub struct SqliteCatalogStore {
    conn: Connection,
}

impl SqliteCatalogStore {
    /// Open (creating if needed) a catalog database file and bootstrap its schema.
    pub fn open<P: AsRef<Path>>(path: P, config: &StoreConfig) -> Result<Self, StoreError> {
        let conn = Connection::open_with_flags(
            path.as_ref(),
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(StoreError::Unavailable)?;
        conn.busy_timeout(config.busy_timeout)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(StoreError::Unavailable)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA synchronous = NORMAL;",
        )?;
        schema::bootstrap(&conn)?;
        Ok(Self { conn })
    }

    /// Read access for reporting queries.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn counts(&self) -> Result<CatalogCounts, StoreError> {
        let count = |table: &str| -> Result<i64, StoreError> {
            Ok(self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))?)
        };
        Ok(CatalogCounts {
            artists: count("artists")?,
            albums: count("albums")?,
            songs: count("songs")?,
        })
    }

    pub fn log_counts(&self) -> Result<(), StoreError> {
        let counts = self.counts()?;
        info!(
            "Catalog contains {} artists, {} albums, {} songs",
            counts.artists, counts.albums, counts.songs
        );
        Ok(())
    }

    fn insert_unique(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Inserted<i64>, StoreError> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        match stmt.execute(params) {
            Ok(_) => Ok(Inserted::Created(self.conn.last_insert_rowid())),
            Err(err) if is_unique_violation(&err) => Ok(Inserted::Duplicate),
            Err(err) => Err(err.into()),
        }
    }
}

impl CatalogStore for SqliteCatalogStore {
    fn find_artist(&self, name: &str) -> Result<Option<ArtistId>, StoreError> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT artist_id FROM artists WHERE name = ?1")?;
        let id: Option<i64> = stmt.query_row(params![name], |r| r.get(0)).optional()?;
        Ok(id.map(ArtistId))
    }

    fn insert_artist(&self, name: &str) -> Result<Inserted<ArtistId>, StoreError> {
        let inserted =
            self.insert_unique("INSERT INTO artists (name) VALUES (?1)", params![name])?;
        Ok(match inserted {
            Inserted::Created(rowid) => Inserted::Created(ArtistId(rowid)),
            Inserted::Duplicate => Inserted::Duplicate,
        })
    }

    fn find_album(&self, name: &str, artist: ArtistId) -> Result<Option<AlbumId>, StoreError> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT album_id FROM albums WHERE name = ?1 AND artist_id = ?2")?;
        let id: Option<i64> = stmt
            .query_row(params![name, artist.0], |r| r.get(0))
            .optional()?;
        Ok(id.map(AlbumId))
    }

    fn insert_album(
        &self,
        name: &str,
        artist: ArtistId,
    ) -> Result<Inserted<AlbumId>, StoreError> {
        let inserted = self.insert_unique(
            "INSERT INTO albums (name, artist_id) VALUES (?1, ?2)",
            params![name, artist.0],
        )?;
        Ok(match inserted {
            Inserted::Created(rowid) => Inserted::Created(AlbumId(rowid)),
            Inserted::Duplicate => Inserted::Duplicate,
        })
    }

    fn insert_song(
        &self,
        song: &SongRecord,
        artist: ArtistId,
        album: AlbumId,
    ) -> Result<SongId, StoreError> {
        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO songs (name, genre, artist_id, album_id, duration, release_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        stmt.execute(params![
            song.song_name,
            song.genre,
            artist.0,
            album.0,
            song.duration,
            song.release_date,
        ])?;
        Ok(SongId(self.conn.last_insert_rowid()))
    }

    fn delete_artist(&self, id: ArtistId) -> Result<bool, StoreError> {
        let deleted = self
            .conn
            .execute("DELETE FROM artists WHERE artist_id = ?1", params![id.0])?;
        Ok(deleted > 0)
    }

    fn delete_album(&self, id: AlbumId) -> Result<bool, StoreError> {
        let deleted = self
            .conn
            .execute("DELETE FROM albums WHERE album_id = ?1", params![id.0])?;
        Ok(deleted > 0)
    }
}
