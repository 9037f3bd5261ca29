//! SQLite schema for the normalized catalog.
//!
//! Three relations: artists, albums (owned by one artist) and songs (leaf rows
//! referencing both). Uniqueness on artist name and on (album name, artist) is
//! what the resolver relies on when two writers race to create the same row.
//! Foreign keys have no cascade, so deleting a referenced parent fails.

use rusqlite::Connection;
use tracing::{info, warn};

/// Stamped into `PRAGMA user_version`.
pub const SCHEMA_VERSION: i32 = 1;

const CREATE_TABLES: &str = "
    CREATE TABLE IF NOT EXISTS artists (
        artist_id INTEGER PRIMARY KEY,
        name TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS albums (
        album_id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        artist_id INTEGER NOT NULL REFERENCES artists(artist_id),
        UNIQUE (name, artist_id)
    );

    CREATE TABLE IF NOT EXISTS songs (
        song_id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        genre TEXT NOT NULL,
        artist_id INTEGER NOT NULL REFERENCES artists(artist_id),
        album_id INTEGER NOT NULL REFERENCES albums(album_id),
        duration TEXT NOT NULL CHECK (length(duration) <= 5),
        release_date TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_albums_artist ON albums(artist_id);
    CREATE INDEX IF NOT EXISTS idx_songs_album ON songs(album_id);
    CREATE INDEX IF NOT EXISTS idx_songs_artist ON songs(artist_id);
";

/// Create any missing tables and stamp the schema version.
pub fn bootstrap(conn: &Connection) -> rusqlite::Result<()> {
    let version = schema_version(conn)?;
    if version > SCHEMA_VERSION {
        warn!(
            "Catalog schema version {} is newer than this loader ({})",
            version, SCHEMA_VERSION
        );
    }

    conn.execute_batch(CREATE_TABLES)?;

    if version < SCHEMA_VERSION {
        info!("Initialized catalog schema at version {}", SCHEMA_VERSION);
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    }
    Ok(())
}

pub fn schema_version(conn: &Connection) -> rusqlite::Result<i32> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_names(conn: &Connection) -> Vec<String> {
        conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn test_bootstrap_creates_tables_and_version() {
        let conn = Connection::open_in_memory().unwrap();
        bootstrap(&conn).unwrap();

        assert_eq!(table_names(&conn), vec!["albums", "artists", "songs"]);
        assert_eq!(schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_bootstrap_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        bootstrap(&conn).unwrap();
        conn.execute("INSERT INTO artists (name) VALUES ('Queen')", [])
            .unwrap();

        bootstrap(&conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM artists", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_album_name_unique_per_artist_only() {
        let conn = Connection::open_in_memory().unwrap();
        bootstrap(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO artists (name) VALUES ('A'), ('B');
             INSERT INTO albums (name, artist_id) VALUES ('Hits', 1), ('Hits', 2);",
        )
        .unwrap();

        let dup = conn.execute("INSERT INTO albums (name, artist_id) VALUES ('Hits', 1)", []);
        assert!(dup.is_err());
    }

    #[test]
    fn test_duration_longer_than_five_chars_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        bootstrap(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO artists (name) VALUES ('A');
             INSERT INTO albums (name, artist_id) VALUES ('X', 1);",
        )
        .unwrap();

        let result = conn.execute(
            "INSERT INTO songs (name, genre, artist_id, album_id, duration, release_date)
             VALUES ('S', 'Rock', 1, 1, '100:00', '2020-01-01')",
            [],
        );
        assert!(result.is_err());
    }
}
