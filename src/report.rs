//! Aggregate read-only queries over a loaded catalog.

use rusqlite::Connection;
use serde::Serialize;

use crate::error::StoreError;

/// A parent entity and how many children reference it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupCount {
    pub id: i64,
    pub name: String,
    pub count: i64,
}

/// Albums holding more than one song, by album id.
pub fn songs_per_album(conn: &Connection) -> Result<Vec<GroupCount>, StoreError> {
    group_counts(
        conn,
        "SELECT a.album_id, a.name, COUNT(*)
         FROM songs s
         JOIN albums a ON a.album_id = s.album_id
         GROUP BY a.album_id
         HAVING COUNT(*) > 1
         ORDER BY a.album_id",
    )
}

/// Artists owning more than one album, by artist id.
pub fn albums_per_artist(conn: &Connection) -> Result<Vec<GroupCount>, StoreError> {
    group_counts(
        conn,
        "SELECT ar.artist_id, ar.name, COUNT(*)
         FROM albums al
         JOIN artists ar ON ar.artist_id = al.artist_id
         GROUP BY ar.artist_id
         HAVING COUNT(*) > 1
         ORDER BY ar.artist_id",
    )
}

fn group_counts(conn: &Connection, sql: &str) -> Result<Vec<GroupCount>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], |row| {
        Ok(GroupCount {
            id: row.get(0)?,
            name: row.get(1)?,
            count: row.get(2)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}
