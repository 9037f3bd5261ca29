//! Print albums with several songs and artists with several albums.
//!
//! Usage: catalog-report <catalog.sqlite3> [--json]

use anyhow::{Context, Result};
use clap::Parser;
use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use std::path::PathBuf;

use catalog_loader::report::{albums_per_artist, songs_per_album, GroupCount};

#[derive(Parser)]
#[command(name = "catalog-report")]
#[command(about = "Aggregate counts over a loaded song catalog")]
struct Args {
    database: PathBuf,

    /// Emit JSON instead of text lines
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct Report {
    songs_per_album: Vec<GroupCount>,
    albums_per_artist: Vec<GroupCount>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let conn = Connection::open_with_flags(&args.database, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .with_context(|| format!("Failed to open catalog {}", args.database.display()))?;

    let report = Report {
        songs_per_album: songs_per_album(&conn)?,
        albums_per_artist: albums_per_artist(&conn)?,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for album in &report.songs_per_album {
        println!("Album {} ({}) has {} songs", album.id, album.name, album.count);
    }
    for artist in &report.albums_per_artist {
        println!("Artist {} ({}) has {} albums", artist.id, artist.name, artist.count);
    }
    if report.songs_per_album.is_empty() && report.albums_per_artist.is_empty() {
        println!("No album has more than one song and no artist more than one album.");
    }

    Ok(())
}
