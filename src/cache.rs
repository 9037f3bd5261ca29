//! Session-scoped identity cache.
//!
//! Maps exact artist names, and (artist, album name) pairs, to the ids the
//! resolver already knows about. One cache belongs to one load session or
//! shard and is dropped with it; nothing here is persisted or shared.

use rustc_hash::FxHashMap;

use crate::models::{AlbumId, ArtistId};

#[derive(Default, Debug)]
pub struct IdentityCache {
    artists: FxHashMap<String, ArtistId>,
    /// Album names are only unique within one artist, so they are keyed by owner first.
    albums: FxHashMap<ArtistId, FxHashMap<String, AlbumId>>,
    album_count: usize,
}

impl IdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn artist(&self, name: &str) -> Option<ArtistId> {
        self.artists.get(name).copied()
    }

    pub fn insert_artist(&mut self, name: &str, id: ArtistId) {
        self.artists.insert(name.to_string(), id);
    }

    pub fn album(&self, name: &str, artist: ArtistId) -> Option<AlbumId> {
        self.albums.get(&artist)?.get(name).copied()
    }

    pub fn insert_album(&mut self, name: &str, artist: ArtistId, id: AlbumId) {
        let previous = self
            .albums
            .entry(artist)
            .or_default()
            .insert(name.to_string(), id);
        if previous.is_none() {
            self.album_count += 1;
        }
    }

    pub fn artist_count(&self) -> usize {
        self.artists.len()
    }

    pub fn album_count(&self) -> usize {
        self.album_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artist_lookup_is_exact() {
        let mut cache = IdentityCache::new();
        cache.insert_artist("Queen", ArtistId(1));

        assert_eq!(cache.artist("Queen"), Some(ArtistId(1)));
        assert_eq!(cache.artist("queen"), None);
        assert_eq!(cache.artist("Queen "), None);
    }

    #[test]
    fn test_album_names_are_scoped_by_artist() {
        let mut cache = IdentityCache::new();
        cache.insert_album("Greatest Hits", ArtistId(1), AlbumId(10));
        cache.insert_album("Greatest Hits", ArtistId(2), AlbumId(20));

        assert_eq!(cache.album("Greatest Hits", ArtistId(1)), Some(AlbumId(10)));
        assert_eq!(cache.album("Greatest Hits", ArtistId(2)), Some(AlbumId(20)));
        assert_eq!(cache.album("Greatest Hits", ArtistId(3)), None);
        assert_eq!(cache.album_count(), 2);
    }

    #[test]
    fn test_reinsert_does_not_double_count() {
        let mut cache = IdentityCache::new();
        cache.insert_album("A Night at the Opera", ArtistId(1), AlbumId(5));
        cache.insert_album("A Night at the Opera", ArtistId(1), AlbumId(5));
        assert_eq!(cache.album_count(), 1);
    }

    #[test]
    fn test_counts() {
        let mut cache = IdentityCache::new();
        assert_eq!((cache.artist_count(), cache.album_count()), (0, 0));
        cache.insert_artist("Queen", ArtistId(1));
        cache.insert_artist("Queen", ArtistId(1));
        cache.insert_album("Innuendo", ArtistId(1), AlbumId(2));
        assert_eq!((cache.artist_count(), cache.album_count()), (1, 1));
    }
}
