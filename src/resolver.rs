//! Get-or-create resolution of artists and albums.
//!
//! Protocol for each name: identity cache, then a storage lookup, then an
//! insert. The sequence is not atomic against other writers. A uniqueness
//! violation on insert means another writer created the row between our
//! lookup and our insert, so the resolver goes back to the lookup instead of
//! failing. Storage uniqueness is the arbiter; the cache is only a shortcut.

use tracing::debug;

use crate::cache::IdentityCache;
use crate::error::{ResolutionError, StoreError};
use crate::models::{AlbumId, ArtistId, ResolverStats};
use crate::store::{CatalogStore, Inserted};

/// Lookup/insert rounds before a name is reported as unresolvable.
pub const MAX_RESOLVE_ATTEMPTS: usize = 3;

pub struct EntityResolver<'s, S: CatalogStore> {
    store: &'s S,
    cache: IdentityCache,
    stats: ResolverStats,
}

impl<'s, S: CatalogStore> EntityResolver<'s, S> {
    /// A resolver with an empty identity cache.
    pub fn new(store: &'s S) -> Self {
        Self {
            store,
            cache: IdentityCache::new(),
            stats: ResolverStats::default(),
        }
    }

    pub fn stats(&self) -> &ResolverStats {
        &self.stats
    }

    pub fn cache(&self) -> &IdentityCache {
        &self.cache
    }

    pub fn resolve_artist(&mut self, name: &str) -> Result<ArtistId, ResolutionError> {
        if let Some(id) = self.cache.artist(name) {
            self.stats.cache_hits += 1;
            return Ok(id);
        }

        let store = self.store;
        let resolved = get_or_create(
            &mut self.stats,
            || store.find_artist(name),
            || store.insert_artist(name),
        )?;

        match resolved {
            Some(id) => {
                debug!(artist = name, %id, "resolved artist");
                self.cache.insert_artist(name, id);
                Ok(id)
            }
            None => Err(ResolutionError::ArtistUnresolved {
                name: name.to_string(),
                attempts: MAX_RESOLVE_ATTEMPTS,
            }),
        }
    }

    /// Albums are looked up and cached by (name, owning artist).
    pub fn resolve_album(
        &mut self,
        name: &str,
        artist: ArtistId,
    ) -> Result<AlbumId, ResolutionError> {
        if let Some(id) = self.cache.album(name, artist) {
            self.stats.cache_hits += 1;
            return Ok(id);
        }

        let store = self.store;
        let resolved = get_or_create(
            &mut self.stats,
            || store.find_album(name, artist),
            || store.insert_album(name, artist),
        )?;

        match resolved {
            Some(id) => {
                debug!(album = name, %artist, %id, "resolved album");
                self.cache.insert_album(name, artist, id);
                Ok(id)
            }
            None => Err(ResolutionError::AlbumUnresolved {
                name: name.to_string(),
                artist,
                attempts: MAX_RESOLVE_ATTEMPTS,
            }),
        }
    }
}

/// Lookup, then insert; on a duplicate insert, loop back to the lookup.
/// `None` means every round lost its insert and still could not read the row.
fn get_or_create<T: Copy>(
    stats: &mut ResolverStats,
    mut find: impl FnMut() -> Result<Option<T>, StoreError>,
    mut create: impl FnMut() -> Result<Inserted<T>, StoreError>,
) -> Result<Option<T>, StoreError> {
    for attempt in 1..=MAX_RESOLVE_ATTEMPTS {
        if let Some(id) = find()? {
            if attempt == 1 {
                stats.storage_hits += 1;
            } else {
                stats.conflicts_recovered += 1;
            }
            return Ok(Some(id));
        }

        match create()? {
            Inserted::Created(id) => {
                stats.created += 1;
                return Ok(Some(id));
            }
            Inserted::Duplicate => {
                debug!(attempt, "insert lost a uniqueness race, re-reading");
            }
        }
    }
    Ok(None)
}
