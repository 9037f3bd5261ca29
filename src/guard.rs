//! Deletion attempts for parent entities.
//!
//! Deleting an artist or album that songs (or albums) still reference must
//! fail and leave every row in place. The guard runs the deletion, reports
//! what happened and never propagates the error: a blocked delete is an
//! expected outcome, not a failed run.

use serde::Serialize;
use tracing::{info, warn};

use crate::error::{IntegrityConflict, StoreError};
use crate::models::{AlbumId, ArtistId, EntityKind};
use crate::store::CatalogStore;

#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeletionOutcome {
    Deleted,
    NotFound,
    Conflict {
        #[serde(skip)]
        conflict: IntegrityConflict,
        message: String,
    },
    Failed {
        message: String,
    },
}

impl DeletionOutcome {
    pub fn is_conflict(&self) -> bool {
        matches!(self, DeletionOutcome::Conflict { .. })
    }
}

/// Outcomes of the deletions that were asked for; `None` means not attempted.
#[derive(Debug, Default, Serialize)]
pub struct DeletionReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<DeletionOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<DeletionOutcome>,
}

impl DeletionReport {
    pub fn has_conflicts(&self) -> bool {
        self.artist.as_ref().is_some_and(DeletionOutcome::is_conflict)
            || self.album.as_ref().is_some_and(DeletionOutcome::is_conflict)
    }

    pub fn is_empty(&self) -> bool {
        self.artist.is_none() && self.album.is_none()
    }
}

pub fn try_delete_artist<S: CatalogStore>(store: &S, id: ArtistId) -> DeletionOutcome {
    outcome(EntityKind::Artist, id.0, store.delete_artist(id))
}

pub fn try_delete_album<S: CatalogStore>(store: &S, id: AlbumId) -> DeletionOutcome {
    outcome(EntityKind::Album, id.0, store.delete_album(id))
}

/// Try both deletions independently; the second runs whatever the first did.
pub fn attempt_deletions<S: CatalogStore>(
    store: &S,
    artist: ArtistId,
    album: AlbumId,
) -> DeletionReport {
    attempt_requested_deletions(store, Some(artist), Some(album))
}

/// Like [`attempt_deletions`], skipping the entities with no id given.
pub fn attempt_requested_deletions<S: CatalogStore>(
    store: &S,
    artist: Option<ArtistId>,
    album: Option<AlbumId>,
) -> DeletionReport {
    DeletionReport {
        artist: artist.map(|id| try_delete_artist(store, id)),
        album: album.map(|id| try_delete_album(store, id)),
    }
}

fn outcome(entity: EntityKind, id: i64, result: Result<bool, StoreError>) -> DeletionOutcome {
    match result {
        Ok(true) => {
            info!("Deleted {} {}", entity, id);
            DeletionOutcome::Deleted
        }
        Ok(false) => {
            info!("No {} with id {} to delete", entity, id);
            DeletionOutcome::NotFound
        }
        Err(StoreError::IntegrityConflict(source)) => {
            let conflict = IntegrityConflict {
                entity,
                id,
                message: source.to_string(),
            };
            warn!("{}", conflict);
            DeletionOutcome::Conflict {
                message: conflict.to_string(),
                conflict,
            }
        }
        Err(err) => {
            warn!("Deleting {} {} failed: {}", entity, id, err);
            DeletionOutcome::Failed {
                message: err.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::CatalogLoader;
    use crate::models::RawRecord;
    use crate::store::{Inserted, SqliteCatalogStore};

    fn loaded_store() -> SqliteCatalogStore {
        let store = SqliteCatalogStore::open_in_memory().unwrap();
        CatalogLoader::new(&store)
            .load(vec![RawRecord::new(
                2,
                ["1", "S1", "Rock", "ArtistA", "AlbumX", "3:45", "01/01/2020"],
            )])
            .unwrap();
        store
    }

    #[test]
    fn test_referenced_artist_and_album_are_kept() {
        let store = loaded_store();
        let before = store.counts().unwrap();

        let report = attempt_deletions(&store, ArtistId(1), AlbumId(1));

        assert!(report.has_conflicts());
        match &report.artist {
            Some(DeletionOutcome::Conflict { conflict, .. }) => {
                assert_eq!(conflict.entity, EntityKind::Artist);
                assert_eq!(conflict.id, 1);
            }
            other => panic!("expected a conflict, got {other:?}"),
        }
        assert!(report.album.as_ref().is_some_and(DeletionOutcome::is_conflict));
        assert_eq!(store.counts().unwrap(), before);
    }

    #[test]
    fn test_unreferenced_album_deleted_while_artist_blocked() {
        let store = loaded_store();
        let Inserted::Created(spare) = store.insert_album("Empty", ArtistId(1)).unwrap() else {
            panic!("fresh album");
        };

        let report = attempt_deletions(&store, ArtistId(1), spare);
        assert!(report.artist.as_ref().is_some_and(DeletionOutcome::is_conflict));
        assert!(matches!(report.album, Some(DeletionOutcome::Deleted)));
        assert_eq!(store.counts().unwrap().albums, 1);
    }

    #[test]
    fn test_missing_ids_are_not_found() {
        let store = SqliteCatalogStore::open_in_memory().unwrap();
        let report = attempt_deletions(&store, ArtistId(42), AlbumId(42));
        assert!(matches!(report.artist, Some(DeletionOutcome::NotFound)));
        assert!(matches!(report.album, Some(DeletionOutcome::NotFound)));
        assert!(!report.has_conflicts());
    }

    #[test]
    fn test_report_serializes_outcome_tag() {
        let store = loaded_store();
        let report = attempt_deletions(&store, ArtistId(1), AlbumId(9));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["artist"]["outcome"], "conflict");
        assert_eq!(json["album"]["outcome"], "not_found");
    }

    #[test]
    fn test_only_requested_deletions_run() {
        let store = loaded_store();
        let Inserted::Created(spare) = store.insert_album("Empty", ArtistId(1)).unwrap() else {
            panic!("fresh album");
        };

        let report = attempt_requested_deletions(&store, None, Some(spare));
        assert!(report.artist.is_none());
        assert!(matches!(report.album, Some(DeletionOutcome::Deleted)));
        assert!(!report.has_conflicts());

        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("artist").is_none());
        assert_eq!(json["album"]["outcome"], "deleted");

        assert!(attempt_requested_deletions(&store, None, None).is_empty());
    }
}
