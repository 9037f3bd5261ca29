//! Catalog loading pipeline.
//!
//! For each raw record, in order: normalize, resolve the artist, resolve the
//! album under that artist, insert the song. A record that fails is logged,
//! counted as skipped and the loader moves on. Only a connection-level storage
//! failure stops the run; rows written before it stay committed.

use indicatif::ProgressBar;
use rayon::prelude::*;
use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::{LoadError, RecordError, StoreError};
use crate::models::{LoadSummary, RawRecord, SongId};
use crate::normalize::{normalize_record, ARTIST_NAME_FIELD};
use crate::progress::{self, LOG_INTERVAL};
use crate::resolver::EntityResolver;
use crate::source::DEFAULT_DELIMITER;
use crate::store::{CatalogStore, StoreConfig};

/// Knobs for one load run.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub delimiter: char,
    /// 1 loads sequentially; more splits records into that many shards
    pub workers: usize,
    pub store: StoreConfig,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER,
            workers: 1,
            store: StoreConfig::default(),
        }
    }
}

impl LoadOptions {
    pub fn is_sharded(&self) -> bool {
        self.workers > 1
    }
}

/// Shared stop flag; loaders finish the record in hand and then return.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct CatalogLoader<'s, S: CatalogStore> {
    store: &'s S,
    resolver: EntityResolver<'s, S>,
    cancel: CancelToken,
    progress: Option<ProgressBar>,
}

impl<'s, S: CatalogStore> CatalogLoader<'s, S> {
    /// A loader with a fresh identity cache: one loader is one session.
    pub fn new(store: &'s S) -> Self {
        Self {
            store,
            resolver: EntityResolver::new(store),
            cancel: CancelToken::new(),
            progress: None,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn resolver(&self) -> &EntityResolver<'s, S> {
        &self.resolver
    }

    pub fn load<I>(&mut self, records: I) -> Result<LoadSummary, LoadError>
    where
        I: IntoIterator<Item = RawRecord>,
    {
        let start = Instant::now();
        let mut summary = LoadSummary::default();

        for raw in records {
            if self.cancel.is_cancelled() {
                info!("Cancellation requested, stopping before line {}", raw.line);
                summary.cancelled = true;
                break;
            }
            summary.total += 1;

            match self.load_record(&raw) {
                Ok(song) => {
                    summary.loaded += 1;
                    debug!(line = raw.line, %song, "loaded record");
                }
                Err(err) => match err.into_unavailable() {
                    Ok(source) => {
                        error!("Line {}: {}; aborting load", raw.line, source);
                        return Err(self.abort(summary, source, start));
                    }
                    Err(err) => {
                        warn!("Line {}: skipping record: {}", raw.line, err);
                        summary.record_skip(raw.line, err.kind(), err.to_string());
                    }
                },
            }

            if let Some(pb) = &self.progress {
                progress::tick(pb, "load", LOG_INTERVAL);
            }
        }

        let cache = self.resolver.cache();
        debug!(
            artists = cache.artist_count(),
            albums = cache.album_count(),
            "session identity cache size"
        );
        summary.resolver = self.resolver.stats().clone();
        summary.finish(start.elapsed());
        Ok(summary)
    }

    /// Normalize, resolve parents, insert the song.
    pub fn load_record(&mut self, raw: &RawRecord) -> Result<SongId, RecordError> {
        let record = normalize_record(raw)?;
        let artist = self.resolver.resolve_artist(&record.artist_name)?;
        let album = self.resolver.resolve_album(&record.album_name, artist)?;
        Ok(self.store.insert_song(&record, artist, album)?)
    }

    fn abort(&self, mut summary: LoadSummary, source: StoreError, start: Instant) -> LoadError {
        summary.resolver = self.resolver.stats().clone();
        summary.finish(start.elapsed());
        LoadError::StorageUnavailable {
            summary: Box::new(summary),
            source,
        }
    }
}

/// Shard index for a record: all rows of one artist land on the same worker.
pub fn shard_for(raw: &RawRecord, shards: usize) -> usize {
    let artist = raw
        .fields
        .get(ARTIST_NAME_FIELD)
        .map(|s| s.trim())
        .unwrap_or("");
    let mut hasher = FxHasher::default();
    artist.hash(&mut hasher);
    (hasher.finish() % shards.max(1) as u64) as usize
}

/// Load records on the rayon pool, one loader per shard.
///
/// Each shard opens its own store through `open_store` and keeps its own
/// identity cache; nothing is shared between workers except the database.
/// Conflicting creates between workers are settled by storage uniqueness.
pub fn load_sharded<S, F>(
    records: Vec<RawRecord>,
    shards: usize,
    open_store: F,
    cancel: &CancelToken,
    progress: Option<&ProgressBar>,
) -> Result<LoadSummary, LoadError>
where
    S: CatalogStore,
    F: Fn() -> Result<S, StoreError> + Sync,
{
    let start = Instant::now();
    let shards = shards.max(1);

    let mut buckets: Vec<Vec<RawRecord>> = (0..shards).map(|_| Vec::new()).collect();
    for raw in records {
        let shard = shard_for(&raw, shards);
        buckets[shard].push(raw);
    }

    let results: Vec<Result<LoadSummary, LoadError>> = buckets
        .into_par_iter()
        .enumerate()
        .map(|(shard, bucket)| {
            debug!(shard, records = bucket.len(), "starting shard");
            let store = open_store().map_err(|source| LoadError::StorageUnavailable {
                summary: Box::default(),
                source,
            })?;
            let mut loader = CatalogLoader::new(&store).with_cancel(cancel.clone());
            if let Some(pb) = progress {
                loader = loader.with_progress(pb.clone());
            }
            loader.load(bucket)
        })
        .collect();

    let mut merged = LoadSummary::default();
    let mut failure: Option<StoreError> = None;
    for result in results {
        match result {
            Ok(summary) => merged.merge(summary),
            Err(LoadError::StorageUnavailable { summary, source }) => {
                merged.merge(*summary);
                if failure.is_some() {
                    warn!("Another shard also aborted: {}", source);
                } else {
                    failure = Some(source);
                }
            }
        }
    }
    merged.finish(start.elapsed());

    match failure {
        Some(source) => Err(LoadError::StorageUnavailable {
            summary: Box::new(merged),
            source,
        }),
        None => Ok(merged),
    }
}
