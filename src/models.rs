//! Core data models for catalog loading.
//!
//! Identifiers, raw and normalized records, and the per-run statistics that
//! the loader reports at the end of a session.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tracing::{info, warn};

use crate::guard::DeletionReport;
use crate::progress::format_duration;

// ============================================================================
// Identifiers
// ============================================================================

/// Row id of an artist. Assigned by storage on first creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ArtistId(pub i64);

/// Row id of an album.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct AlbumId(pub i64);

/// Row id of a song.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SongId(pub i64);

impl fmt::Display for ArtistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "artist#{}", self.0)
    }
}

impl fmt::Display for AlbumId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "album#{}", self.0)
    }
}

impl fmt::Display for SongId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "song#{}", self.0)
    }
}

/// Parent entity kinds that can be resolved or deleted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Artist,
    Album,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Artist => f.write_str("artist"),
            EntityKind::Album => f.write_str("album"),
        }
    }
}

// ============================================================================
// Records
// ============================================================================

/// One data row from the input source, split into fields but otherwise untouched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawRecord {
    /// 1-based line number in the source file (the header is line 1)
    pub line: usize,
    pub fields: Vec<String>,
}

impl RawRecord {
    pub fn new<I, S>(line: usize, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            line,
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

/// A record after trimming and validation; every field is non-empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SongRecord {
    pub song_name: String,
    pub genre: String,
    pub artist_name: String,
    pub album_name: String,
    /// "m:ss" or "mm:ss", at most 5 characters
    pub duration: String,
    pub release_date: NaiveDate,
}

// ============================================================================
// Statistics (Instrumentation)
// ============================================================================

/// Why a record was skipped. Serialized as a map key in the summary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipKind {
    Malformed,
    DateParse,
    Resolution,
    Persistence,
}

#[derive(Clone, Debug, Serialize)]
pub struct SkippedRecord {
    pub line: usize,
    pub kind: SkipKind,
    pub reason: String,
}

/// Counters kept by one entity resolver.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolverStats {
    pub cache_hits: usize,
    pub storage_hits: usize,
    pub created: usize,
    /// Inserts that hit a uniqueness conflict and were answered by re-reading
    pub conflicts_recovered: usize,
}

impl ResolverStats {
    pub fn merge(&mut self, other: &ResolverStats) {
        self.cache_hits += other.cache_hits;
        self.storage_hits += other.storage_hits;
        self.created += other.created;
        self.conflicts_recovered += other.conflicts_recovered;
    }
}

/// Outcome of one load session.
#[derive(Default, Debug, Clone, Serialize)]
pub struct LoadSummary {
    /// Records attempted (excludes records never reached because of cancellation)
    pub total: usize,
    pub loaded: usize,
    pub skipped: Vec<SkippedRecord>,
    pub skipped_by_kind: BTreeMap<SkipKind, usize>,
    pub cancelled: bool,
    pub resolver: ResolverStats,
    pub elapsed_seconds: f64,
}

impl LoadSummary {
    pub fn record_skip(&mut self, line: usize, kind: SkipKind, reason: String) {
        *self.skipped_by_kind.entry(kind).or_default() += 1;
        self.skipped.push(SkippedRecord { line, kind, reason });
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    /// True when every attempted record loaded and the run was not cut short.
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty() && !self.cancelled
    }

    /// Fold a shard's summary into this one.
    pub fn merge(&mut self, other: LoadSummary) {
        self.total += other.total;
        self.loaded += other.loaded;
        for (kind, count) in other.skipped_by_kind {
            *self.skipped_by_kind.entry(kind).or_default() += count;
        }
        self.skipped.extend(other.skipped);
        self.cancelled |= other.cancelled;
        self.resolver.merge(&other.resolver);
    }

    /// Sort skips by line and stamp the wall-clock time.
    pub fn finish(&mut self, elapsed: Duration) {
        self.skipped.sort_by_key(|s| s.line);
        self.elapsed_seconds = elapsed.as_secs_f64();
    }

    /// Log the end-of-run summary
    pub fn log(&self, source: &str) {
        info!(
            "{}: {} records, {} loaded, {} skipped in {}",
            source,
            self.total,
            self.loaded,
            self.skipped_count(),
            format_duration(Duration::from_secs_f64(self.elapsed_seconds))
        );
        info!(
            "{}: artists/albums resolved from cache {}, from storage {}, created {}, conflicts recovered {}",
            source,
            self.resolver.cache_hits,
            self.resolver.storage_hits,
            self.resolver.created,
            self.resolver.conflicts_recovered
        );
        for (kind, count) in &self.skipped_by_kind {
            warn!("{}: {} records skipped ({:?})", source, count, kind);
        }
        for skip in &self.skipped {
            warn!("{}: line {} skipped: {}", source, skip.line, skip.reason);
        }
        if self.cancelled {
            warn!("{}: load cancelled before end of input", source);
        }
    }
}

/// Per-input summary as written by `--stats-json`.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub input: String,
    pub aborted: bool,
    /// Why the input could not be loaded at all
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub summary: LoadSummary,
}

impl SessionSummary {
    pub fn completed(input: String, summary: LoadSummary) -> Self {
        Self {
            input,
            aborted: false,
            error: None,
            summary,
        }
    }

    /// A session cut short after `summary` was collected.
    pub fn aborted(input: String, summary: LoadSummary) -> Self {
        Self {
            aborted: true,
            ..Self::completed(input, summary)
        }
    }

    /// An input that failed before any record was attempted (unreadable file).
    pub fn failed(input: String, error: &anyhow::Error) -> Self {
        Self {
            error: Some(format!("{:#}", error)),
            ..Self::aborted(input, LoadSummary::default())
        }
    }
}

/// Everything `--stats-json` records for one invocation.
#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    pub sessions: Vec<SessionSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletions: Option<DeletionReport>,
}

impl RunReport {
    /// Write the report to a JSON file
    pub fn write_to_file(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
