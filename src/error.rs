//! Error taxonomy for loading and resolution.
//!
//! Per-record errors are recovered at the loader boundary; only
//! [`StoreError::Unavailable`] aborts a run.

use rusqlite::ErrorCode;
use thiserror::Error;

use crate::models::{ArtistId, EntityKind, LoadSummary, SkipKind};

/// Release date did not match the dd/mm/yyyy source format.
#[derive(Debug, Error)]
#[error("release date '{value}' is not a dd/mm/yyyy date: {source}")]
pub struct DateParseError {
    pub value: String,
    pub source: chrono::ParseError,
}

#[derive(Debug, Error)]
pub enum MalformedRecordError {
    #[error("missing field '{field}' at position {position}")]
    MissingField {
        field: &'static str,
        position: usize,
    },

    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("field '{field}' is blank")]
    BlankField { field: &'static str },

    #[error("invalid duration '{value}', expected m:ss or mm:ss")]
    InvalidDuration { value: String },

    #[error(transparent)]
    ReleaseDate(#[from] DateParseError),
}

/// Failure reported by the storage collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Connection-level failure: the database cannot be reached or written.
    #[error("storage unavailable: {0}")]
    Unavailable(#[source] rusqlite::Error),

    /// A foreign key blocked the statement.
    #[error("integrity conflict: {0}")]
    IntegrityConflict(#[source] rusqlite::Error),

    #[error("storage query failed: {0}")]
    Query(#[source] rusqlite::Error),
}

impl StoreError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(
                ErrorCode::CannotOpen
                | ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::SystemIoFailure
                | ErrorCode::DiskFull
                | ErrorCode::DatabaseCorrupt
                | ErrorCode::NotADatabase
                | ErrorCode::ReadOnly
                | ErrorCode::PermissionDenied
                | ErrorCode::OutOfMemory,
            ) => StoreError::Unavailable(err),
            Some(ErrorCode::ConstraintViolation) if is_foreign_key_violation(&err) => {
                StoreError::IntegrityConflict(err)
            }
            _ => StoreError::Query(err),
        }
    }
}

pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    extended_code(err) == Some(rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE)
}

pub(crate) fn is_foreign_key_violation(err: &rusqlite::Error) -> bool {
    extended_code(err) == Some(rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY)
}

fn extended_code(err: &rusqlite::Error) -> Option<std::os::raw::c_int> {
    err.sqlite_error().map(|e| e.extended_code)
}

/// A name could not be mapped to an identifier.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("artist '{name}' could not be created or re-read after {attempts} attempts")]
    ArtistUnresolved { name: String, attempts: usize },

    #[error("album '{name}' of {artist} could not be created or re-read after {attempts} attempts")]
    AlbumUnresolved {
        name: String,
        artist: ArtistId,
        attempts: usize,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Deletion refused because dependent rows still reference the entity.
#[derive(Debug, Error)]
#[error("cannot delete {entity} {id}: still referenced ({message})")]
pub struct IntegrityConflict {
    pub entity: EntityKind,
    pub id: i64,
    pub message: String,
}

/// Everything that can go wrong with a single input record.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error(transparent)]
    Malformed(#[from] MalformedRecordError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("song insert failed: {0}")]
    Persistence(#[from] StoreError),
}

impl RecordError {
    pub fn kind(&self) -> SkipKind {
        match self {
            RecordError::Malformed(MalformedRecordError::ReleaseDate(_)) => SkipKind::DateParse,
            RecordError::Malformed(_) => SkipKind::Malformed,
            RecordError::Resolution(_) => SkipKind::Resolution,
            RecordError::Persistence(_) => SkipKind::Persistence,
        }
    }

    pub fn is_fatal(&self) -> bool {
        match self {
            RecordError::Resolution(ResolutionError::Store(e)) | RecordError::Persistence(e) => {
                e.is_unavailable()
            }
            _ => false,
        }
    }

    /// Split off a connection-level failure; any other error is handed back.
    pub fn into_unavailable(self) -> Result<StoreError, RecordError> {
        if !self.is_fatal() {
            return Err(self);
        }
        match self {
            RecordError::Resolution(ResolutionError::Store(e)) | RecordError::Persistence(e) => {
                Ok(e)
            }
            other => Err(other),
        }
    }
}

/// A load run that could not continue.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("storage unavailable after {} records loaded: {source}", .summary.loaded)]
    StorageUnavailable {
        summary: Box<LoadSummary>,
        source: StoreError,
    },
}

impl LoadError {
    /// Partial summary of the records processed before the failure.
    pub fn summary(&self) -> &LoadSummary {
        match self {
            LoadError::StorageUnavailable { summary, .. } => summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::ffi;

    fn sqlite_error(code: std::os::raw::c_int) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(ffi::Error::new(code), None)
    }

    #[test]
    fn test_classifies_connection_failures_as_unavailable() {
        assert!(StoreError::from(sqlite_error(ffi::SQLITE_IOERR)).is_unavailable());
        assert!(StoreError::from(sqlite_error(ffi::SQLITE_BUSY)).is_unavailable());
        assert!(StoreError::from(sqlite_error(ffi::SQLITE_CANTOPEN)).is_unavailable());
    }

    #[test]
    fn test_classifies_foreign_key_as_integrity_conflict() {
        let err = StoreError::from(sqlite_error(ffi::SQLITE_CONSTRAINT_FOREIGNKEY));
        assert!(matches!(err, StoreError::IntegrityConflict(_)));

        let err = StoreError::from(sqlite_error(ffi::SQLITE_CONSTRAINT_NOTNULL));
        assert!(matches!(err, StoreError::Query(_)));
    }

    #[test]
    fn test_unique_violation_detection() {
        assert!(is_unique_violation(&sqlite_error(ffi::SQLITE_CONSTRAINT_UNIQUE)));
        assert!(!is_unique_violation(&sqlite_error(ffi::SQLITE_CONSTRAINT_FOREIGNKEY)));
        assert!(!is_unique_violation(&rusqlite::Error::QueryReturnedNoRows));
    }

    #[test]
    fn test_record_error_kind_and_fatality() {
        let date = chrono::NaiveDate::parse_from_str("nope", "%d/%m/%Y").unwrap_err();
        let err = RecordError::from(MalformedRecordError::from(DateParseError {
            value: "nope".to_string(),
            source: date,
        }));
        assert_eq!(err.kind(), SkipKind::DateParse);
        assert!(!err.is_fatal());

        let err = RecordError::from(MalformedRecordError::BlankField { field: "genre" });
        assert_eq!(err.kind(), SkipKind::Malformed);

        let err = RecordError::from(ResolutionError::from(StoreError::from(sqlite_error(
            ffi::SQLITE_IOERR,
        ))));
        assert_eq!(err.kind(), SkipKind::Resolution);
        assert!(err.is_fatal());
        assert!(err.into_unavailable().is_ok());

        let err = RecordError::from(StoreError::from(sqlite_error(
            ffi::SQLITE_CONSTRAINT_NOTNULL,
        )));
        assert_eq!(err.kind(), SkipKind::Persistence);
        assert!(err.into_unavailable().is_err());
    }
}
