//! Record normalization: raw delimited fields to a typed [`SongRecord`].
//!
//! Source layout is positional:
//! `[id, song_name, genre, artist_name, album_name, duration, release_date]`.
//! Position 0 is an id placeholder from the export and is ignored.
//!
//! Names are compared exactly everywhere downstream, so the only cleanup here
//! is trimming surrounding whitespace. A field that is empty after trimming is
//! rejected rather than stored as an empty name.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{DateParseError, MalformedRecordError};
use crate::models::{RawRecord, SongRecord};

// ============================================================================
// Field Layout
// ============================================================================

pub const FIELD_COUNT: usize = 7;

pub const SONG_NAME_FIELD: usize = 1;
pub const GENRE_FIELD: usize = 2;
pub const ARTIST_NAME_FIELD: usize = 3;
pub const ALBUM_NAME_FIELD: usize = 4;
pub const DURATION_FIELD: usize = 5;
pub const RELEASE_DATE_FIELD: usize = 6;

/// Day/month/year, e.g. "01/02/2020" is 1 February 2020.
pub const RELEASE_DATE_FORMAT: &str = "%d/%m/%Y";

// ============================================================================
// Patterns
// ============================================================================

/// "m:ss" or "mm:ss" in ASCII digits; never longer than the 5-character duration column.
pub static DURATION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{1,2}:[0-5][0-9]$").unwrap());

// ============================================================================
// Normalization
// ============================================================================

pub fn normalize_record(raw: &RawRecord) -> Result<SongRecord, MalformedRecordError> {
    let fields = &raw.fields;
    if fields.len() > FIELD_COUNT {
        return Err(MalformedRecordError::FieldCount {
            expected: FIELD_COUNT,
            found: fields.len(),
        });
    }

    let song_name = required_field(fields, SONG_NAME_FIELD, "song_name")?;
    let genre = required_field(fields, GENRE_FIELD, "genre")?;
    let artist_name = required_field(fields, ARTIST_NAME_FIELD, "artist_name")?;
    let album_name = required_field(fields, ALBUM_NAME_FIELD, "album_name")?;
    let duration = parse_duration(required_field(fields, DURATION_FIELD, "duration")?)?;
    let release_date =
        parse_release_date(required_field(fields, RELEASE_DATE_FIELD, "release_date")?)?;

    Ok(SongRecord {
        song_name: song_name.to_string(),
        genre: genre.to_string(),
        artist_name: artist_name.to_string(),
        album_name: album_name.to_string(),
        duration,
        release_date,
    })
}

fn required_field<'a>(
    fields: &'a [String],
    position: usize,
    field: &'static str,
) -> Result<&'a str, MalformedRecordError> {
    let value = fields
        .get(position)
        .ok_or(MalformedRecordError::MissingField { field, position })?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(MalformedRecordError::BlankField { field });
    }
    Ok(trimmed)
}

pub fn parse_duration(value: &str) -> Result<String, MalformedRecordError> {
    let value = value.trim();
    if DURATION_PATTERN.is_match(value) {
        Ok(value.to_string())
    } else {
        Err(MalformedRecordError::InvalidDuration {
            value: value.to_string(),
        })
    }
}

pub fn parse_release_date(value: &str) -> Result<NaiveDate, DateParseError> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, RELEASE_DATE_FORMAT).map_err(|source| DateParseError {
        value: value.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(fields: &[&str]) -> RawRecord {
        RawRecord::new(2, fields.iter().copied())
    }

    #[test]
    fn test_normalize_record_trims_fields() {
        let record = normalize_record(&raw(&[
            "17",
            "  Bohemian Rhapsody ",
            "Rock",
            " Queen",
            "A Night at the Opera  ",
            " 5:55 ",
            " 31/10/1975",
        ]))
        .unwrap();

        assert_eq!(record.song_name, "Bohemian Rhapsody");
        assert_eq!(record.genre, "Rock");
        assert_eq!(record.artist_name, "Queen");
        assert_eq!(record.album_name, "A Night at the Opera");
        assert_eq!(record.duration, "5:55");
        assert_eq!(
            record.release_date,
            NaiveDate::from_ymd_opt(1975, 10, 31).unwrap()
        );
    }

    #[test]
    fn test_id_placeholder_may_be_empty() {
        let record = normalize_record(&raw(&["", "S1", "Rock", "A", "X", "3:45", "01/01/2020"]));
        assert!(record.is_ok());
    }

    #[test]
    fn test_missing_field() {
        let err = normalize_record(&raw(&["1", "S1", "Rock", "ArtistA"])).unwrap_err();
        assert!(matches!(
            err,
            MalformedRecordError::MissingField {
                field: "album_name",
                position: 4
            }
        ));
    }

    #[test]
    fn test_too_many_fields() {
        let err = normalize_record(&raw(&[
            "1", "Hello", " Goodbye", "Rock", "A", "X", "3:45", "01/01/2020",
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            MalformedRecordError::FieldCount {
                expected: 7,
                found: 8
            }
        ));
    }

    #[test]
    fn test_blank_name_rejected() {
        let err =
            normalize_record(&raw(&["1", "S1", "Rock", "   ", "X", "3:45", "01/01/2020"]))
                .unwrap_err();
        assert!(matches!(
            err,
            MalformedRecordError::BlankField {
                field: "artist_name"
            }
        ));
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("3:45").unwrap(), "3:45");
        assert_eq!(parse_duration("12:05").unwrap(), "12:05");
        assert!(parse_duration("3:75").is_err());
        assert!(parse_duration("345").is_err());
        assert!(parse_duration("100:00").is_err());
        assert!(parse_duration("3:4").is_err());
    }

    #[test]
    fn test_parse_duration_rejects_non_ascii_digits() {
        assert!(parse_duration("٣:45").is_err());
        assert!(parse_duration("٣٣:45").is_err());
        assert!(parse_duration("3:٤٥").is_err());
    }

    #[test]
    fn test_parse_release_date_is_day_first() {
        assert_eq!(
            parse_release_date("02/01/2020").unwrap(),
            NaiveDate::from_ymd_opt(2020, 1, 2).unwrap()
        );
        assert!(parse_release_date("2020-01-02").is_err());
        assert!(parse_release_date("31/02/2020").is_err());
        assert!(parse_release_date("13/13/2020").is_err());
    }

    #[test]
    fn test_bad_date_is_distinguishable() {
        let err = normalize_record(&raw(&["1", "S1", "Rock", "A", "X", "3:45", "tomorrow"]))
            .unwrap_err();
        match err {
            MalformedRecordError::ReleaseDate(date) => assert_eq!(date.value, "tomorrow"),
            other => panic!("expected a release date error, got {other:?}"),
        }
    }
}
