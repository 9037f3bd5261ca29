//! Delimited text input.
//!
//! The first line is a header and is skipped. Fields are split on a single
//! delimiter character with no quoting rules, matching the exports this tool
//! reads. Blank lines are ignored.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::debug;

use crate::models::RawRecord;

pub const DEFAULT_DELIMITER: char = ',';

pub fn read_records(path: &Path, delimiter: char) -> Result<Vec<RawRecord>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open input file {}", path.display()))?;
    parse_records(BufReader::new(file), delimiter)
        .with_context(|| format!("Failed to read input file {}", path.display()))
}

pub fn parse_records<R: BufRead>(reader: R, delimiter: char) -> std::io::Result<Vec<RawRecord>> {
    let mut records = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line_number = index + 1;
        if index == 0 {
            debug!(header = %line, "skipping header");
            continue;
        }

        let line = line.strip_suffix('\r').unwrap_or(&line);
        if line.trim().is_empty() {
            continue;
        }

        records.push(RawRecord {
            line: line_number,
            fields: line.split(delimiter).map(str::to_string).collect(),
        });
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_header_skipped_and_lines_numbered() {
        let input = "id,song,genre,artist,album,duration,date\n\
                     1,S1,Rock,ArtistA,AlbumX,3:45,01/01/2020\n\
                     2,S2,Rock,ArtistA,AlbumX,4:10,02/01/2020\n";
        let records = parse_records(Cursor::new(input), ',').unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].line, 2);
        assert_eq!(records[0].fields[1], "S1");
        assert_eq!(records[1].line, 3);
        assert_eq!(records[1].fields.len(), 7);
    }

    #[test]
    fn test_crlf_and_blank_lines() {
        let input = "header\r\n1,S1,Rock\r\n\r\n   \n3,S3,Jazz\r\n";
        let records = parse_records(Cursor::new(input), ',').unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].fields, vec!["1", "S1", "Rock"]);
        assert_eq!(records[1].line, 5);
        assert_eq!(records[1].fields[2], "Jazz");
    }

    #[test]
    fn test_custom_delimiter_keeps_empty_fields() {
        let records = parse_records(Cursor::new("h\n1;;Rock;\n"), ';').unwrap();
        assert_eq!(records[0].fields, vec!["1", "", "Rock", ""]);
    }

    #[test]
    fn test_header_only() {
        assert!(parse_records(Cursor::new("id,song\n"), ',').unwrap().is_empty());
        assert!(parse_records(Cursor::new(""), ',').unwrap().is_empty());
    }

    #[test]
    fn test_read_records_missing_file() {
        let err = read_records(Path::new("/nonexistent/catalog.csv"), ',').unwrap_err();
        assert!(err.to_string().contains("Failed to open input file"));
    }
}
