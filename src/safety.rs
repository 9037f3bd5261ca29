//! Safety checks run before the catalog database is opened.
//!
//! Opening a path with create/write flags turns any file into a SQLite
//! database, so a mistyped argument could clobber one of the inputs.

use anyhow::{bail, Result};
use std::path::Path;

/// Extensions that belong to delimited input, never to the database.
const INPUT_EXTENSIONS: [&str; 3] = ["csv", "tsv", "txt"];

/// Validates that `database` is safe to open for writing.
///
/// Checks:
/// - The database cannot be one of the input files
/// - The database cannot carry an input file extension
pub fn validate_database_path(database: &Path, inputs: &[&Path]) -> Result<()> {
    for input in inputs {
        if database == *input {
            bail!(
                "Safety check failed: database '{}' cannot be the same as input '{}'",
                database.display(),
                input.display()
            );
        }
    }

    let extension = database
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    if let Some(ext) = extension {
        if INPUT_EXTENSIONS.contains(&ext.as_str()) {
            bail!(
                "Safety check failed: database '{}' looks like an input file (.{})",
                database.display(),
                ext
            );
        }
    }

    Ok(())
}
