//! Loading participant tables from disk.
//!
//! The input is whitespace-delimited text: one header line (ignored), then
//! one participant per line in the column order given by
//! [`COLUMNS`](crate::record::COLUMNS). A final record cut short by the
//! end of the file is dropped silently, with or without a trailing newline;
//! every other malformed line is a recovered
//! [`ParseError`](crate::record::ParseError).

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::record::{LoadOutcome, RecordStore, FIELD_COUNT};

/// Fatal input errors.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("input file not found or unreadable: {}", path.display())]
    FileNotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Anything that can produce a [`RecordStore`] from a path.
pub trait DataSource {
    fn read_all(&self, path: &Path) -> Result<LoadOutcome, SourceError>;
}

/// Reads the participant table from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSource;

impl DataSource for FileSource {
    fn read_all(&self, path: &Path) -> Result<LoadOutcome, SourceError> {
        info!(path = %path.display(), "reading input data");
        let text = std::fs::read_to_string(path).map_err(|source| SourceError::FileNotFound {
            path: path.to_path_buf(),
            source,
        })?;

        let loaded = parse_table(&text);
        info!(
            records = loaded.store.count(),
            skipped = loaded.skipped,
            "transferred input rows into analysable format"
        );
        Ok(loaded)
    }
}

/// Parses a whole table (header included) held in memory.
pub fn parse_table(text: &str) -> LoadOutcome {
    let mut lines: Vec<&str> = text.lines().skip(1).collect();

    // EOF in the middle of a record: the last non-blank line has too few
    // columns. Trailing blank lines do not matter.
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }
    if let Some(last) = lines.last() {
        if last.split_whitespace().count() < FIELD_COUNT {
            debug!(line = %last, "dropping truncated trailing line");
            lines.pop();
        }
    }

    RecordStore::load(lines)
}
