//! Synchronous CSV reader with iterator interface
//!
//! Streams untyped rows from one input file. Delegates format concerns
//! to the csv_format module.
//!
//! # Design
//!
//! The reader validates the header once at open time, then yields
//! `Result<RawRow, String>` per data row. Structural CSV errors become
//! `Err` items with the file line in the message so the caller can
//! record them as rejected rows and keep going. Memory usage is O(1)
//! per record, not O(file size).

use std::fs::File;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};

use crate::io::csv_format::{row_from_record, validate_headers};
use crate::types::{RawRow, ReconError, SourceKind};

/// Synchronous CSV reader for one input file
///
/// # Examples
///
/// ```no_run
/// use membership_recon::io::sync_reader::SyncReader;
/// use membership_recon::types::SourceKind;
/// use std::path::Path;
///
/// let reader = SyncReader::new(Path::new("members.csv"), SourceKind::Members).unwrap();
/// let rows: Vec<_> = reader.filter_map(Result::ok).collect();
/// println!("read {} rows", rows.len());
/// ```
pub struct SyncReader {
    reader: csv::Reader<File>,
    headers: StringRecord,
    /// 1-based file line of the last row handed out; header is line 1
    line: u64,
}

impl SyncReader {
    /// Open an input file and validate its header
    ///
    /// The CSV reader trims whitespace and tolerates ragged rows;
    /// missing trailing cells read as absent fields.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be opened, has no readable header,
    /// or the header lacks a required column for `kind`.
    pub fn new(path: &Path, kind: SourceKind) -> Result<Self, ReconError> {
        let file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                ReconError::file_not_found(&path.display().to_string())
            }
            _ => ReconError::from(e),
        })?;

        let mut reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .buffer_capacity(8 * 1024)
            .from_reader(file);

        let headers = reader.headers()?.clone();
        validate_headers(kind, &headers)?;

        Ok(Self {
            reader,
            headers,
            line: 1,
        })
    }
}

impl Iterator for SyncReader {
    type Item = Result<RawRow, ReconError>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut record = StringRecord::new();
        match self.reader.read_record(&mut record) {
            Ok(true) => {
                self.line += 1;
                Some(Ok(row_from_record(&self.headers, &record, self.line)))
            }
            Ok(false) => None,
            Err(e) => {
                self.line += 1;
                Some(Err(ReconError::ParseError {
                    line: Some(self.line),
                    message: e.to_string(),
                }))
            }
        }
    }
}
