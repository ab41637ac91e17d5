//! Asynchronous CSV reader with batch interface
//!
//! Streams untyped rows from one input file using csv-async. Supports
//! batch reading so the async strategy can interleave file I/O for the
//! three inputs.
//!
//! # Architecture
//!
//! ```text
//! AsyncRead → AsyncReader → batches of Result<RawRow, String>
//!                  ↓
//!           csv_format module
//!           (validate_headers, row_from_record)
//! ```

use csv_async::AsyncReaderBuilder;
use futures::io::AsyncRead;

use crate::io::csv_format::{row_from_record, validate_headers};
use crate::types::{RawRow, ReconError, SourceKind};

/// Asynchronous CSV reader for one input file
///
/// Same row semantics as the synchronous reader: header validated at
/// open, structural errors yielded as `Err` items with the file line.
pub struct AsyncReader<R: AsyncRead + Unpin + Send> {
    reader: csv_async::AsyncReader<R>,
    headers: csv::StringRecord,
    /// 1-based file line of the last row handed out; header is line 1
    line: u64,
}

impl<R: AsyncRead + Unpin + Send> AsyncReader<R> {
    /// Wrap an async reader and validate the header
    ///
    /// # Errors
    ///
    /// Fails when the header cannot be read or lacks a required column
    /// for `kind`.
    pub async fn new(reader: R, kind: SourceKind) -> Result<Self, ReconError> {
        let mut csv_reader = AsyncReaderBuilder::new()
            .trim(csv_async::Trim::All)
            .flexible(true)
            .create_reader(reader);

        let headers = csv_reader
            .headers()
            .await
            .map_err(|e| ReconError::ParseError {
                line: Some(1),
                message: e.to_string(),
            })?
            .clone();
        let headers = to_sync_record(&headers);
        validate_headers(kind, &headers)?;

        Ok(Self {
            reader: csv_reader,
            headers,
            line: 1,
        })
    }

    /// Read up to `batch_size` rows
    ///
    /// Returns an empty vector at end of file. Structural errors occupy
    /// a slot in the batch so no line number is lost.
    pub async fn read_batch(&mut self, batch_size: usize) -> Vec<Result<RawRow, ReconError>> {
        let mut batch = Vec::with_capacity(batch_size);
        let mut record = csv_async::StringRecord::new();

        while batch.len() < batch_size {
            match self.reader.read_record(&mut record).await {
                Ok(true) => {
                    self.line += 1;
                    batch.push(Ok(row_from_record(
                        &self.headers,
                        &to_sync_record(&record),
                        self.line,
                    )));
                }
                Ok(false) => break,
                Err(e) => {
                    self.line += 1;
                    batch.push(Err(ReconError::ParseError {
                        line: Some(self.line),
                        message: e.to_string(),
                    }));
                }
            }
        }

        batch
    }
}

fn to_sync_record(record: &csv_async::StringRecord) -> csv::StringRecord {
    csv::StringRecord::from(record.iter().collect::<Vec<_>>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::io::Cursor;

    const PAYMENTS_HEADER: &str =
        "member_id,full_name,email,amount,payment_date,period_start,period_end\n";

    #[tokio::test]
    async fn reads_rows_in_batches() {
        let content = format!(
            "{}M-1,Alice Smith,,120.00,2024-01-05,2024-01-01,2024-12-31\n\
             M-2,Bob Jones,,60.00,2024-02-01,2024-01-01,2024-06-30\n\
             M-3,Carol White,,120.00,2024-03-01,2024-01-01,2024-12-31\n",
            PAYMENTS_HEADER
        );
        let mut reader = AsyncReader::new(Cursor::new(content.into_bytes()), SourceKind::Payments)
            .await
            .unwrap();

        let batch = reader.read_batch(2).await;
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].as_ref().unwrap().line, 2);
        assert_eq!(batch[0].as_ref().unwrap().get("member_id"), Some("M-1"));
        assert_eq!(batch[1].as_ref().unwrap().line, 3);

        let batch = reader.read_batch(2).await;
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].as_ref().unwrap().get("member_id"), Some("M-3"));

        assert!(reader.read_batch(2).await.is_empty());
    }

    #[tokio::test]
    async fn empty_file_after_header() {
        let mut reader = AsyncReader::new(
            Cursor::new(PAYMENTS_HEADER.as_bytes().to_vec()),
            SourceKind::Payments,
        )
        .await
        .unwrap();
        assert!(reader.read_batch(10).await.is_empty());
    }

    #[tokio::test]
    async fn missing_column_fails_at_open() {
        let content = "member_id,amount\nM-1,120.00\n";
        let err = AsyncReader::new(Cursor::new(content.as_bytes().to_vec()), SourceKind::Payments)
            .await
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(err, ReconError::MissingColumn { .. }));
    }

    #[tokio::test]
    async fn whitespace_is_trimmed() {
        let content = format!(
            "{}  M-1  ,  Alice Smith  ,, 120.00 ,2024-01-05,2024-01-01,2024-12-31\n",
            PAYMENTS_HEADER
        );
        let mut reader = AsyncReader::new(Cursor::new(content.into_bytes()), SourceKind::Payments)
            .await
            .unwrap();
        let batch = reader.read_batch(10).await;
        let row = batch[0].as_ref().unwrap();
        assert_eq!(row.get("member_id"), Some("M-1"));
        assert_eq!(row.get("full_name"), Some("Alice Smith"));
    }
}
