//! CSV format definitions for the three input files
//!
//! Input files are header-addressed: columns may appear in any order
//! and extra columns are ignored. This module owns the required-column
//! sets and the conversion from a raw `StringRecord` into a [`RawRow`].
//! Cell-level validation (dates, amounts, durations) lives in the
//! normalizer; here we only check that the header makes the file
//! readable at all.

use std::collections::HashMap;

use csv::StringRecord;

use crate::types::{RawRow, ReconError, SourceKind};

/// Columns a file's header must contain for the run to proceed
///
/// Identity columns (`member_id`, `full_name`) are deliberately absent
/// for payments and bookings: a row needs at least one of them, which
/// is a per-row concern, not a header concern.
pub fn required_columns(kind: SourceKind) -> &'static [&'static str] {
    match kind {
        SourceKind::Members => &["member_id", "full_name", "valid_from", "valid_to"],
        SourceKind::Payments => &["amount", "payment_date", "period_start", "period_end"],
        SourceKind::Bookings => &["date", "duration_minutes"],
    }
}

/// Check a header against the required columns for its file kind
///
/// # Errors
///
/// Returns [`ReconError::MissingColumn`] naming the first absent column.
pub fn validate_headers(kind: SourceKind, headers: &StringRecord) -> Result<(), ReconError> {
    for column in required_columns(kind) {
        if !headers.iter().any(|h| h.trim() == *column) {
            return Err(ReconError::missing_column(&kind.to_string(), column));
        }
    }
    Ok(())
}

/// Pair a data record with its header into an untyped row
///
/// `line` is the 1-based file line (header is line 1). Cells beyond the
/// header width are dropped; short records simply produce fewer fields.
pub fn row_from_record(headers: &StringRecord, record: &StringRecord, line: u64) -> RawRow {
    let fields: HashMap<String, String> = headers
        .iter()
        .zip(record.iter())
        .map(|(h, v)| (h.trim().to_string(), v.to_string()))
        .collect();
    RawRow { line, fields }
}
