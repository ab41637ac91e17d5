//! Raw and normalized input record types
//!
//! The io layer produces [`RawRow`]s; the normalizer turns them into
//! typed [`Payment`] and [`Booking`] records or [`RejectedRow`]s.

use std::collections::HashMap;
use std::fmt;

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;

/// Which input file a row came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SourceKind {
    Members,
    Payments,
    Bookings,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Members => write!(f, "members"),
            SourceKind::Payments => write!(f, "payments"),
            SourceKind::Bookings => write!(f, "bookings"),
        }
    }
}

/// An untyped CSV row, keyed by header name
///
/// Line numbers are 1-based and count the header, matching what an
/// operator sees when they open the file in an editor.
#[derive(Debug, Clone)]
pub struct RawRow {
    pub line: u64,
    pub fields: HashMap<String, String>,
}

impl RawRow {
    /// Fetch a field by column name, trimmed; empty cells read as `None`
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .get(column)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// A row the normalizer could not turn into a typed record
///
/// Rejections never abort a run; they are carried through to the report
/// so the operator can fix the source data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRow {
    pub source: SourceKind,
    pub line: u64,
    pub reason: String,
}

/// Inclusive date range a payment claims to cover
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeePeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl FeePeriod {
    pub fn len_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

/// Normalized payment record
#[derive(Debug, Clone)]
pub struct Payment {
    /// Source line, for evidence in the report
    pub line: u64,
    /// Declared member id, if the payments export carried one
    pub member_id: Option<String>,
    /// Payer name as entered
    pub name: Option<String>,
    /// Contact (e-mail), normalized
    pub contact: Option<String>,
    pub amount: Decimal,
    pub date: NaiveDate,
    /// Fee period the payment claims to cover
    pub period: FeePeriod,
}

/// Normalized booking record
#[derive(Debug, Clone)]
pub struct Booking {
    pub line: u64,
    /// Booking reference from the source system, if present
    pub booking_id: Option<String>,
    pub member_id: Option<String>,
    pub name: Option<String>,
    pub contact: Option<String>,
    pub facility: Option<String>,
    pub date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub duration_minutes: i64,
}
