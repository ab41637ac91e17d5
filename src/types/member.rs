//! Member-related types for the reconciliation engine
//!
//! A member is the anchor entity of a reconciliation run: payments and
//! bookings are resolved onto members, and classification happens per member.

use chrono::NaiveDate;

/// Stable member identity key
///
/// Comes from the membership source (e.g. a student or customer number).
/// Treated as an opaque string; comparisons are exact.
pub type MemberId = String;

/// Declared membership status from the membership source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipStatus {
    Active,
    Expired,
    Unknown,
}

impl MembershipStatus {
    /// Parse a raw status cell. Unrecognized values map to `Unknown`
    /// rather than rejecting the row; status is advisory, the validity
    /// intervals are authoritative.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "active" => MembershipStatus::Active,
            "expired" => MembershipStatus::Expired,
            _ => MembershipStatus::Unknown,
        }
    }
}

/// A single validity interval of a membership, inclusive on both ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MembershipInterval {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl MembershipInterval {
    /// Whether `date` falls inside this interval (inclusive)
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Whether this interval overlaps another (inclusive bounds)
    pub fn overlaps(&self, other: &MembershipInterval) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Number of days (inclusive) shared with the given date range,
    /// zero when disjoint
    pub fn overlap_days(&self, start: NaiveDate, end: NaiveDate) -> i64 {
        let lo = self.start.max(start);
        let hi = self.end.min(end);
        if lo > hi {
            0
        } else {
            (hi - lo).num_days() + 1
        }
    }

    /// Total length of the interval in days (inclusive)
    pub fn len_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

/// Canonical member record produced by the normalizer
///
/// Immutable once loaded for a run. Intervals are sorted chronologically
/// and non-overlapping; the normalizer enforces this and the engine
/// re-checks it as a precondition.
#[derive(Debug, Clone)]
pub struct Member {
    /// Stable identity key, deduplicated across input rows
    pub id: MemberId,

    /// Display name as it appeared in the membership source
    pub display_name: String,

    /// Normalized composite join key (lower-cased name + contact),
    /// `None` when the source row had no usable name
    pub composite_key: Option<String>,

    /// Normalized contact field (e-mail), used for composite matching
    pub contact: Option<String>,

    /// Membership tier, drives the expected-fee lookup
    pub tier: Option<String>,

    pub status: MembershipStatus,

    /// Ordered, non-overlapping validity intervals
    pub intervals: Vec<MembershipInterval>,
}

/// Normalize a display name for matching: lower-case, trim, collapse
/// internal whitespace to single spaces.
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalize a contact field (e-mail address) for matching
pub fn normalize_contact(contact: &str) -> String {
    contact.trim().to_lowercase()
}

/// Build the composite join key from a raw name and optional contact.
///
/// Returns `None` when the name normalizes to the empty string, since a
/// record without a usable name can never match on the composite tier.
pub fn composite_key(name: &str, contact: Option<&str>) -> Option<String> {
    let name = normalize_name(name);
    if name.is_empty() {
        return None;
    }
    match contact {
        Some(c) if !c.trim().is_empty() => Some(format!("{}|{}", name, normalize_contact(c))),
        _ => Some(name),
    }
}
