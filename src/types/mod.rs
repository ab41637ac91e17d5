//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `member`: Member and membership-interval types
//! - `records`: Raw and normalized input record types
//! - `outcome`: Classification outcomes and discrepancy flags
//! - `error`: Error types for the reconciliation engine

pub mod error;
pub mod member;
pub mod outcome;
pub mod records;

pub use error::ReconError;
pub use member::{Member, MemberId, MembershipInterval, MembershipStatus};
pub use outcome::{
    BookingEvidence, DiscrepancyFlag, OutcomeCategory, PaidState, PaymentEvidence, ReconSubject,
    ReconciliationResult,
};
pub use records::{Booking, FeePeriod, Payment, RawRow, RejectedRow, SourceKind};
