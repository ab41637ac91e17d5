//! Classification outcomes produced by the reconciliation engine
//!
//! Every member and every unresolved record ends a run with exactly one
//! [`OutcomeCategory`], backed by zero or more [`DiscrepancyFlag`]s that
//! carry the evidence the report prints.

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::member::{MemberId, MembershipInterval};

/// Final category assigned to a reconciliation subject
///
/// For members with multiple flags the net category follows a fixed
/// severity order: unpaid fees dominate invalid-membership bookings,
/// which dominate paid-but-unused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum OutcomeCategory {
    Clean,
    UnpaidFee,
    BookingWithoutValidMembership,
    PaidNoUsage,
    OrphanPayment,
    OrphanBooking,
    AmbiguousMatch,
}

impl fmt::Display for OutcomeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutcomeCategory::Clean => "CLEAN",
            OutcomeCategory::UnpaidFee => "UNPAID_FEE",
            OutcomeCategory::BookingWithoutValidMembership => {
                "BOOKING_WITHOUT_VALID_MEMBERSHIP"
            }
            OutcomeCategory::PaidNoUsage => "PAID_NO_USAGE",
            OutcomeCategory::OrphanPayment => "ORPHAN_PAYMENT",
            OutcomeCategory::OrphanBooking => "ORPHAN_BOOKING",
            OutcomeCategory::AmbiguousMatch => "AMBIGUOUS_MATCH",
        };
        write!(f, "{}", s)
    }
}

/// Payment evidence attached to a flag, trimmed to what the report shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentEvidence {
    pub line: u64,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub entered_name: Option<String>,
}

/// Booking evidence attached to a flag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingEvidence {
    pub line: u64,
    pub booking_id: Option<String>,
    pub facility: Option<String>,
    pub date: NaiveDate,
    pub entered_name: Option<String>,
}

/// A single observed discrepancy with its supporting evidence
#[derive(Debug, Clone, PartialEq)]
pub enum DiscrepancyFlag {
    /// Attributed payments for an interval fall short of the expected fee
    /// by more than the tolerance
    UnpaidFee {
        interval: MembershipInterval,
        expected: Decimal,
        attributed: Decimal,
        shortfall: Decimal,
        payments: Vec<PaymentEvidence>,
    },
    /// A booking dated outside every validity interval of its member
    BookingWithoutValidMembership {
        booking: BookingEvidence,
        /// Closest interval boundary, printed as context for the operator
        nearest_boundary: Option<NaiveDate>,
    },
    /// Member fully paid but recorded no bookings in the analysis window
    PaidNoUsage,
    /// Payment that resolved to no member
    OrphanPayment { payment: PaymentEvidence },
    /// Booking that resolved to no member
    OrphanBooking { booking: BookingEvidence },
    /// Record whose identity matched several members equally well
    AmbiguousMatch {
        entered_name: Option<String>,
        candidates: Vec<MemberId>,
    },
}

impl DiscrepancyFlag {
    /// Category this flag implies in isolation
    pub fn category(&self) -> OutcomeCategory {
        match self {
            DiscrepancyFlag::UnpaidFee { .. } => OutcomeCategory::UnpaidFee,
            DiscrepancyFlag::BookingWithoutValidMembership { .. } => {
                OutcomeCategory::BookingWithoutValidMembership
            }
            DiscrepancyFlag::PaidNoUsage => OutcomeCategory::PaidNoUsage,
            DiscrepancyFlag::OrphanPayment { .. } => OutcomeCategory::OrphanPayment,
            DiscrepancyFlag::OrphanBooking { .. } => OutcomeCategory::OrphanBooking,
            DiscrepancyFlag::AmbiguousMatch { .. } => OutcomeCategory::AmbiguousMatch,
        }
    }
}

/// Paid standing of a member across all intervals, for the revenue summary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaidState {
    Paid,
    Underpaid,
    Unpaid,
}

impl fmt::Display for PaidState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaidState::Paid => write!(f, "paid"),
            PaidState::Underpaid => write!(f, "underpaid"),
            PaidState::Unpaid => write!(f, "unpaid"),
        }
    }
}

/// What a reconciliation result is about
#[derive(Debug, Clone, PartialEq)]
pub enum ReconSubject {
    Member { id: MemberId, name: String },
    Payment(PaymentEvidence),
    Booking(BookingEvidence),
}

/// One classified subject: a member, or a record that never reached one
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciliationResult {
    pub subject: ReconSubject,
    pub category: OutcomeCategory,
    pub flags: Vec<DiscrepancyFlag>,
    /// Total expected fee across intervals (members only, zero otherwise)
    pub expected: Decimal,
    /// Total payments attributed to the member's intervals
    pub collected: Decimal,
    /// Paid standing; `None` for non-member subjects
    pub paid_state: Option<PaidState>,
}

impl ReconciliationResult {
    /// Net category for a member given its flags, applying the severity
    /// order UnpaidFee > BookingWithoutValidMembership > PaidNoUsage.
    pub fn net_member_category(flags: &[DiscrepancyFlag]) -> OutcomeCategory {
        let mut net = OutcomeCategory::Clean;
        for flag in flags {
            let cat = flag.category();
            net = match (net, cat) {
                (OutcomeCategory::Clean, c) => c,
                (OutcomeCategory::UnpaidFee, _) | (_, OutcomeCategory::UnpaidFee) => {
                    OutcomeCategory::UnpaidFee
                }
                (OutcomeCategory::BookingWithoutValidMembership, _)
                | (_, OutcomeCategory::BookingWithoutValidMembership) => {
                    OutcomeCategory::BookingWithoutValidMembership
                }
                (current, _) => current,
            };
        }
        net
    }
}
