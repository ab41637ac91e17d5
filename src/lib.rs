//! Membership Reconciliation Library
//! # Overview
//!
//! This library reconciles three CSV extracts (members, payments,
//! bookings) into a deterministic plain-text discrepancy report, with
//! both a sequential and a concurrent pipeline implementation.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (Member, Payment, Booking, outcomes, errors)
//! - [`cli`] - CLI argument parsing
//! - [`config`] - Run configuration (fees, tolerance, date formats, period)
//! - [`core`] - Business logic components:
//!   - [`core::normalizer`] - Raw-row validation and typed record construction
//!   - [`core::resolver`] - Deterministic identity resolution (id, composite key, fuzzy)
//!   - [`core::engine`] - Per-member reconciliation and classification
//!   - [`core::fees`] - Expected-fee policies (pro-rata, flat)
//! - [`io`] - Header-addressed CSV reading, sync and async
//! - [`report`] - Deterministic report rendering
//! - [`strategy`] - Pipeline strategies tying the pieces together
//!
//! # Outcome Categories
//!
//! Every member, unmatched payment, and unmatched booking receives
//! exactly one net category:
//!
//! - **CLEAN**: All expected fees covered, no invalid bookings
//! - **UNPAID_FEE**: A membership interval's fee falls short beyond tolerance
//! - **BOOKING_WITHOUT_VALID_MEMBERSHIP**: A booking outside every interval
//! - **PAID_NO_USAGE**: Payments received but no bookings made
//! - **ORPHAN_PAYMENT** / **ORPHAN_BOOKING**: No member could be matched
//! - **AMBIGUOUS_MATCH**: More than one member matched equally well
//!
//! # Determinism
//!
//! Given the same inputs and configuration, both strategies produce
//! byte-identical reports: members are ordered by id, orphans by input
//! position, and rejected rows by source and line.

// Module declarations
pub mod cli;
pub mod config;
pub mod core;
pub mod io;
pub mod report;
pub mod strategy;
pub mod types;

pub use config::ReconConfig;
pub use core::{
    AsyncReconEngine, IdentityResolver, Normalizer, PartitionConfig, ReconciliationEngine,
};
pub use report::{ReportBuilder, RunTotals};
pub use types::{
    Booking, DiscrepancyFlag, Member, MemberId, OutcomeCategory, Payment, ReconError,
    ReconciliationResult, RejectedRow,
};
