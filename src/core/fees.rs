//! Expected-fee policies
//!
//! The engine asks a [`FeePolicy`] what a membership interval should
//! have cost. The policy is injected so deployments with different fee
//! models (flat per interval, pro-rated annual) plug in without
//! touching the engine.

use rust_decimal::Decimal;

use crate::config::FeeTable;
use crate::types::{Member, MembershipInterval};

/// Computes the expected fee for one validity interval of a member
pub trait FeePolicy: Send + Sync {
    fn expected_fee(&self, member: &Member, interval: &MembershipInterval) -> Decimal;
}

/// Annual tier rate pro-rated by interval length
///
/// A full-year interval owes the full annual rate; shorter intervals
/// owe `rate * days / 365`, rounded to cents.
pub struct ProRataAnnualPolicy {
    table: FeeTable,
}

impl ProRataAnnualPolicy {
    pub fn new(table: FeeTable) -> Self {
        ProRataAnnualPolicy { table }
    }
}

impl FeePolicy for ProRataAnnualPolicy {
    fn expected_fee(&self, member: &Member, interval: &MembershipInterval) -> Decimal {
        let rate = self.table.rate_for(member.tier.as_deref());
        let days = Decimal::from(interval.len_days().min(365));
        (rate * days / Decimal::from(365)).round_dp(2)
    }
}

/// Flat tier rate per interval, regardless of length
pub struct FlatRatePolicy {
    table: FeeTable,
}

impl FlatRatePolicy {
    pub fn new(table: FeeTable) -> Self {
        FlatRatePolicy { table }
    }
}

impl FeePolicy for FlatRatePolicy {
    fn expected_fee(&self, member: &Member, _interval: &MembershipInterval) -> Decimal {
        self.table.rate_for(member.tier.as_deref())
    }
}
