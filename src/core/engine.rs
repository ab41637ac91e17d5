//! Reconciliation engine
//!
//! Takes normalized members, payments and bookings plus a
//! [`ResolutionPlan`] and classifies every subject into exactly one
//! outcome category. The engine is pure: it never touches the
//! filesystem and, given identical inputs, produces an identical
//! result vector.
//!
//! The engine enforces integration preconditions before classifying:
//! plan alignment with the record slices, unique member ids, and
//! sorted, non-overlapping intervals. A violation is a bug in the
//! caller and aborts the run with [`ReconError::Precondition`].

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::config::ReconConfig;
use crate::core::fees::{FeePolicy, ProRataAnnualPolicy};
use crate::core::resolver::{Resolution, ResolutionPlan};
use crate::types::{
    Booking, BookingEvidence, DiscrepancyFlag, Member, OutcomeCategory, PaidState, Payment,
    PaymentEvidence, ReconError, ReconSubject, ReconciliationResult,
};

/// Record indices assigned to one member by the resolution plan
#[derive(Debug, Default, Clone)]
pub(crate) struct MemberWork {
    pub payment_idx: Vec<usize>,
    pub booking_idx: Vec<usize>,
}

/// Classifies members and unresolved records under one configuration
pub struct ReconciliationEngine<'a> {
    config: &'a ReconConfig,
    fee_policy: Box<dyn FeePolicy>,
}

impl<'a> ReconciliationEngine<'a> {
    /// Create an engine with the default pro-rata annual fee policy
    pub fn new(config: &'a ReconConfig) -> Self {
        let policy = ProRataAnnualPolicy::new(config.fees.clone());
        Self::with_policy(config, Box::new(policy))
    }

    /// Create an engine with an injected fee policy
    pub fn with_policy(config: &'a ReconConfig, fee_policy: Box<dyn FeePolicy>) -> Self {
        ReconciliationEngine { config, fee_policy }
    }

    /// Classify every member and unresolved record
    ///
    /// Output order is deterministic: members sorted by id, then
    /// unresolved payments in input order, then unresolved bookings in
    /// input order.
    ///
    /// # Errors
    ///
    /// Returns [`ReconError::Precondition`] when the plan does not
    /// align with the record slices, a matched id is unknown, member
    /// ids repeat, or a member's intervals are unsorted or overlapping.
    pub fn reconcile(
        &self,
        members: &[Member],
        payments: &[Payment],
        bookings: &[Booking],
        plan: &ResolutionPlan,
    ) -> Result<Vec<ReconciliationResult>, ReconError> {
        check_preconditions(members, payments, bookings, plan)?;

        let (work, unresolved) = assign_by_member(members, payments, bookings, plan)?;

        let mut member_order: Vec<usize> = (0..members.len()).collect();
        member_order.sort_by(|&a, &b| members[a].id.cmp(&members[b].id));

        let mut results = Vec::with_capacity(members.len() + unresolved.len());
        for idx in member_order {
            let member = &members[idx];
            let member_payments: Vec<&Payment> =
                work[idx].payment_idx.iter().map(|&i| &payments[i]).collect();
            let member_bookings: Vec<&Booking> =
                work[idx].booking_idx.iter().map(|&i| &bookings[i]).collect();
            results.push(self.classify_member(member, &member_payments, &member_bookings));
        }
        results.extend(unresolved);
        Ok(results)
    }

    /// Classify a single member against the records resolved onto it
    ///
    /// Payments are split pro-rata across the member's intervals by
    /// overlap days between the payment's fee period and each interval.
    /// A payment whose fee period touches no interval still counts as
    /// collected revenue but offsets no interval's expected fee.
    pub(crate) fn classify_member(
        &self,
        member: &Member,
        payments: &[&Payment],
        bookings: &[&Booking],
    ) -> ReconciliationResult {
        let n = member.intervals.len();
        let mut attributed = vec![Decimal::ZERO; n];
        let mut evidence: Vec<Vec<PaymentEvidence>> = vec![Vec::new(); n];
        let mut unassigned = Decimal::ZERO;

        for payment in payments {
            let overlaps: Vec<i64> = member
                .intervals
                .iter()
                .map(|iv| iv.overlap_days(payment.period.start, payment.period.end))
                .collect();
            let total: i64 = overlaps.iter().sum();
            if total == 0 {
                unassigned += payment.amount;
                continue;
            }

            // Split by overlap share; the last overlapping interval
            // absorbs the rounding remainder so the shares sum exactly.
            let mut assigned = Decimal::ZERO;
            let last = overlaps.iter().rposition(|&d| d > 0).unwrap_or(0);
            for (i, &days) in overlaps.iter().enumerate() {
                if days == 0 {
                    continue;
                }
                let share = if i == last {
                    payment.amount - assigned
                } else {
                    (payment.amount * Decimal::from(days) / Decimal::from(total)).round_dp(2)
                };
                assigned += share;
                attributed[i] += share;
                // evidence carries the share this interval received,
                // not the payment total, so the detail lines sum to
                // the attributed figure
                evidence[i].push(PaymentEvidence {
                    amount: share,
                    ..payment_evidence(payment)
                });
            }
        }

        let mut flags = Vec::new();
        let mut expected_total = Decimal::ZERO;
        for (i, interval) in member.intervals.iter().enumerate() {
            let expected = self.fee_policy.expected_fee(member, interval);
            expected_total += expected;
            let shortfall = expected - attributed[i];
            if shortfall > self.config.tolerance {
                flags.push(DiscrepancyFlag::UnpaidFee {
                    interval: *interval,
                    expected,
                    attributed: attributed[i],
                    shortfall,
                    payments: evidence[i].clone(),
                });
            }
        }
        let unpaid_intervals = flags.len();

        for booking in bookings {
            if member.intervals.iter().any(|iv| iv.contains(booking.date)) {
                continue;
            }
            flags.push(DiscrepancyFlag::BookingWithoutValidMembership {
                booking: booking_evidence(booking),
                nearest_boundary: nearest_boundary(member, booking.date),
            });
        }

        let collected: Decimal = attributed.iter().sum::<Decimal>() + unassigned;
        if unpaid_intervals == 0 && collected > Decimal::ZERO && bookings.is_empty() {
            flags.push(DiscrepancyFlag::PaidNoUsage);
        }

        let paid_state = if collected <= Decimal::ZERO {
            if expected_total > Decimal::ZERO {
                PaidState::Unpaid
            } else {
                PaidState::Paid
            }
        } else if unpaid_intervals > 0 {
            PaidState::Underpaid
        } else {
            PaidState::Paid
        };

        ReconciliationResult {
            subject: ReconSubject::Member {
                id: member.id.clone(),
                name: member.display_name.clone(),
            },
            category: ReconciliationResult::net_member_category(&flags),
            flags,
            expected: expected_total,
            collected,
            paid_state: Some(paid_state),
        }
    }
}

/// Partition resolved records onto members and build results for the
/// unresolved ones
///
/// Returns a per-member work list (parallel to `members`) and the
/// orphan/ambiguous results, payments first, in input order.
pub(crate) fn assign_by_member(
    members: &[Member],
    payments: &[Payment],
    bookings: &[Booking],
    plan: &ResolutionPlan,
) -> Result<(Vec<MemberWork>, Vec<ReconciliationResult>), ReconError> {
    let by_id: HashMap<&str, usize> = members
        .iter()
        .enumerate()
        .map(|(i, m)| (m.id.as_str(), i))
        .collect();

    let mut work = vec![MemberWork::default(); members.len()];
    let mut unresolved = Vec::new();

    for (i, resolution) in plan.payments.iter().enumerate() {
        match resolution {
            Resolution::Matched { member_id, .. } => {
                let idx = *by_id.get(member_id.as_str()).ok_or_else(|| {
                    ReconError::precondition(&format!(
                        "resolution references unknown member {}",
                        member_id
                    ))
                })?;
                work[idx].payment_idx.push(i);
            }
            Resolution::Ambiguous { candidates } => {
                unresolved.push(ambiguous_result(
                    ReconSubject::Payment(payment_evidence(&payments[i])),
                    payments[i].name.clone(),
                    candidates.clone(),
                ));
            }
            Resolution::Unmatched => {
                let ev = payment_evidence(&payments[i]);
                unresolved.push(ReconciliationResult {
                    subject: ReconSubject::Payment(ev.clone()),
                    category: OutcomeCategory::OrphanPayment,
                    flags: vec![DiscrepancyFlag::OrphanPayment { payment: ev }],
                    expected: Decimal::ZERO,
                    collected: Decimal::ZERO,
                    paid_state: None,
                });
            }
        }
    }

    for (i, resolution) in plan.bookings.iter().enumerate() {
        match resolution {
            Resolution::Matched { member_id, .. } => {
                let idx = *by_id.get(member_id.as_str()).ok_or_else(|| {
                    ReconError::precondition(&format!(
                        "resolution references unknown member {}",
                        member_id
                    ))
                })?;
                work[idx].booking_idx.push(i);
            }
            Resolution::Ambiguous { candidates } => {
                unresolved.push(ambiguous_result(
                    ReconSubject::Booking(booking_evidence(&bookings[i])),
                    bookings[i].name.clone(),
                    candidates.clone(),
                ));
            }
            Resolution::Unmatched => {
                let ev = booking_evidence(&bookings[i]);
                unresolved.push(ReconciliationResult {
                    subject: ReconSubject::Booking(ev.clone()),
                    category: OutcomeCategory::OrphanBooking,
                    flags: vec![DiscrepancyFlag::OrphanBooking { booking: ev }],
                    expected: Decimal::ZERO,
                    collected: Decimal::ZERO,
                    paid_state: None,
                });
            }
        }
    }

    Ok((work, unresolved))
}

pub(crate) fn check_preconditions(
    members: &[Member],
    payments: &[Payment],
    bookings: &[Booking],
    plan: &ResolutionPlan,
) -> Result<(), ReconError> {
    if plan.payments.len() != payments.len() || plan.bookings.len() != bookings.len() {
        return Err(ReconError::precondition(
            "resolution plan does not cover the record slices",
        ));
    }

    let mut seen = HashMap::new();
    for member in members {
        if seen.insert(member.id.as_str(), ()).is_some() {
            return Err(ReconError::precondition(&format!(
                "duplicate member id {}",
                member.id
            )));
        }
        for pair in member.intervals.windows(2) {
            if pair[1].start < pair[0].start {
                return Err(ReconError::precondition(&format!(
                    "membership intervals unsorted for member {}",
                    member.id
                )));
            }
            if pair[0].overlaps(&pair[1]) {
                return Err(ReconError::precondition(&format!(
                    "membership intervals overlap for member {}",
                    member.id
                )));
            }
        }
    }
    Ok(())
}

fn ambiguous_result(
    subject: ReconSubject,
    entered_name: Option<String>,
    candidates: Vec<String>,
) -> ReconciliationResult {
    ReconciliationResult {
        subject,
        category: OutcomeCategory::AmbiguousMatch,
        flags: vec![DiscrepancyFlag::AmbiguousMatch {
            entered_name,
            candidates,
        }],
        expected: Decimal::ZERO,
        collected: Decimal::ZERO,
        paid_state: None,
    }
}

fn payment_evidence(payment: &Payment) -> PaymentEvidence {
    PaymentEvidence {
        line: payment.line,
        date: payment.date,
        amount: payment.amount,
        entered_name: payment.name.clone(),
    }
}

fn booking_evidence(booking: &Booking) -> BookingEvidence {
    BookingEvidence {
        line: booking.line,
        booking_id: booking.booking_id.clone(),
        facility: booking.facility.clone(),
        date: booking.date,
        entered_name: booking.name.clone(),
    }
}

/// Closest interval boundary to a date, for invalid-booking evidence
fn nearest_boundary(member: &Member, date: NaiveDate) -> Option<NaiveDate> {
    member
        .intervals
        .iter()
        .flat_map(|iv| [iv.start, iv.end])
        .min_by_key(|b| ((*b - date).num_days().abs(), *b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::resolver::IdentityResolver;
    use crate::types::member::composite_key;
    use crate::types::{FeePeriod, MembershipInterval, MembershipStatus};
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn member(id: &str, name: &str, intervals: Vec<(NaiveDate, NaiveDate)>) -> Member {
        Member {
            id: id.to_string(),
            display_name: name.to_string(),
            composite_key: composite_key(name, None),
            contact: None,
            tier: None,
            status: MembershipStatus::Active,
            intervals: intervals
                .into_iter()
                .map(|(start, end)| MembershipInterval { start, end })
                .collect(),
        }
    }

    fn payment(line: u64, id: &str, amount: Decimal, period: (NaiveDate, NaiveDate)) -> Payment {
        Payment {
            line,
            member_id: Some(id.to_string()),
            name: None,
            contact: None,
            amount,
            date: period.0,
            period: FeePeriod {
                start: period.0,
                end: period.1,
            },
        }
    }

    fn booking(line: u64, id: &str, on: NaiveDate) -> Booking {
        Booking {
            line,
            booking_id: None,
            member_id: Some(id.to_string()),
            name: None,
            contact: None,
            facility: Some("court 1".to_string()),
            date: on,
            start_time: None,
            duration_minutes: 60,
        }
    }

    fn run(
        members: &[Member],
        payments: &[Payment],
        bookings: &[Booking],
    ) -> Vec<ReconciliationResult> {
        let config = ReconConfig::default();
        let resolver = IdentityResolver::new(members, config.fuzzy_threshold);
        let plan = resolver.resolve(payments, bookings);
        ReconciliationEngine::new(&config)
            .reconcile(members, payments, bookings, &plan)
            .unwrap()
    }

    // 2023 dates throughout: a non-leap year keeps the pro-rata math exact.
    fn year_2023() -> (NaiveDate, NaiveDate) {
        (date(2023, 1, 1), date(2023, 12, 31))
    }

    #[test]
    fn clean_member_with_payment_and_booking() {
        let members = vec![member("M-1", "Alice Smith", vec![year_2023()])];
        let payments = vec![payment(2, "M-1", dec!(120.00), year_2023())];
        let bookings = vec![booking(2, "M-1", date(2023, 5, 10))];

        let results = run(&members, &payments, &bookings);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].category, OutcomeCategory::Clean);
        assert_eq!(results[0].expected, dec!(120.00));
        assert_eq!(results[0].collected, dec!(120.00));
        assert_eq!(results[0].paid_state, Some(PaidState::Paid));
    }

    #[test]
    fn shortfall_beyond_tolerance_flags_unpaid_fee() {
        let members = vec![member("M-1", "Alice Smith", vec![year_2023()])];
        let payments = vec![payment(2, "M-1", dec!(100.00), year_2023())];
        let bookings = vec![booking(2, "M-1", date(2023, 5, 10))];

        let results = run(&members, &payments, &bookings);
        assert_eq!(results[0].category, OutcomeCategory::UnpaidFee);
        assert_eq!(results[0].paid_state, Some(PaidState::Underpaid));
        match &results[0].flags[0] {
            DiscrepancyFlag::UnpaidFee {
                expected,
                attributed,
                shortfall,
                payments,
                ..
            } => {
                assert_eq!(*expected, dec!(120.00));
                assert_eq!(*attributed, dec!(100.00));
                assert_eq!(*shortfall, dec!(20.00));
                assert_eq!(payments.len(), 1);
            }
            other => panic!("expected UnpaidFee, got {:?}", other),
        }
    }

    #[test]
    fn shortfall_within_tolerance_is_clean() {
        let mut config = ReconConfig::default();
        config.tolerance = dec!(1.00);
        let members = vec![member("M-1", "Alice Smith", vec![year_2023()])];
        let payments = vec![payment(2, "M-1", dec!(119.50), year_2023())];
        let bookings = vec![booking(2, "M-1", date(2023, 5, 10))];

        let resolver = IdentityResolver::new(&members, config.fuzzy_threshold);
        let plan = resolver.resolve(&payments, &bookings);
        let results = ReconciliationEngine::new(&config)
            .reconcile(&members, &payments, &bookings, &plan)
            .unwrap();
        assert_eq!(results[0].category, OutcomeCategory::Clean);
        assert_eq!(results[0].paid_state, Some(PaidState::Paid));
    }

    #[test]
    fn unpaid_member_with_no_payments() {
        let members = vec![member("M-1", "Alice Smith", vec![year_2023()])];
        let bookings = vec![booking(2, "M-1", date(2023, 5, 10))];

        let results = run(&members, &[], &bookings);
        assert_eq!(results[0].category, OutcomeCategory::UnpaidFee);
        assert_eq!(results[0].paid_state, Some(PaidState::Unpaid));
    }

    #[test]
    fn booking_outside_every_interval_is_flagged() {
        let members = vec![member("M-1", "Alice Smith", vec![year_2023()])];
        let payments = vec![payment(2, "M-1", dec!(120.00), year_2023())];
        let bookings = vec![booking(2, "M-1", date(2024, 1, 10))];

        let results = run(&members, &payments, &bookings);
        assert_eq!(
            results[0].category,
            OutcomeCategory::BookingWithoutValidMembership
        );
        match &results[0].flags[0] {
            DiscrepancyFlag::BookingWithoutValidMembership {
                nearest_boundary, ..
            } => assert_eq!(*nearest_boundary, Some(date(2023, 12, 31))),
            other => panic!("expected booking flag, got {:?}", other),
        }
    }

    #[test]
    fn unpaid_fee_dominates_invalid_booking() {
        let members = vec![member("M-1", "Alice Smith", vec![year_2023()])];
        let bookings = vec![booking(2, "M-1", date(2024, 1, 10))];

        let results = run(&members, &[], &bookings);
        assert_eq!(results[0].category, OutcomeCategory::UnpaidFee);
        assert_eq!(results[0].flags.len(), 2);
    }

    #[test]
    fn paid_member_with_no_bookings_is_paid_no_usage() {
        let members = vec![member("M-1", "Alice Smith", vec![year_2023()])];
        let payments = vec![payment(2, "M-1", dec!(120.00), year_2023())];

        let results = run(&members, &payments, &[]);
        assert_eq!(results[0].category, OutcomeCategory::PaidNoUsage);
        assert_eq!(results[0].paid_state, Some(PaidState::Paid));
    }

    #[test]
    fn orphan_and_ambiguous_records_get_own_results() {
        let members = vec![
            member("M-1", "Alice Smith", vec![year_2023()]),
            member("M-2", "Alice Smith", vec![year_2023()]),
        ];
        let mut orphan = payment(2, "M-9", dec!(50.00), year_2023());
        orphan.member_id = Some("M-9".to_string());
        orphan.name = Some("Nobody Known".to_string());
        let mut ambiguous = payment(3, "M-9", dec!(60.00), year_2023());
        ambiguous.member_id = None;
        ambiguous.name = Some("Alice Smith".to_string());

        let results = run(&members, &[orphan, ambiguous], &[]);
        // two members first (sorted), then the unresolved payments in order
        assert_eq!(results.len(), 4);
        assert_eq!(results[2].category, OutcomeCategory::OrphanPayment);
        assert_eq!(results[3].category, OutcomeCategory::AmbiguousMatch);
        match &results[3].flags[0] {
            DiscrepancyFlag::AmbiguousMatch { candidates, .. } => {
                assert_eq!(candidates, &vec!["M-1".to_string(), "M-2".to_string()]);
            }
            other => panic!("expected AmbiguousMatch, got {:?}", other),
        }
    }

    #[test]
    fn payment_splits_pro_rata_across_intervals() {
        // two half-year intervals, one payment spanning both
        let members = vec![member(
            "M-1",
            "Alice Smith",
            vec![
                (date(2023, 1, 1), date(2023, 6, 30)),
                (date(2023, 7, 1), date(2023, 12, 31)),
            ],
        )];
        let payments = vec![payment(2, "M-1", dec!(120.00), year_2023())];
        let bookings = vec![booking(2, "M-1", date(2023, 5, 10))];

        let results = run(&members, &payments, &bookings);
        let result = &results[0];
        // the split must conserve the payment amount exactly
        assert_eq!(result.collected, dec!(120.00));
        // each half-year interval owes ~half the annual rate; a payment
        // split by overlap covers both, so the member is not underpaid
        assert_eq!(result.category, OutcomeCategory::Clean);
    }

    #[test]
    fn unpaid_evidence_records_the_prorated_share() {
        let members = vec![member(
            "M-1",
            "Alice Smith",
            vec![
                (date(2023, 1, 1), date(2023, 6, 30)),
                (date(2023, 7, 1), date(2023, 12, 31)),
            ],
        )];
        // one underpayment spanning both intervals
        let payments = vec![payment(2, "M-1", dec!(60.00), year_2023())];

        let results = run(&members, &payments, &[]);
        let result = &results[0];
        assert_eq!(result.category, OutcomeCategory::UnpaidFee);
        assert_eq!(result.flags.len(), 2);
        for flag in &result.flags {
            match flag {
                DiscrepancyFlag::UnpaidFee {
                    attributed,
                    payments,
                    ..
                } => {
                    // the detail lines must sum to the attributed figure
                    let listed: Decimal = payments.iter().map(|p| p.amount).sum();
                    assert_eq!(listed, *attributed);
                }
                other => panic!("expected UnpaidFee, got {:?}", other),
            }
        }
        // the shares still conserve the payment total
        assert_eq!(result.collected, dec!(60.00));
    }

    #[test]
    fn payment_touching_no_interval_counts_as_collected_only() {
        let members = vec![member("M-1", "Alice Smith", vec![year_2023()])];
        // fee period entirely in 2025: no interval overlap
        let stray = payment(2, "M-1", dec!(120.00), (date(2025, 1, 1), date(2025, 12, 31)));
        let bookings = vec![booking(2, "M-1", date(2023, 5, 10))];

        let results = run(&members, &[stray], &bookings);
        let result = &results[0];
        assert_eq!(result.collected, dec!(120.00));
        // the interval itself is still short
        assert_eq!(result.category, OutcomeCategory::UnpaidFee);
        assert_eq!(result.paid_state, Some(PaidState::Underpaid));
    }

    #[test]
    fn members_are_ordered_by_id() {
        let members = vec![
            member("M-2", "Bob Jones", vec![year_2023()]),
            member("M-1", "Alice Smith", vec![year_2023()]),
        ];
        let results = run(&members, &[], &[]);
        match (&results[0].subject, &results[1].subject) {
            (ReconSubject::Member { id: a, .. }, ReconSubject::Member { id: b, .. }) => {
                assert_eq!(a, "M-1");
                assert_eq!(b, "M-2");
            }
            other => panic!("expected member subjects, got {:?}", other),
        }
    }

    #[test]
    fn misaligned_plan_is_a_precondition_error() {
        let config = ReconConfig::default();
        let members = vec![member("M-1", "Alice Smith", vec![year_2023()])];
        let payments = vec![payment(2, "M-1", dec!(120.00), year_2023())];
        let plan = ResolutionPlan::default(); // empty, does not cover payments

        let err = ReconciliationEngine::new(&config)
            .reconcile(&members, &payments, &[], &plan)
            .unwrap_err();
        assert!(matches!(err, ReconError::Precondition { .. }));
    }

    #[test]
    fn overlapping_intervals_are_a_precondition_error() {
        let config = ReconConfig::default();
        let members = vec![member(
            "M-1",
            "Alice Smith",
            vec![
                (date(2023, 1, 1), date(2023, 6, 30)),
                (date(2023, 6, 1), date(2023, 12, 31)),
            ],
        )];
        let plan = ResolutionPlan::default();

        let err = ReconciliationEngine::new(&config)
            .reconcile(&members, &[], &[], &plan)
            .unwrap_err();
        assert!(matches!(err, ReconError::Precondition { .. }));
    }

    #[test]
    fn reconcile_is_deterministic() {
        let members = vec![
            member("M-2", "Bob Jones", vec![year_2023()]),
            member("M-1", "Alice Smith", vec![year_2023()]),
        ];
        let payments = vec![
            payment(2, "M-1", dec!(60.00), (date(2023, 1, 1), date(2023, 6, 30))),
            payment(3, "M-1", dec!(60.00), (date(2023, 7, 1), date(2023, 12, 31))),
        ];
        let bookings = vec![booking(2, "M-2", date(2023, 3, 3))];

        let first = run(&members, &payments, &bookings);
        let second = run(&members, &payments, &bookings);
        assert_eq!(first, second);
    }
}
