//! Text report rendering
//!
//! Pure presentation: takes classified results and renders the operator
//! report as plain text. No clock, no I/O, no randomness; the same
//! inputs always produce byte-identical output, which makes run-to-run
//! diffs meaningful.

use std::fmt::Write as _;

use rust_decimal::Decimal;

use crate::core::resolver::FuzzySuggestion;
use crate::types::{
    DiscrepancyFlag, OutcomeCategory, ReconSubject, ReconciliationResult, RejectedRow,
};

/// Input record counts shown in the report header
#[derive(Debug, Clone, Copy, Default)]
pub struct RunTotals {
    pub members: usize,
    pub payments: usize,
    pub bookings: usize,
}

/// Categories in report order
const CATEGORIES: [OutcomeCategory; 7] = [
    OutcomeCategory::Clean,
    OutcomeCategory::UnpaidFee,
    OutcomeCategory::BookingWithoutValidMembership,
    OutcomeCategory::PaidNoUsage,
    OutcomeCategory::OrphanPayment,
    OutcomeCategory::OrphanBooking,
    OutcomeCategory::AmbiguousMatch,
];

/// Renders one run's outcome as the operator report
pub struct ReportBuilder<'a> {
    results: &'a [ReconciliationResult],
    suggestions: &'a [FuzzySuggestion],
    rejected: &'a [RejectedRow],
    totals: RunTotals,
}

impl<'a> ReportBuilder<'a> {
    pub fn new(
        results: &'a [ReconciliationResult],
        suggestions: &'a [FuzzySuggestion],
        rejected: &'a [RejectedRow],
        totals: RunTotals,
    ) -> Self {
        ReportBuilder {
            results,
            suggestions,
            rejected,
            totals,
        }
    }

    /// Render the full report
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.header(&mut out);
        self.summary(&mut out);
        self.revenue(&mut out);
        self.details(&mut out);
        self.fuzzy_suggestions(&mut out);
        self.rejected_rows(&mut out);
        out
    }

    fn header(&self, out: &mut String) {
        let _ = writeln!(out, "MEMBERSHIP RECONCILIATION REPORT");
        let _ = writeln!(out, "================================");
        let _ = writeln!(out);
        let _ = writeln!(out, "INPUTS");
        let _ = writeln!(out, "  members:  {}", self.totals.members);
        let _ = writeln!(out, "  payments: {}", self.totals.payments);
        let _ = writeln!(out, "  bookings: {}", self.totals.bookings);
        let _ = writeln!(out, "  rejected rows: {}", self.rejected.len());
        let _ = writeln!(out);
    }

    fn summary(&self, out: &mut String) {
        let _ = writeln!(out, "SUMMARY");
        for category in CATEGORIES {
            let count = self
                .results
                .iter()
                .filter(|r| r.category == category)
                .count();
            let _ = writeln!(out, "  {}: {}", category, count);
        }
        let _ = writeln!(out);
    }

    fn revenue(&self, out: &mut String) {
        let member_results: Vec<&ReconciliationResult> = self
            .results
            .iter()
            .filter(|r| matches!(r.subject, ReconSubject::Member { .. }))
            .collect();
        let expected: Decimal = member_results.iter().map(|r| r.expected).sum();
        let collected: Decimal = member_results.iter().map(|r| r.collected).sum();
        let flagged = member_results
            .iter()
            .filter(|r| r.category != OutcomeCategory::Clean)
            .count();
        let rate = if member_results.is_empty() {
            0.0
        } else {
            flagged as f64 * 100.0 / member_results.len() as f64
        };

        let _ = writeln!(out, "REVENUE");
        let _ = writeln!(out, "  expected:  {}", expected);
        let _ = writeln!(out, "  collected: {}", collected);
        let _ = writeln!(out, "  shortfall: {}", expected - collected);
        let _ = writeln!(out, "  mismatch rate: {:.1}%", rate);
        let _ = writeln!(out);
    }

    fn details(&self, out: &mut String) {
        for category in CATEGORIES {
            if category == OutcomeCategory::Clean {
                continue;
            }
            let matching: Vec<&ReconciliationResult> = self
                .results
                .iter()
                .filter(|r| r.category == category)
                .collect();
            if matching.is_empty() {
                continue;
            }

            let _ = writeln!(out, "{}", section_title(category));
            for result in matching {
                self.detail_entry(out, result);
            }
            let _ = writeln!(out);
        }
    }

    fn detail_entry(&self, out: &mut String, result: &ReconciliationResult) {
        match &result.subject {
            ReconSubject::Member { id, name } => {
                let _ = writeln!(out, "  {} {}", id, name);
                for flag in &result.flags {
                    self.flag_line(out, flag);
                }
            }
            ReconSubject::Payment(p) => {
                let _ = writeln!(
                    out,
                    "  payment line {}: {} on {} ({})",
                    p.line,
                    p.amount,
                    p.date,
                    p.entered_name.as_deref().unwrap_or("no name")
                );
                self.ambiguity_lines(out, &result.flags);
            }
            ReconSubject::Booking(b) => {
                let _ = writeln!(
                    out,
                    "  booking line {}: {} on {} ({})",
                    b.line,
                    b.facility.as_deref().unwrap_or("unknown facility"),
                    b.date,
                    b.entered_name.as_deref().unwrap_or("no name")
                );
                self.ambiguity_lines(out, &result.flags);
            }
        }
    }

    fn flag_line(&self, out: &mut String, flag: &DiscrepancyFlag) {
        match flag {
            DiscrepancyFlag::UnpaidFee {
                interval,
                expected,
                attributed,
                shortfall,
                payments,
            } => {
                let _ = writeln!(
                    out,
                    "    interval {}..{}: expected {}, attributed {}, short {}",
                    interval.start, interval.end, expected, attributed, shortfall
                );
                for payment in payments {
                    let _ = writeln!(
                        out,
                        "      payment line {}: {} on {}",
                        payment.line, payment.amount, payment.date
                    );
                }
            }
            DiscrepancyFlag::BookingWithoutValidMembership {
                booking,
                nearest_boundary,
            } => {
                let _ = write!(
                    out,
                    "    booking line {}: {} on {}",
                    booking.line,
                    booking.facility.as_deref().unwrap_or("unknown facility"),
                    booking.date
                );
                match nearest_boundary {
                    Some(boundary) => {
                        let _ = writeln!(out, " (nearest membership boundary {})", boundary);
                    }
                    None => {
                        let _ = writeln!(out, " (member has no validity intervals)");
                    }
                }
            }
            DiscrepancyFlag::PaidNoUsage => {
                let _ = writeln!(out, "    paid in full, no bookings recorded");
            }
            // orphan and ambiguity evidence is rendered with the subject line
            DiscrepancyFlag::OrphanPayment { .. } | DiscrepancyFlag::OrphanBooking { .. } => {}
            DiscrepancyFlag::AmbiguousMatch { .. } => {}
        }
    }

    fn ambiguity_lines(&self, out: &mut String, flags: &[DiscrepancyFlag]) {
        for flag in flags {
            if let DiscrepancyFlag::AmbiguousMatch { candidates, .. } = flag {
                let _ = writeln!(out, "    candidates: {}", candidates.join(", "));
            }
        }
    }

    fn fuzzy_suggestions(&self, out: &mut String) {
        if self.suggestions.is_empty() {
            return;
        }
        let _ = writeln!(out, "FUZZY MATCH SUGGESTIONS");
        for suggestion in self.suggestions {
            let _ = writeln!(
                out,
                "  '{}' -> '{}' (score {:.2})",
                suggestion.entered, suggestion.canonical, suggestion.score
            );
        }
        let _ = writeln!(out);
    }

    fn rejected_rows(&self, out: &mut String) {
        if self.rejected.is_empty() {
            return;
        }
        let mut rejected: Vec<&RejectedRow> = self.rejected.iter().collect();
        rejected.sort_by_key(|r| (r.source, r.line));

        let _ = writeln!(out, "REJECTED ROWS");
        for row in rejected {
            let _ = writeln!(out, "  {} line {}: {}", row.source, row.line, row.reason);
        }
        let _ = writeln!(out);
    }
}

fn section_title(category: OutcomeCategory) -> &'static str {
    match category {
        OutcomeCategory::Clean => "CLEAN",
        OutcomeCategory::UnpaidFee => "UNPAID FEES",
        OutcomeCategory::BookingWithoutValidMembership => "BOOKINGS WITHOUT VALID MEMBERSHIP",
        OutcomeCategory::PaidNoUsage => "PAID BUT UNUSED",
        OutcomeCategory::OrphanPayment => "ORPHAN PAYMENTS",
        OutcomeCategory::OrphanBooking => "ORPHAN BOOKINGS",
        OutcomeCategory::AmbiguousMatch => "AMBIGUOUS MATCHES",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PaidState, PaymentEvidence, SourceKind};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn member_result(
        id: &str,
        category: OutcomeCategory,
        expected: Decimal,
        collected: Decimal,
    ) -> ReconciliationResult {
        ReconciliationResult {
            subject: ReconSubject::Member {
                id: id.to_string(),
                name: "Alice Smith".to_string(),
            },
            category,
            flags: vec![],
            expected,
            collected,
            paid_state: Some(PaidState::Paid),
        }
    }

    #[test]
    fn empty_run_renders_header_and_summary() {
        let report = ReportBuilder::new(&[], &[], &[], RunTotals::default()).render();
        assert!(report.starts_with("MEMBERSHIP RECONCILIATION REPORT"));
        assert!(report.contains("CLEAN: 0"));
        assert!(report.contains("mismatch rate: 0.0%"));
        assert!(!report.contains("REJECTED ROWS"));
        assert!(!report.contains("FUZZY MATCH SUGGESTIONS"));
    }

    #[test]
    fn revenue_sums_member_results() {
        let results = vec![
            member_result("M-1", OutcomeCategory::Clean, dec!(120.00), dec!(120.00)),
            member_result("M-2", OutcomeCategory::UnpaidFee, dec!(120.00), dec!(40.00)),
        ];
        let report = ReportBuilder::new(&results, &[], &[], RunTotals::default()).render();
        assert!(report.contains("expected:  240.00"));
        assert!(report.contains("collected: 160.00"));
        assert!(report.contains("shortfall: 80.00"));
        assert!(report.contains("mismatch rate: 50.0%"));
    }

    #[test]
    fn orphan_payment_is_listed_with_evidence() {
        let ev = PaymentEvidence {
            line: 7,
            date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            amount: dec!(50.00),
            entered_name: Some("Nobody Known".to_string()),
        };
        let results = vec![ReconciliationResult {
            subject: ReconSubject::Payment(ev.clone()),
            category: OutcomeCategory::OrphanPayment,
            flags: vec![DiscrepancyFlag::OrphanPayment { payment: ev }],
            expected: Decimal::ZERO,
            collected: Decimal::ZERO,
            paid_state: None,
        }];
        let report = ReportBuilder::new(&results, &[], &[], RunTotals::default()).render();
        assert!(report.contains("ORPHAN PAYMENTS"));
        assert!(report.contains("payment line 7: 50.00 on 2024-02-01 (Nobody Known)"));
    }

    #[test]
    fn suggestions_and_rejections_render_sorted() {
        let suggestions = vec![FuzzySuggestion {
            entered: "Alice Smyth".to_string(),
            canonical: "Alice Smith".to_string(),
            score: 0.909,
        }];
        let rejected = vec![
            RejectedRow {
                source: SourceKind::Payments,
                line: 9,
                reason: "unparseable amount 'ten'".to_string(),
            },
            RejectedRow {
                source: SourceKind::Members,
                line: 4,
                reason: "missing full_name".to_string(),
            },
        ];
        let report = ReportBuilder::new(&[], &suggestions, &rejected, RunTotals::default()).render();
        assert!(report.contains("'Alice Smyth' -> 'Alice Smith' (score 0.91)"));
        let members_pos = report.find("members line 4").unwrap();
        let payments_pos = report.find("payments line 9").unwrap();
        assert!(members_pos < payments_pos);
    }

    #[test]
    fn render_is_deterministic() {
        let results = vec![member_result(
            "M-1",
            OutcomeCategory::Clean,
            dec!(120.00),
            dec!(120.00),
        )];
        let totals = RunTotals {
            members: 1,
            payments: 1,
            bookings: 0,
        };
        let first = ReportBuilder::new(&results, &[], &[], totals).render();
        let second = ReportBuilder::new(&results, &[], &[], totals).render();
        assert_eq!(first, second);
    }
}
