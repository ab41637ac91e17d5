//! Synchronous reconciliation strategy
//!
//! Single-threaded pipeline: the three input files are read one after
//! another with the streaming reader, then normalized, resolved,
//! classified, and rendered. This is the default strategy and the
//! reference for output correctness; the concurrent strategy must
//! produce byte-identical reports.

use std::io::Write;

use log::info;

use crate::config::ReconConfig;
use crate::core::{IdentityResolver, Normalizer, ReconciliationEngine};
use crate::io::SyncReader;
use crate::report::{ReportBuilder, RunTotals};
use crate::strategy::{rejected_from_error, InputPaths, ProcessingStrategy};
use crate::types::{RawRow, RejectedRow, SourceKind};

/// Synchronous pipeline implementation
pub struct SyncReconStrategy {
    config: ReconConfig,
}

impl SyncReconStrategy {
    pub fn new(config: ReconConfig) -> Self {
        Self { config }
    }

    fn read_file(
        &self,
        path: &std::path::Path,
        kind: SourceKind,
    ) -> Result<(Vec<RawRow>, Vec<RejectedRow>), String> {
        let reader = SyncReader::new(path, kind).map_err(|e| e.to_string())?;
        let mut rows = Vec::new();
        let mut rejected = Vec::new();
        for item in reader {
            match item {
                Ok(row) => rows.push(row),
                Err(e) => rejected.push(rejected_from_error(kind, &e)),
            }
        }
        Ok((rows, rejected))
    }
}

impl ProcessingStrategy for SyncReconStrategy {
    fn process(&self, inputs: &InputPaths, output: &mut dyn Write) -> Result<(), String> {
        let (member_rows, mut rejected) = self.read_file(&inputs.members, SourceKind::Members)?;
        let (payment_rows, r) = self.read_file(&inputs.payments, SourceKind::Payments)?;
        rejected.extend(r);
        let (booking_rows, r) = self.read_file(&inputs.bookings, SourceKind::Bookings)?;
        rejected.extend(r);

        let normalizer = Normalizer::new(&self.config);
        let (members, r) = normalizer.normalize_members(&member_rows);
        rejected.extend(r);
        let (payments, r) = normalizer.normalize_payments(&payment_rows);
        rejected.extend(r);
        let (bookings, r) = normalizer.normalize_bookings(&booking_rows);
        rejected.extend(r);

        info!(
            "normalized {} members, {} payments, {} bookings ({} rows rejected)",
            members.len(),
            payments.len(),
            bookings.len(),
            rejected.len()
        );

        let resolver = IdentityResolver::new(&members, self.config.fuzzy_threshold);
        let plan = resolver.resolve(&payments, &bookings);

        let results = ReconciliationEngine::new(&self.config)
            .reconcile(&members, &payments, &bookings, &plan)
            .map_err(|e| e.to_string())?;

        let totals = RunTotals {
            members: members.len(),
            payments: payments.len(),
            bookings: bookings.len(),
        };
        let report = ReportBuilder::new(&results, &plan.suggestions, &rejected, totals).render();
        output
            .write_all(report.as_bytes())
            .map_err(|e| format!("Failed to write report: {}", e))
    }
}
