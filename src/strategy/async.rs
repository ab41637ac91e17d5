//! Concurrent reconciliation strategy
//!
//! Multi-threaded pipeline: the three input files are loaded
//! concurrently with csv-async, then members are classified in
//! parallel by the [`AsyncReconEngine`]. Normalization and resolution
//! stay sequential; they are cheap relative to I/O and classification
//! and keeping them single-threaded preserves rejection ordering.
//!
//! # Architecture
//!
//! ```text
//! AsyncReconStrategy
//!     ├── PartitionConfig          (partition_size, max_concurrent)
//!     ├── AsyncReader × 3          (concurrent file loading)
//!     ├── Normalizer + Resolver    (sequential, shared with sync)
//!     └── AsyncReconEngine         (partitioned parallel classification)
//! ```

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use log::info;

use crate::config::ReconConfig;
use crate::core::{AsyncReconEngine, IdentityResolver, Normalizer, PartitionConfig};
use crate::io::AsyncReader;
use crate::report::{ReportBuilder, RunTotals};
use crate::strategy::{rejected_from_error, InputPaths, ProcessingStrategy};
use crate::types::{RawRow, RejectedRow, SourceKind};

/// Rows read per await on each file
const READ_BATCH_SIZE: usize = 1024;

/// Concurrent pipeline implementation
pub struct AsyncReconStrategy {
    config: ReconConfig,
    partition: PartitionConfig,
}

impl AsyncReconStrategy {
    pub fn new(config: ReconConfig, partition: PartitionConfig) -> Self {
        Self {
            config,
            partition: partition.validated(),
        }
    }
}

/// Load one whole file through the batch reader
async fn load_file(
    path: &Path,
    kind: SourceKind,
) -> Result<(Vec<RawRow>, Vec<RejectedRow>), String> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| format!("Failed to open file '{}': {}", path.display(), e))?;
    let compat_file = tokio_util::compat::TokioAsyncReadCompatExt::compat(file);
    let mut reader = AsyncReader::new(compat_file, kind)
        .await
        .map_err(|e| e.to_string())?;

    let mut rows = Vec::new();
    let mut rejected = Vec::new();
    loop {
        let batch = reader.read_batch(READ_BATCH_SIZE).await;
        if batch.is_empty() {
            break;
        }
        for item in batch {
            match item {
                Ok(row) => rows.push(row),
                Err(e) => rejected.push(rejected_from_error(kind, &e)),
            }
        }
    }
    Ok((rows, rejected))
}

impl ProcessingStrategy for AsyncReconStrategy {
    fn process(&self, inputs: &InputPaths, output: &mut dyn Write) -> Result<(), String> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.partition.max_concurrent)
            .build()
            .map_err(|e| format!("Failed to create tokio runtime: {}", e))?;

        runtime.block_on(async {
            // Load all three inputs concurrently
            let (members_loaded, payments_loaded, bookings_loaded) = futures::try_join!(
                load_file(&inputs.members, SourceKind::Members),
                load_file(&inputs.payments, SourceKind::Payments),
                load_file(&inputs.bookings, SourceKind::Bookings),
            )?;
            let (member_rows, mut rejected) = members_loaded;
            let (payment_rows, r) = payments_loaded;
            rejected.extend(r);
            let (booking_rows, r) = bookings_loaded;
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

            let totals = RunTotals {
                members: members.len(),
                payments: payments.len(),
                bookings: bookings.len(),
            };

            let engine = AsyncReconEngine::new(Arc::new(self.config.clone()), self.partition);
            let results = engine
                .reconcile(
                    Arc::new(members),
                    Arc::new(payments),
                    Arc::new(bookings),
                    &plan,
                )
                .await
                .map_err(|e| e.to_string())?;

            let report =
                ReportBuilder::new(&results, &plan.suggestions, &rejected, totals).render();
            output
                .write_all(report.as_bytes())
                .map_err(|e| format!("Failed to write report: {}", e))
        })
    }
}
