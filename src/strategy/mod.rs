//! Processing strategy module for reconciliation runs
//!
//! Defines the Strategy pattern for complete reconciliation pipelines,
//! from reading the three input files through classification to report
//! rendering. This allows different pipeline implementations
//! (synchronous, concurrent) to be selected at runtime.

use std::io::Write;
use std::path::PathBuf;

use crate::cli::StrategyType;
use crate::config::ReconConfig;
use crate::core::PartitionConfig;
use crate::types::{RejectedRow, SourceKind};

pub mod r#async;
pub mod sync;

pub use self::r#async::AsyncReconStrategy;
pub use sync::SyncReconStrategy;

/// Paths to the three input files of one run
#[derive(Debug, Clone)]
pub struct InputPaths {
    pub members: PathBuf,
    pub payments: PathBuf,
    pub bookings: PathBuf,
}

/// Processing strategy trait for complete reconciliation pipelines
///
/// Each strategy reads the input files, normalizes and resolves the
/// records, classifies every subject, and writes the text report to
/// the provided output.
///
/// Row-level data problems never fail a run; they end up in the
/// report's rejected-rows section. Only fatal conditions (missing
/// file, unreadable header, precondition violation) produce an `Err`.
pub trait ProcessingStrategy: Send + Sync {
    /// Run the full pipeline and write the report
    ///
    /// # Errors
    ///
    /// Returns a displayable message when an input file cannot be
    /// read, its header is invalid, or the report cannot be written.
    fn process(&self, inputs: &InputPaths, output: &mut dyn Write) -> Result<(), String>;
}

/// Create a processing strategy based on the specified strategy type
///
/// # Arguments
///
/// * `strategy_type` - Which pipeline implementation to use
/// * `config` - Validated run configuration
/// * `partition` - Optional tuning for the concurrent strategy
///   (ignored for sync)
pub fn create_strategy(
    strategy_type: StrategyType,
    config: ReconConfig,
    partition: Option<PartitionConfig>,
) -> Box<dyn ProcessingStrategy> {
    match strategy_type {
        StrategyType::Sync => Box::new(SyncReconStrategy::new(config)),
        StrategyType::Async => {
            let partition = partition.unwrap_or_default();
            Box::new(AsyncReconStrategy::new(config, partition))
        }
    }
}

/// Convert a reader-level row error into a rejected row
///
/// Readers report structural CSV errors with the file line; the report
/// lists them next to the normalizer's rejections.
pub(crate) fn rejected_from_error(
    source: SourceKind,
    error: &crate::types::ReconError,
) -> RejectedRow {
    let line = match error {
        crate::types::ReconError::ParseError { line, .. } => line.unwrap_or(0),
        _ => 0,
    };
    RejectedRow {
        source,
        line,
        reason: error.to_string(),
    }
}
