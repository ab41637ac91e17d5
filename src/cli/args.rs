use crate::core::PartitionConfig;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Reconcile membership, payment, and booking records
#[derive(Parser, Debug)]
#[command(name = "membership-recon")]
#[command(about = "Reconcile membership, payment, and booking records", long_about = None)]
pub struct CliArgs {
    /// Members CSV file
    #[arg(long, value_name = "FILE", help = "Path to the members CSV file")]
    pub members: PathBuf,

    /// Payments CSV file
    #[arg(long, value_name = "FILE", help = "Path to the payments CSV file")]
    pub payments: PathBuf,

    /// Bookings CSV file
    #[arg(long, value_name = "FILE", help = "Path to the bookings CSV file")]
    pub bookings: PathBuf,

    /// Report destination (stdout when omitted)
    #[arg(
        long,
        short = 'o',
        value_name = "FILE",
        help = "Write the report to this file instead of stdout"
    )]
    pub output: Option<PathBuf>,

    /// Optional TOML configuration file
    #[arg(
        long,
        value_name = "FILE",
        help = "Path to a TOML configuration file with fees, tolerance, and date formats"
    )]
    pub config: Option<PathBuf>,

    /// Processing strategy to use for the run
    #[arg(
        long = "strategy",
        value_name = "STRATEGY",
        default_value = "sync",
        help = "Processing strategy: 'sync' for sequential or 'async' for concurrent"
    )]
    pub strategy: StrategyType,

    /// Start of the reconciliation period (overrides config)
    #[arg(
        long,
        value_name = "DATE",
        help = "Reconciliation period start, ISO format (e.g. 2023-01-01)"
    )]
    pub from: Option<chrono::NaiveDate>,

    /// End of the reconciliation period (overrides config)
    #[arg(
        long,
        value_name = "DATE",
        help = "Reconciliation period end, ISO format (e.g. 2023-12-31)"
    )]
    pub to: Option<chrono::NaiveDate>,

    /// Members per worker partition (async mode only)
    #[arg(
        long = "partition-size",
        value_name = "SIZE",
        help = "Members per worker partition (default: 64)"
    )]
    pub partition_size: Option<usize>,

    /// Maximum number of concurrent workers (async mode only)
    #[arg(
        long = "max-concurrent",
        value_name = "COUNT",
        help = "Maximum number of partitions processing concurrently (default: CPU cores)"
    )]
    pub max_concurrent: Option<usize>,
}

/// Available processing strategies for reconciliation runs
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum StrategyType {
    Sync,
    Async,
}

impl CliArgs {
    /// Create a PartitionConfig from CLI arguments
    ///
    /// Returns `None` when neither tuning flag was given, letting the
    /// strategy factory fall back to defaults. Zero values are replaced
    /// with defaults by [`PartitionConfig::validated`].
    pub fn to_partition_config(&self) -> Option<PartitionConfig> {
        if self.partition_size.is_none() && self.max_concurrent.is_none() {
            return None;
        }
        let default = PartitionConfig::default();
        Some(
            PartitionConfig {
                partition_size: self.partition_size.unwrap_or(default.partition_size),
                max_concurrent: self.max_concurrent.unwrap_or(default.max_concurrent),
            }
            .validated(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const REQUIRED: &[&str] = &[
        "program",
        "--members",
        "m.csv",
        "--payments",
        "p.csv",
        "--bookings",
        "b.csv",
    ];

    fn with_extra(extra: &[&str]) -> Vec<String> {
        REQUIRED
            .iter()
            .chain(extra.iter())
            .map(|s| s.to_string())
            .collect()
    }

    #[rstest]
    #[case::default_strategy(&[], StrategyType::Sync)]
    #[case::explicit_sync(&["--strategy", "sync"], StrategyType::Sync)]
    #[case::explicit_async(&["--strategy", "async"], StrategyType::Async)]
    fn test_strategy_parsing(#[case] extra: &[&str], #[case] expected: StrategyType) {
        let parsed = CliArgs::try_parse_from(with_extra(extra)).unwrap();
        match (parsed.strategy, expected) {
            (StrategyType::Sync, StrategyType::Sync) => (),
            (StrategyType::Async, StrategyType::Async) => (),
            _ => panic!("Expected {:?}, got {:?}", expected, parsed.strategy),
        }
    }

    #[test]
    fn test_input_paths_are_captured() {
        let parsed = CliArgs::try_parse_from(with_extra(&[])).unwrap();
        assert_eq!(parsed.members, PathBuf::from("m.csv"));
        assert_eq!(parsed.payments, PathBuf::from("p.csv"));
        assert_eq!(parsed.bookings, PathBuf::from("b.csv"));
        assert!(parsed.output.is_none());
        assert!(parsed.config.is_none());
    }

    #[rstest]
    #[case::no_options(&[], None, None)]
    #[case::partition_size(&["--partition-size", "32"], Some(32), None)]
    #[case::max_concurrent(&["--max-concurrent", "8"], None, Some(8))]
    #[case::both(&["--partition-size", "32", "--max-concurrent", "8"], Some(32), Some(8))]
    fn test_partition_options(
        #[case] extra: &[&str],
        #[case] partition_size: Option<usize>,
        #[case] max_concurrent: Option<usize>,
    ) {
        let parsed = CliArgs::try_parse_from(with_extra(extra)).unwrap();
        assert_eq!(parsed.partition_size, partition_size);
        assert_eq!(parsed.max_concurrent, max_concurrent);
    }

    #[test]
    fn test_partition_config_conversion() {
        let parsed = CliArgs::try_parse_from(with_extra(&["--partition-size", "32"])).unwrap();
        let config = parsed.to_partition_config().unwrap();
        assert_eq!(config.partition_size, 32);
        assert_eq!(config.max_concurrent, num_cpus::get());

        let parsed = CliArgs::try_parse_from(with_extra(&[])).unwrap();
        assert!(parsed.to_partition_config().is_none());
    }

    #[test]
    fn test_zero_partition_size_falls_back_to_default() {
        let parsed = CliArgs::try_parse_from(with_extra(&["--partition-size", "0"])).unwrap();
        let config = parsed.to_partition_config().unwrap();
        assert_eq!(
            config.partition_size,
            PartitionConfig::default().partition_size
        );
    }

    #[test]
    fn test_period_overrides_parse_as_dates() {
        let parsed =
            CliArgs::try_parse_from(with_extra(&["--from", "2023-01-01", "--to", "2023-12-31"]))
                .unwrap();
        assert_eq!(parsed.from, chrono::NaiveDate::from_ymd_opt(2023, 1, 1));
        assert_eq!(parsed.to, chrono::NaiveDate::from_ymd_opt(2023, 12, 31));
    }

    #[rstest]
    #[case::missing_inputs(&["program", "--members", "m.csv"])]
    #[case::invalid_strategy(&["program", "--members", "m.csv", "--payments", "p.csv", "--bookings", "b.csv", "--strategy", "invalid"])]
    #[case::invalid_date(&["program", "--members", "m.csv", "--payments", "p.csv", "--bookings", "b.csv", "--from", "not-a-date"])]
    fn test_parsing_errors(#[case] args: &[&str]) {
        let result = CliArgs::try_parse_from(args);
        assert!(result.is_err());
    }
}
