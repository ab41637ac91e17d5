//! Membership Reconciliation CLI
//!
//! Command-line interface for reconciling membership, payment, and
//! booking CSV extracts into a plain-text discrepancy report.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- --members members.csv --payments payments.csv --bookings bookings.csv
//! cargo run -- --members m.csv --payments p.csv --bookings b.csv -o report.txt
//! cargo run -- --members m.csv --payments p.csv --bookings b.csv --strategy async
//! cargo run -- --members m.csv --payments p.csv --bookings b.csv --config fees.toml --from 2023-01-01 --to 2023-12-31
//! ```
//!
//! The program reads the three input files, matches payments and
//! bookings to members, classifies every subject, and writes the
//! report to stdout or to `--output`.
//!
//! # Processing Strategies
//!
//! - **sync**: Sequential single-threaded pipeline (default)
//! - **async**: Concurrent file loading with partitioned parallel classification
//!
//! Both strategies produce byte-identical reports.
//!
//! # Exit Codes
//!
//! - 0: Success (a report was written, possibly listing rejected rows)
//! - 1: Fatal error (missing file, invalid header, invalid configuration)

use membership_recon::cli;
use membership_recon::config::{Period, ReconConfig};
use membership_recon::strategy::{self, InputPaths};
use std::fs::File;
use std::io::Write;
use std::process;

fn main() {
    env_logger::init();

    let args = cli::parse_args();

    // Configuration is fatal when invalid; report nothing in that case
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let strategy = strategy::create_strategy(args.strategy, config, args.to_partition_config());

    let inputs = InputPaths {
        members: args.members.clone(),
        payments: args.payments.clone(),
        bookings: args.bookings.clone(),
    };

    let result = match &args.output {
        Some(path) => match File::create(path) {
            Ok(mut file) => strategy.process(&inputs, &mut file),
            Err(e) => Err(format!(
                "Failed to create output file '{}': {}",
                path.display(),
                e
            )),
        },
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            strategy
                .process(&inputs, &mut lock)
                .and_then(|_| lock.flush().map_err(|e| e.to_string()))
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Build the run configuration from the config file and CLI overrides
fn load_config(args: &cli::CliArgs) -> Result<ReconConfig, String> {
    let mut config = match &args.config {
        Some(path) => ReconConfig::from_file(path).map_err(|e| e.to_string())?,
        None => ReconConfig::default(),
    };

    match (args.from, args.to) {
        (Some(start), Some(end)) => config.period = Some(Period { start, end }),
        (Some(start), None) => {
            let end = config
                .period
                .as_ref()
                .map(|p| p.end)
                .ok_or("--from requires --to (or a period in the config file)")?;
            config.period = Some(Period { start, end });
        }
        (None, Some(end)) => {
            let start = config
                .period
                .as_ref()
                .map(|p| p.start)
                .ok_or("--to requires --from (or a period in the config file)")?;
            config.period = Some(Period { start, end });
        }
        (None, None) => {}
    }

    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}
