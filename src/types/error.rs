//! Error types for the membership reconciliation engine
//!
//! This module defines all error types that can occur during a
//! reconciliation run. Errors are designed to be descriptive and
//! user-friendly for CLI output.
//!
//! # Error Categories
//!
//! - **File I/O Errors**: File not found, permission denied, etc.
//! - **CSV Parsing Errors**: Malformed CSV, invalid data types, etc.
//! - **Configuration Errors**: Invalid tolerance, period, or fee table;
//!   these are fatal and reported before any file is read.
//! - **Precondition Errors**: Integration bugs such as unsorted
//!   intervals reaching the engine; always fatal.

use rust_decimal::Decimal;
use thiserror::Error;

/// Main error type for the reconciliation engine
///
/// Row-level data problems are NOT errors: the normalizer records them
/// as rejected rows and the run continues. This enum covers the
/// conditions that abort a run (or a file read) entirely.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReconError {
    /// File not found at the specified path
    ///
    /// This is a fatal error that prevents processing from starting.
    #[error("File not found: {path}")]
    FileNotFound {
        /// The path that was not found
        path: String,
    },

    /// I/O error occurred while reading or writing files
    #[error("I/O error: {message}")]
    IoError {
        /// Description of the I/O error
        message: String,
    },

    /// CSV parsing error occurred at the file level (broken structure,
    /// not a bad cell value)
    #[error("CSV parse error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    ParseError {
        /// Line number where the error occurred (if available)
        line: Option<u64>,
        /// Description of the parsing error
        message: String,
    },

    /// An input file is missing a required column in its header
    #[error("{source_kind} file is missing required column '{column}'")]
    MissingColumn {
        /// Which input file
        source_kind: String,
        /// The absent column name
        column: String,
    },

    /// Configuration file could not be parsed
    #[error("Config parse error in {path}: {message}")]
    ConfigParse {
        /// Path of the config file
        path: String,
        /// Description of the parse error
        message: String,
    },

    /// Analysis period has start after end
    #[error("Invalid analysis period: start {start} is after end {end}")]
    InvalidPeriod {
        /// Configured period start (formatted)
        start: String,
        /// Configured period end (formatted)
        end: String,
    },

    /// Tolerance must be non-negative
    #[error("Invalid tolerance {tolerance}: must be >= 0")]
    InvalidTolerance {
        /// The offending tolerance value
        tolerance: Decimal,
    },

    /// Fuzzy match threshold must lie in [0, 1]
    #[error("Invalid fuzzy threshold {threshold}: must be between 0 and 1")]
    InvalidFuzzyThreshold {
        /// The offending threshold
        threshold: f64,
    },

    /// A fee rate in the config is negative
    #[error("Invalid fee rate {rate} for tier '{tier}': must be >= 0")]
    InvalidFeeRate {
        /// Tier name ("default" for the fallback rate)
        tier: String,
        /// The offending rate
        rate: Decimal,
    },

    /// No date formats configured; nothing could ever parse
    #[error("Date format whitelist is empty")]
    EmptyDateFormats,

    /// Internal invariant violated by the caller of the engine
    ///
    /// Indicates an integration bug (e.g. unsorted intervals, a
    /// resolution plan that does not cover its inputs). Always fatal.
    #[error("Precondition violated: {message}")]
    Precondition {
        /// Description of the violated invariant
        message: String,
    },
}

// Conversion from io::Error to ReconError
impl From<std::io::Error> for ReconError {
    fn from(error: std::io::Error) -> Self {
        ReconError::IoError {
            message: error.to_string(),
        }
    }
}

// Conversion from csv::Error to ReconError
impl From<csv::Error> for ReconError {
    fn from(error: csv::Error) -> Self {
        // Extract line number if available
        let line = error.position().map(|pos| pos.line());

        ReconError::ParseError {
            line,
            message: error.to_string(),
        }
    }
}

// Helper functions for creating common errors

impl ReconError {
    /// Create a FileNotFound error
    pub fn file_not_found(path: &str) -> Self {
        ReconError::FileNotFound {
            path: path.to_string(),
        }
    }

    /// Create a MissingColumn error
    pub fn missing_column(source_kind: &str, column: &str) -> Self {
        ReconError::MissingColumn {
            source_kind: source_kind.to_string(),
            column: column.to_string(),
        }
    }

    /// Create a ConfigParse error
    pub fn config_parse(path: &str, message: &str) -> Self {
        ReconError::ConfigParse {
            path: path.to_string(),
            message: message.to_string(),
        }
    }

    /// Create a Precondition error
    pub fn precondition(message: &str) -> Self {
        ReconError::Precondition {
            message: message.to_string(),
        }
    }
}
