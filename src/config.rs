//! Run configuration for the reconciliation engine
//!
//! Configuration comes from an optional TOML file plus CLI overrides.
//! All values have sensible defaults so a bare invocation works; the
//! file only needs to name what it changes.
//!
//! # Example config file
//!
//! ```toml
//! tolerance = 0.01
//! fuzzy_threshold = 0.86
//! date_formats = ["%Y-%m-%d", "%d/%m/%Y"]
//!
//! [period]
//! start = "2024-01-01"
//! end = "2024-12-31"
//!
//! [fees]
//! default = 120.00
//!
//! [fees.tiers]
//! gold = 200.00
//! student = 60.00
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::types::ReconError;

/// Default annual fee applied when a member's tier has no explicit rate
pub const DEFAULT_FEE: Decimal = Decimal::from_parts(12000, 0, 0, false, 2);

/// Default underpayment tolerance (one cent)
pub const DEFAULT_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Default minimum similarity for a fuzzy name match
pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.86;

/// Date formats tried in order when parsing input cells
pub const DEFAULT_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];

/// Analysis window restricting which records a run considers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    /// Whether a date falls inside the window (inclusive)
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Fee table: a fallback rate plus optional per-tier overrides
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeeTable {
    /// Rate used when a member's tier is absent from `tiers`
    #[serde(default = "default_fee")]
    pub default: Decimal,
    /// Per-tier annual rates, keyed by lower-cased tier name
    #[serde(default)]
    pub tiers: BTreeMap<String, Decimal>,
}

fn default_fee() -> Decimal {
    DEFAULT_FEE
}

impl Default for FeeTable {
    fn default() -> Self {
        FeeTable {
            default: DEFAULT_FEE,
            tiers: BTreeMap::new(),
        }
    }
}

impl FeeTable {
    /// Rate for a tier; falls back to the default rate when the tier is
    /// unknown or the member has none
    pub fn rate_for(&self, tier: Option<&str>) -> Decimal {
        tier.and_then(|t| self.tiers.get(&t.trim().to_lowercase()))
            .copied()
            .unwrap_or(self.default)
    }
}

/// Raw shape of the TOML config file
///
/// Every field is optional; omitted fields keep their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    period: Option<Period>,
    tolerance: Option<Decimal>,
    fuzzy_threshold: Option<f64>,
    date_formats: Option<Vec<String>>,
    fees: Option<FeeTable>,
}

/// Fully resolved configuration for one reconciliation run
#[derive(Debug, Clone, PartialEq)]
pub struct ReconConfig {
    /// Optional analysis window; `None` means consider everything
    pub period: Option<Period>,
    /// Shortfalls at or below this amount are not flagged
    pub tolerance: Decimal,
    /// Minimum similarity score for the fuzzy match tier
    pub fuzzy_threshold: f64,
    /// Date formats tried in order by the normalizer
    pub date_formats: Vec<String>,
    pub fees: FeeTable,
}

impl Default for ReconConfig {
    fn default() -> Self {
        ReconConfig {
            period: None,
            tolerance: DEFAULT_TOLERANCE,
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
            date_formats: DEFAULT_DATE_FORMATS.iter().map(|s| s.to_string()).collect(),
            fees: FeeTable::default(),
        }
    }
}

impl ReconConfig {
    /// Load configuration from a TOML file, layering it over defaults
    pub fn from_file(path: &Path) -> Result<Self, ReconError> {
        if !path.exists() {
            return Err(ReconError::file_not_found(&path.display().to_string()));
        }
        let raw = std::fs::read_to_string(path)?;
        let file: ConfigFile = toml::from_str(&raw)
            .map_err(|e| ReconError::config_parse(&path.display().to_string(), &e.to_string()))?;

        let mut config = ReconConfig::default();
        config.apply(file);
        Ok(config)
    }

    fn apply(&mut self, file: ConfigFile) {
        if let Some(period) = file.period {
            self.period = Some(period);
        }
        if let Some(tolerance) = file.tolerance {
            self.tolerance = tolerance;
        }
        if let Some(threshold) = file.fuzzy_threshold {
            self.fuzzy_threshold = threshold;
        }
        if let Some(formats) = file.date_formats {
            self.date_formats = formats;
        }
        if let Some(fees) = file.fees {
            self.fees = fees;
        }
    }

    /// Validate the configuration; called once at startup, before any
    /// input file is opened. Any failure aborts the run.
    pub fn validate(&self) -> Result<(), ReconError> {
        if let Some(period) = &self.period {
            if period.start > period.end {
                return Err(ReconError::InvalidPeriod {
                    start: period.start.to_string(),
                    end: period.end.to_string(),
                });
            }
        }
        if self.tolerance < Decimal::ZERO {
            return Err(ReconError::InvalidTolerance {
                tolerance: self.tolerance,
            });
        }
        if !(0.0..=1.0).contains(&self.fuzzy_threshold) {
            return Err(ReconError::InvalidFuzzyThreshold {
                threshold: self.fuzzy_threshold,
            });
        }
        if self.date_formats.is_empty() {
            return Err(ReconError::EmptyDateFormats);
        }
        if self.fees.default < Decimal::ZERO {
            return Err(ReconError::InvalidFeeRate {
                tier: "default".to_string(),
                rate: self.fees.default,
            });
        }
        for (tier, rate) in &self.fees.tiers {
            if *rate < Decimal::ZERO {
                return Err(ReconError::InvalidFeeRate {
                    tier: tier.clone(),
                    rate: *rate,
                });
            }
        }
        Ok(())
    }

    /// Try each configured format in order; `None` when nothing matches
    pub fn parse_date(&self, raw: &str) -> Option<NaiveDate> {
        let raw = raw.trim();
        self.date_formats
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
    }
}
