//! Core business logic module
//!
//! This module contains the reconciliation pipeline stages:
//! - `normalizer` - Raw row validation and canonicalization
//! - `resolver` - Tiered identity resolution onto members
//! - `fees` - Expected-fee policies
//! - `engine` - Per-member classification
//! - `async` - Concurrent classification over tokio tasks

pub mod r#async;
pub mod engine;
pub mod fees;
pub mod normalizer;
pub mod resolver;

pub use engine::ReconciliationEngine;
pub use fees::{FeePolicy, FlatRatePolicy, ProRataAnnualPolicy};
pub use normalizer::Normalizer;
pub use r#async::{AsyncReconEngine, PartitionConfig};
pub use resolver::{
    FuzzySuggestion, IdentityResolver, LevenshteinSimilarity, MatchTier, NameSimilarity,
    Resolution, ResolutionPlan,
};
