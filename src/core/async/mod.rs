//! Asynchronous implementation of the reconciliation engine
//!
//! Provides [`AsyncReconEngine`], a concurrent classifier that
//! partitions members across tokio tasks. Partitions share only
//! immutable inputs behind `Arc`; per-partition results are collected
//! in a `DashMap` and merged deterministically, so the async path is
//! output-identical to the sequential one.

pub mod engine;

pub use engine::{AsyncReconEngine, PartitionConfig};
