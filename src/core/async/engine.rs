//! Parallel reconciliation engine
//!
//! Classifies members concurrently by partitioning the sorted member
//! list into fixed-size chunks and fanning the chunks out over tokio
//! tasks. Classification is per-member and members share no mutable
//! state, so partitions are independent; results land in a `DashMap`
//! keyed by partition index and are merged back in order, which keeps
//! the output byte-identical to the sequential engine.

use std::sync::Arc;

use dashmap::DashMap;
use log::warn;

use crate::config::ReconConfig;
use crate::core::engine::{assign_by_member, check_preconditions, ReconciliationEngine};
use crate::core::resolver::ResolutionPlan;
use crate::types::{Booking, Member, Payment, ReconError, ReconciliationResult};

/// Tuning knobs for the parallel engine
#[derive(Debug, Clone, Copy)]
pub struct PartitionConfig {
    /// Members per spawned task
    pub partition_size: usize,
    /// Maximum tasks classifying at once
    pub max_concurrent: usize,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        PartitionConfig {
            partition_size: 64,
            max_concurrent: num_cpus::get(),
        }
    }
}

impl PartitionConfig {
    /// Replace zero values with defaults; zero would stall or divide
    /// the work into nothing
    pub fn validated(self) -> Self {
        let defaults = PartitionConfig::default();
        let mut config = self;
        if config.partition_size == 0 {
            warn!(
                "partition size 0 is invalid, falling back to {}",
                defaults.partition_size
            );
            config.partition_size = defaults.partition_size;
        }
        if config.max_concurrent == 0 {
            warn!(
                "max concurrent 0 is invalid, falling back to {}",
                defaults.max_concurrent
            );
            config.max_concurrent = defaults.max_concurrent;
        }
        config
    }
}

/// Concurrent counterpart of [`ReconciliationEngine`]
///
/// Produces exactly the same results in exactly the same order; only
/// the classification work is parallelized.
pub struct AsyncReconEngine {
    config: Arc<ReconConfig>,
    partition: PartitionConfig,
}

impl AsyncReconEngine {
    pub fn new(config: Arc<ReconConfig>, partition: PartitionConfig) -> Self {
        AsyncReconEngine {
            config,
            partition: partition.validated(),
        }
    }

    /// Classify every member and unresolved record, members in parallel
    ///
    /// # Errors
    ///
    /// Same precondition errors as the sequential engine, plus
    /// [`ReconError::Precondition`] if a worker task panics.
    pub async fn reconcile(
        &self,
        members: Arc<Vec<Member>>,
        payments: Arc<Vec<Payment>>,
        bookings: Arc<Vec<Booking>>,
        plan: &ResolutionPlan,
    ) -> Result<Vec<ReconciliationResult>, ReconError> {
        check_preconditions(&members, &payments, &bookings, plan)?;
        let (work, unresolved) = assign_by_member(&members, &payments, &bookings, plan)?;
        let work = Arc::new(work);

        let mut member_order: Vec<usize> = (0..members.len()).collect();
        member_order.sort_by(|&a, &b| members[a].id.cmp(&members[b].id));

        let partitions: Vec<Vec<usize>> = member_order
            .chunks(self.partition.partition_size)
            .map(|chunk| chunk.to_vec())
            .collect();
        let partition_count = partitions.len();
        let classified: Arc<DashMap<usize, Vec<ReconciliationResult>>> =
            Arc::new(DashMap::with_capacity(partition_count));

        // Spawn in waves of max_concurrent; each wave joins before the
        // next starts.
        let mut numbered: Vec<(usize, Vec<usize>)> = partitions.into_iter().enumerate().collect();
        for wave in numbered.chunks_mut(self.partition.max_concurrent) {
            let mut handles = Vec::with_capacity(wave.len());
            for (pidx, indices) in wave.iter_mut() {
                let pidx = *pidx;
                let indices = std::mem::take(indices);
                let members = Arc::clone(&members);
                let payments = Arc::clone(&payments);
                let bookings = Arc::clone(&bookings);
                let work = Arc::clone(&work);
                let config = Arc::clone(&self.config);
                let classified = Arc::clone(&classified);

                handles.push(tokio::spawn(async move {
                    let engine = ReconciliationEngine::new(&config);
                    let mut out = Vec::with_capacity(indices.len());
                    for idx in indices {
                        let member = &members[idx];
                        let member_payments: Vec<&Payment> =
                            work[idx].payment_idx.iter().map(|&i| &payments[i]).collect();
                        let member_bookings: Vec<&Booking> =
                            work[idx].booking_idx.iter().map(|&i| &bookings[i]).collect();
                        out.push(engine.classify_member(member, &member_payments, &member_bookings));
                    }
                    classified.insert(pidx, out);
                }));
            }
            for handle in handles {
                handle
                    .await
                    .map_err(|e| ReconError::precondition(&format!("worker task failed: {}", e)))?;
            }
        }

        // Merge partitions back in order, then append the unresolved
        // results the same way the sequential engine does.
        let mut results = Vec::with_capacity(members.len() + unresolved.len());
        for pidx in 0..partition_count {
            if let Some((_, mut chunk)) = classified.remove(&pidx) {
                results.append(&mut chunk);
            }
        }
        results.extend(unresolved);
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::resolver::IdentityResolver;
    use crate::types::member::composite_key;
    use crate::types::{FeePeriod, MembershipInterval, MembershipStatus};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn member(id: &str, name: &str) -> Member {
        Member {
            id: id.to_string(),
            display_name: name.to_string(),
            composite_key: composite_key(name, None),
            contact: None,
            tier: None,
            status: MembershipStatus::Active,
            intervals: vec![MembershipInterval {
                start: date(2023, 1, 1),
                end: date(2023, 12, 31),
            }],
        }
    }

    fn payment(line: u64, id: &str) -> Payment {
        Payment {
            line,
            member_id: Some(id.to_string()),
            name: None,
            contact: None,
            amount: dec!(120.00),
            date: date(2023, 1, 5),
            period: FeePeriod {
                start: date(2023, 1, 1),
                end: date(2023, 12, 31),
            },
        }
    }

    fn booking(line: u64, id: &str) -> Booking {
        Booking {
            line,
            booking_id: None,
            member_id: Some(id.to_string()),
            name: None,
            contact: None,
            facility: Some("court 1".to_string()),
            date: date(2023, 6, 1),
            start_time: None,
            duration_minutes: 60,
        }
    }

    #[test]
    fn partition_config_zero_falls_back_to_defaults() {
        let config = PartitionConfig {
            partition_size: 0,
            max_concurrent: 0,
        }
        .validated();
        assert_eq!(
            config.partition_size,
            PartitionConfig::default().partition_size
        );
        assert!(config.max_concurrent > 0);
    }

    #[tokio::test]
    async fn empty_inputs_produce_empty_results() {
        let engine = AsyncReconEngine::new(
            Arc::new(ReconConfig::default()),
            PartitionConfig::default(),
        );
        let results = engine
            .reconcile(
                Arc::new(vec![]),
                Arc::new(vec![]),
                Arc::new(vec![]),
                &ResolutionPlan::default(),
            )
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn matches_sequential_engine_output() {
        // enough members to span several small partitions
        let members: Vec<Member> = (0..25)
            .map(|i| member(&format!("M-{:03}", i), &format!("Member Number{}", i)))
            .collect();
        // pay even members only; odd ones come out unpaid
        let payments: Vec<Payment> = (0..25)
            .step_by(2)
            .map(|i| payment(2 + i as u64, &format!("M-{:03}", i)))
            .collect();
        let bookings: Vec<Booking> = (0..25)
            .map(|i| booking(2 + i as u64, &format!("M-{:03}", i)))
            .collect();

        let config = ReconConfig::default();
        let resolver = IdentityResolver::new(&members, config.fuzzy_threshold);
        let plan = resolver.resolve(&payments, &bookings);

        let sequential = ReconciliationEngine::new(&config)
            .reconcile(&members, &payments, &bookings, &plan)
            .unwrap();

        let engine = AsyncReconEngine::new(
            Arc::new(config),
            PartitionConfig {
                partition_size: 4,
                max_concurrent: 3,
            },
        );
        let parallel = engine
            .reconcile(
                Arc::new(members),
                Arc::new(payments),
                Arc::new(bookings),
                &plan,
            )
            .await
            .unwrap();

        assert_eq!(sequential, parallel);
    }

    #[tokio::test]
    async fn misaligned_plan_is_rejected() {
        let engine = AsyncReconEngine::new(
            Arc::new(ReconConfig::default()),
            PartitionConfig::default(),
        );
        let err = engine
            .reconcile(
                Arc::new(vec![member("M-1", "Alice Smith")]),
                Arc::new(vec![payment(2, "M-1")]),
                Arc::new(vec![]),
                &ResolutionPlan::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ReconError::Precondition { .. }));
    }
}
