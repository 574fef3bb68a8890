// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Tunniste - Two-Tier Scheduler
 * URL worker pool fanning out to a single shared rule worker pool
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary - Enterprise Edition
 */

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::TargetCache;
use crate::matcher;
use crate::rules::model::Finger;
use crate::types::{BaseInfo, FingerMatch};

/// Atomic task counters exported through [`RulePool::stats`].
#[derive(Debug, Default)]
pub struct PoolStats {
    total_tasks: AtomicU64,
    completed_tasks: AtomicU64,
    failed_tasks: AtomicU64,
}

/// Point-in-time snapshot of the pool counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStatsSnapshot {
    pub total_tasks: u64,
    pub completed_tasks: u64,
    pub failed_tasks: u64,
}

impl PoolStats {
    fn snapshot(&self) -> PoolStatsSnapshot {
        PoolStatsSnapshot {
            total_tasks: self.total_tasks.load(Ordering::Relaxed),
            completed_tasks: self.completed_tasks.load(Ordering::Relaxed),
            failed_tasks: self.failed_tasks.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        self.total_tasks.store(0, Ordering::Relaxed);
        self.completed_tasks.store(0, Ordering::Relaxed);
        self.failed_tasks.store(0, Ordering::Relaxed);
    }
}

/// One (target, finger) evaluation submitted to the rule pool.
pub struct RuleTask {
    pub finger: Arc<Finger>,
    pub target: String,
    pub base_info: Arc<BaseInfo>,
    pub cache: Arc<TargetCache>,
    pub proxy: String,
    pub timeout: Duration,
}

/// The process-wide rule worker pool, shared by every URL worker.
///
/// Permits are pre-allocated; submission blocks while the pool is
/// saturated, so bursty fan-out queues instead of thrashing.
pub struct RulePool {
    semaphore: Arc<Semaphore>,
    stats: Arc<PoolStats>,
    worker_count: usize,
}

impl RulePool {
    pub fn new(worker_count: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(worker_count)),
            stats: Arc::new(PoolStats::default()),
            worker_count,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Submit one rule task. Returns a handle that resolves to the match,
    /// or `None` when submission persistently fails (the failure counter
    /// accounts for it; the caller just moves on).
    pub async fn submit(&self, task: RuleTask) -> Option<JoinHandle<Option<FingerMatch>>> {
        self.stats.total_tasks.fetch_add(1, Ordering::Relaxed);

        let permit = match self.semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                // Pool released under us; one cheap retry, then give up.
                tokio::time::sleep(Duration::from_millis(1)).await;
                match self.semaphore.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        warn!(finger = %task.finger.id, "rule pool closed, task dropped");
                        self.stats.failed_tasks.fetch_add(1, Ordering::Relaxed);
                        return None;
                    }
                }
            }
        };

        let stats = Arc::clone(&self.stats);
        Some(tokio::spawn(async move {
            let _permit = permit;
            let result = matcher::evaluate_finger(
                &task.finger,
                &task.target,
                &task.base_info,
                &task.cache,
                &task.proxy,
                task.timeout,
            )
            .await;

            match result {
                Ok(finger_match) => {
                    stats.completed_tasks.fetch_add(1, Ordering::Relaxed);
                    if finger_match.result {
                        debug!(finger = %finger_match.finger.id, target = %task.target, "fingerprint matched");
                        Some(finger_match)
                    } else {
                        None
                    }
                }
                Err(err) => {
                    debug!(finger = %task.finger.id, error = %err, "rule task failed");
                    stats.failed_tasks.fetch_add(1, Ordering::Relaxed);
                    None
                }
            }
        }))
    }

    /// Release the pool: pending `submit` calls fail their retry and count
    /// as failed tasks.
    pub fn release(&self) {
        self.semaphore.close();
    }

    pub fn stats(&self) -> PoolStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn reset_stats(&self) {
        self.stats.reset();
    }
}

/// Admission control for the outer URL pool: one permit per in-flight
/// target, bounded by the target list length.
pub fn url_pool_semaphore(worker_count: usize, target_count: usize) -> Arc<Semaphore> {
    Arc::new(Semaphore::new(worker_count.min(target_count).max(1)))
}
