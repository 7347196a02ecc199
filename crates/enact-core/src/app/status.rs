//! Status - worker pool のカウンタ
//!
//! `PoolCounters` はワーカー間で共有する atomic カウンタ、
//! `PoolCounts` は外に出すためのスナップショット。

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolCounts {
    /// Accepted and waiting for a worker.
    pub queued: u64,
    /// Currently inside a dispatch loop.
    pub in_flight: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Terminal outcomes the store refused to take.
    pub commit_failures: u64,
    /// Submissions turned away (queue full or shutting down).
    pub rejected_submissions: u64,
}

#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    pub(crate) queued: AtomicU64,
    pub(crate) in_flight: AtomicU64,
    pub(crate) succeeded: AtomicU64,
    pub(crate) failed: AtomicU64,
    pub(crate) commit_failures: AtomicU64,
    pub(crate) rejected_submissions: AtomicU64,
}

impl PoolCounters {
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn decr(counter: &AtomicU64) {
        // saturating: a racing snapshot must never see a wrapped value
        let _ = counter.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
            Some(v.saturating_sub(1))
        });
    }

    pub(crate) fn snapshot(&self) -> PoolCounts {
        PoolCounts {
            queued: self.queued.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            commit_failures: self.commit_failures.load(Ordering::Relaxed),
            rejected_submissions: self.rejected_submissions.load(Ordering::Relaxed),
        }
    }
}
