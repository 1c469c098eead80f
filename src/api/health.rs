//! Shared counters for the /health endpoint. Updated after every scoring run.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Default)]
pub struct HealthState {
    /// Scoring runs that completed successfully.
    pub runs_completed: AtomicU64,
    /// Runs rejected with an error.
    pub runs_failed: AtomicU64,
    /// Nanosecond timestamp of the last completed run (0 = none).
    pub last_run_at_ns: AtomicU64,
    /// Pair count of the last completed run, before truncation.
    pub last_pair_count: AtomicU64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_run(&self, pair_count: usize) {
        self.runs_completed.fetch_add(1, Ordering::Relaxed);
        self.last_run_at_ns.store(now_ns(), Ordering::Relaxed);
        self.last_pair_count.store(pair_count as u64, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.runs_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn runs_completed(&self) -> u64 {
        self.runs_completed.load(Ordering::Relaxed)
    }

    pub fn runs_failed(&self) -> u64 {
        self.runs_failed.load(Ordering::Relaxed)
    }

    pub fn last_run_at_ns(&self) -> u64 {
        self.last_run_at_ns.load(Ordering::Relaxed)
    }

    pub fn last_pair_count(&self) -> u64 {
        self.last_pair_count.load(Ordering::Relaxed)
    }
}

pub fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_updates_counters() {
        let h = HealthState::new();
        assert_eq!(h.runs_completed(), 0);
        assert_eq!(h.last_run_at_ns(), 0);

        h.record_run(12);
        h.record_failure();
        assert_eq!(h.runs_completed(), 1);
        assert_eq!(h.runs_failed(), 1);
        assert_eq!(h.last_pair_count(), 12);
        assert!(h.last_run_at_ns() > 0);
    }
}
