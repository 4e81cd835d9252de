use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide counters for orchestrator runs. Informational only; nothing
/// here gates request admission (see `health.rs` for the same rule applied
/// to provider liveness).
#[derive(Default)]
pub struct Metrics {
    pub requests_total: AtomicU64,
    pub executions_completed: AtomicU64,
    pub executions_failed: AtomicU64,
    pub retries_performed: AtomicU64,
    pub circuit_breaker_trips: AtomicU64,
    pub snapshots_finalized: AtomicU64,
    pub current_active_executions: AtomicU64,
    pub peak_concurrent_executions: AtomicU64,
    pub batch_size_limit: AtomicU64,
}

impl Metrics {
    pub fn record_active_delta(&self, delta: i64) {
        let new_val = if delta >= 0 {
            self.current_active_executions
                .fetch_add(delta as u64, Ordering::Relaxed)
                + delta as u64
        } else {
            self.current_active_executions
                .fetch_sub((-delta) as u64, Ordering::Relaxed)
                .saturating_sub((-delta) as u64)
        };
        self.peak_concurrent_executions
            .fetch_max(new_val, Ordering::Relaxed);
    }
}
