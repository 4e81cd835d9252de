//! Snapshot poller: background finalization for providers that submit a
//! scrape job and return a `snapshot_id` instead of an immediate answer.
//! The "spawn and forget, but log structurally" task shape is grounded in
//! the host's `spawn_heartbeat_task` (`lifecycle/heartbeat.rs`, now removed
//! from this tree but captured here): a `tokio::spawn`ed
//! `tokio::time::interval` loop bounded by a max-attempts counter and a
//! shutdown flag, instrumented with a span per snapshot.

use crate::adapters::ProviderAdapter;
use crate::core::state::SharedState;
use crate::state_manager::StateManager;
use answer_types::store::CollectorResultPatch;
use answer_types::ids::ExecutionId;
use std::sync::atomic::Ordering as AtomicOrdering;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, info_span, warn, Instrument};

/// Spawns the background poll loop for one snapshot and returns its handle
/// so a caller that wants to wait for in-flight polls (e.g. during
/// orchestrator shutdown) can `join` it; callers that don't care can drop it.
pub fn spawn_snapshot_poll(
    state: SharedState,
    adapter: Arc<dyn ProviderAdapter>,
    execution_id: ExecutionId,
    snapshot_id: String,
    collector_type: String,
) -> JoinHandle<()> {
    let span = info_span!("snapshot_poll", %snapshot_id, collector_type = %collector_type);
    tokio::spawn(
        async move {
            run_poll_loop(state, adapter, execution_id, snapshot_id).await;
        }
        .instrument(span),
    )
}

async fn run_poll_loop(
    state: SharedState,
    adapter: Arc<dyn ProviderAdapter>,
    execution_id: ExecutionId,
    snapshot_id: String,
) {
    let max_attempts = adapter.poll_max_attempts().unwrap_or(state.config.snapshot_poll_max_attempts);
    let mut interval = tokio::time::interval(adapter.poll_interval().unwrap_or(state.config.snapshot_poll_interval));
    interval.tick().await;

    let breaker_key = format!("poller:{}", adapter.name());
    let reset_timeout = chrono::Duration::from_std(state.config.circuit_breaker_reset_timeout).unwrap_or_default();

    for attempt in 1..=max_attempts {
        interval.tick().await;
        if state.is_shutting_down() {
            info!("poller stopping early: shutdown in progress");
            return;
        }

        let admitted = state
            .circuit_breakers
            .with_entry(&breaker_key, |cb| cb.allow_request(reset_timeout));
        if !admitted {
            warn!(attempt, "poller circuit open, skipping this tick");
            continue;
        }

        match adapter.poll_snapshot(&snapshot_id).await {
            Ok(Some(answer)) => {
                state
                    .circuit_breakers
                    .with_entry(&breaker_key, |cb| cb.record_success());
                finalize(&state, execution_id, answer).await;
                return;
            }
            Ok(None) => {
                info!(attempt, "snapshot not ready yet");
            }
            Err(e) => {
                warn!(attempt, error = %e, "snapshot poll attempt failed");
                state
                    .circuit_breakers
                    .with_entry(&breaker_key, |cb| cb.record_failure(state.config.circuit_breaker_threshold));
                if !e.retryable() {
                    fail(&state, execution_id, &e.message).await;
                    return;
                }
            }
        }
    }

    warn!(max_attempts, "snapshot poll exhausted without finalizing");
    fail(&state, execution_id, "timeout").await;
}

async fn finalize(state: &SharedState, execution_id: ExecutionId, answer: crate::adapters::NormalizedAnswer) {
    let collection_time_ms = compute_collection_time_ms(state, execution_id).await;
    let state_manager = StateManager::new(state.store.clone());
    let patch = CollectorResultPatch {
        raw_answer: Some(answer.answer),
        citations: Some(answer.citations),
        urls: Some(answer.urls),
        collection_time_ms,
        ..Default::default()
    };
    if let Err(e) = state_manager
        .finalize_success(execution_id, patch, Some(answer.metadata))
        .await
    {
        warn!(%execution_id, error = %e, "failed to finalize polled snapshot");
        return;
    }
    crate::scoring::maybe_handoff(state, execution_id).await;
    state
        .metrics
        .snapshots_finalized
        .fetch_add(1, AtomicOrdering::Relaxed);
}

async fn fail(state: &SharedState, execution_id: ExecutionId, reason: &str) {
    let state_manager = StateManager::new(state.store.clone());
    if let Err(e) = state_manager.finalize_failure(execution_id, reason).await {
        warn!(%execution_id, error = %e, "failed to record snapshot poll failure");
    }
    state
        .metrics
        .executions_failed
        .fetch_add(1, AtomicOrdering::Relaxed);
}

async fn compute_collection_time_ms(state: &SharedState, execution_id: ExecutionId) -> Option<u64> {
    let execution = state.store.get_execution(execution_id).await.ok().flatten()?;
    let first_transition_at = execution
        .metadata
        .get("status_transitions")
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .and_then(|entry| entry.get("at"))
        .and_then(|v| v.as_str())
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok());

    first_transition_at.map(|start| {
        let elapsed = chrono::Utc::now().signed_duration_since(start.with_timezone(&chrono::Utc));
        elapsed.num_milliseconds().max(0) as u64
    })
}
