//! Priority executor: resolves one `(request, collector_type)` pair down a
//! priority-ordered, fallback chain of providers. Grounded in the host's
//! `process_request` (`clients/ai_provider/mod.rs`) — provider detection,
//! semaphore acquisition, and metrics bookkeeping around a single call —
//! generalized from "one provider, no fallback" to a priority chain.
//!
//! Retrying a failed chain as a whole, and circuit-breaking it, is the
//! caller's job (`retry::with_retry_and_circuit_breaker`); this module tries
//! each enabled provider exactly once per invocation.

use crate::adapters::{AdapterOutcome, AdapterRequest};
use crate::core::state::SharedState;
use answer_types::collector_config::CollectorConfig;
use answer_types::error::{CollectorError, ErrorKind};
use answer_types::execution::Attempt;
use answer_types::request::Request;
use answer_types::store::{CollectorResultPatch, ExecutionPatch};
use chrono::Utc;
use std::time::Duration;
use tracing::{info, warn};

/// Scraper-poller providers get a long effective timeout to cover the
/// polling window rather than the provider's own `timeout_ms`.
const SCRAPER_POLL_TIMEOUT: Duration = Duration::from_secs(10 * 60);

pub struct ExecutionOutcome {
    pub fallback_used: bool,
    pub fallback_chain: Vec<String>,
}

/// Runs the fallback chain for `collector_type` against `request`, driving
/// the Execution/CollectorResult pair through the state manager as it goes.
pub async fn execute(
    state: &SharedState,
    request: &Request,
    collector_type: &str,
    collector_config: &CollectorConfig,
    execution_id: answer_types::ids::ExecutionId,
) -> Result<ExecutionOutcome, CollectorError> {
    let providers = collector_config.sorted_providers();
    if providers.is_empty() {
        return Err(CollectorError::new(
            ErrorKind::ConfigurationMissing,
            format!("no enabled providers configured for collector '{collector_type}'"),
        ));
    }

    state
        .store
        .update_execution(
            execution_id,
            ExecutionPatch {
                status: Some(answer_types::execution::ExecutionStatus::Running),
                ..Default::default()
            },
        )
        .await
        .map_err(|e| CollectorError::new(ErrorKind::Unknown, e.message))?;

    let mut fallback_chain = Vec::new();
    let mut last_err: Option<CollectorError> = None;

    for (index, provider) in providers.iter().enumerate() {
        let Some(adapter) = state.adapters.get(&provider.name) else {
            warn!(provider = %provider.name, "no registered adapter for configured provider");
            last_err = Some(CollectorError::new(
                ErrorKind::ConfigurationMissing,
                format!("provider '{}' has no registered adapter", provider.name),
            ));
            continue;
        };

        let timeout = if adapter.is_async() {
            SCRAPER_POLL_TIMEOUT
        } else {
            Duration::from_millis(provider.timeout_ms)
        };

        let adapter_req = AdapterRequest {
            prompt: request.query_text.clone(),
            brand: None,
            locale: request.locale.clone(),
            country: request.country.clone(),
            collector_type: collector_type.to_string(),
        };

        info!(provider = %provider.name, attempt = index + 1, "calling provider adapter");
        let call_result = tokio::time::timeout(timeout, adapter.call(&adapter_req)).await;

        let outcome = match call_result {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                record_attempt_failure(state, execution_id, &e).await;
                fallback_chain.push(provider.name.clone());
                last_err = Some(e);
                if !provider.fallback_on_failure {
                    break;
                }
                continue;
            }
            Err(_) => {
                let e = CollectorError::new(ErrorKind::Timeout, format!("{} timed out after {timeout:?}", provider.name));
                record_attempt_failure(state, execution_id, &e).await;
                fallback_chain.push(provider.name.clone());
                last_err = Some(e);
                if !provider.fallback_on_failure {
                    break;
                }
                continue;
            }
        };

        fallback_chain.push(provider.name.clone());

        match outcome {
            AdapterOutcome::Sync(answer) => {
                state
                    .metrics
                    .executions_completed
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                finalize_sync_answer(state, execution_id, answer).await?;
                return Ok(ExecutionOutcome {
                    fallback_used: fallback_chain.len() > 1,
                    fallback_chain,
                });
            }
            AdapterOutcome::AsyncSubmitted { snapshot_id, raw } => {
                state
                    .store
                    .update_execution(
                        execution_id,
                        ExecutionPatch {
                            brightdata_snapshot_id: Some(snapshot_id.clone()),
                            ..Default::default()
                        },
                    )
                    .await
                    .map_err(|e| CollectorError::new(ErrorKind::Unknown, e.message))?;
                state
                    .store
                    .upsert_collector_result_by_execution(
                        execution_id,
                        CollectorResultPatch {
                            brightdata_snapshot_id: Some(snapshot_id.clone()),
                            raw_response_json: Some(raw),
                            ..Default::default()
                        },
                    )
                    .await
                    .map_err(|e| CollectorError::new(ErrorKind::Unknown, e.message))?;
                crate::poller::spawn_snapshot_poll(
                    state.clone(),
                    adapter.clone(),
                    execution_id,
                    snapshot_id,
                    collector_type.to_string(),
                );
                // Success for the executor's purposes: the poller finalizes.
                return Ok(ExecutionOutcome {
                    fallback_used: fallback_chain.len() > 1,
                    fallback_chain,
                });
            }
        }
    }

    Err(last_err.unwrap_or_else(|| {
        CollectorError::new(ErrorKind::Unknown, "fallback chain exhausted with no recorded error")
    }))
}

async fn record_attempt_failure(state: &SharedState, execution_id: answer_types::ids::ExecutionId, error: &CollectorError) {
    let attempt = Attempt {
        attempt_number: error.attempt.unwrap_or(1),
        timestamp: Utc::now(),
        error_type: format!("{:?}", error.kind),
        retryable: error.retryable(),
    };
    let _ = state
        .store
        .update_execution(
            execution_id,
            ExecutionPatch {
                append_attempt: Some(attempt),
                error_message: Some(error.message.clone()),
                ..Default::default()
            },
        )
        .await;
}

async fn finalize_sync_answer(
    state: &SharedState,
    execution_id: answer_types::ids::ExecutionId,
    answer: crate::adapters::NormalizedAnswer,
) -> Result<(), CollectorError> {
    let state_manager = crate::state_manager::StateManager::new(state.store.clone());
    state_manager
        .finalize_success(
            execution_id,
            CollectorResultPatch {
                raw_answer: Some(answer.answer),
                citations: Some(answer.citations),
                urls: Some(answer.urls),
                ..Default::default()
            },
            Some(answer.metadata),
        )
        .await
        .map_err(|e| CollectorError::new(ErrorKind::Unknown, e.message))?;
    crate::scoring::maybe_handoff(state, execution_id).await;
    Ok(())
}
