//! Batch orchestrator: fans a sequence of `Request`s out across collectors,
//! batching to bound concurrency and spacing batches to avoid synchronized
//! bursts. The `batch_size`-sized `Semaphore` and all-settled fan-out
//! pattern are grounded in the host's single `AppState::request_semaphore`
//! gate around `process_request` (`clients/ai_provider/mod.rs`),
//! generalized from one provider call to one collector's fallback chain.

use crate::core::state::SharedState;
use crate::executor::{self, ExecutionOutcome};
use crate::retry::{with_retry_and_circuit_breaker, CircuitBreakerRegistry};
use crate::state_manager::StateManager;
use answer_types::collector_config::CollectorConfig;
use answer_types::collector_result::{CollectorResult, CollectorResultStatus};
use answer_types::error::CollectorError;
use answer_types::execution::{Execution, ExecutionStatus};
use answer_types::ids::QueryId;
use answer_types::request::Request;
use chrono::Utc;
use futures::future::FutureExt;
use serde_json::Map;
use std::collections::HashMap;
use std::sync::atomic::Ordering as AtomicOrdering;
use tracing::{info, warn};

pub struct CollectorRunResult {
    pub query_id: QueryId,
    pub collector_type: String,
    pub outcome: Result<ExecutionOutcome, CollectorError>,
}

pub struct Orchestrator {
    state: SharedState,
}

impl Orchestrator {
    pub fn new(state: SharedState) -> Self {
        Orchestrator { state }
    }

    /// Runs `requests` in batches of `config.batch_size`, sleeping
    /// `inter_batch_delay` between batches. All-settled: a failed collector
    /// never cancels sibling work.
    pub async fn run_batches(
        &self,
        requests: Vec<Request>,
        collector_configs: &HashMap<String, CollectorConfig>,
    ) -> Vec<CollectorRunResult> {
        let mut results = Vec::new();
        let batch_size = self.state.config.batch_size.max(1);
        let batches: Vec<Vec<Request>> = requests
            .chunks(batch_size)
            .map(|chunk| chunk.to_vec())
            .collect();
        let total_batches = batches.len();

        for (batch_index, batch) in batches.into_iter().enumerate() {
            if self.state.is_shutting_down() {
                warn!("orchestrator stopping: shutdown requested before batch {batch_index}");
                break;
            }
            info!(batch_index, size = batch.len(), "starting batch");

            let mut request_futures = Vec::new();
            for request in batch {
                request_futures.push(self.run_request(request, collector_configs));
            }
            let batch_results: Vec<Vec<CollectorRunResult>> = futures::future::join_all(request_futures).await;
            results.extend(batch_results.into_iter().flatten());

            let state_manager = StateManager::new(self.state.store.clone());
            match state_manager.reconcile().await {
                Ok(fixed) if fixed > 0 => info!(batch_index, fixed, "reconciliation sweep fixed stuck executions"),
                Ok(_) => {}
                Err(e) => warn!(batch_index, error = %e, "reconciliation sweep failed"),
            }

            if batch_index + 1 < total_batches {
                tokio::time::sleep(self.state.config.inter_batch_delay).await;
            }
        }

        results
    }

    /// Runs every enabled collector for one request concurrently.
    async fn run_request(
        &self,
        request: Request,
        collector_configs: &HashMap<String, CollectorConfig>,
    ) -> Vec<CollectorRunResult> {
        let _permit = self.state.request_semaphore.clone().acquire_owned().await;
        self.state
            .metrics
            .requests_total
            .fetch_add(1, AtomicOrdering::Relaxed);
        self.state.metrics.record_active_delta(1);

        let breaker_key = CircuitBreakerRegistry::key_for(&request.collectors);
        let mut collector_futures = Vec::new();
        for collector_type in &request.collectors {
            let Some(config) = collector_configs.get(collector_type) else {
                collector_futures.push(futures::future::ready(CollectorRunResult {
                    query_id: request.query_id,
                    collector_type: collector_type.clone(),
                    outcome: Err(CollectorError::new(
                        answer_types::error::ErrorKind::ConfigurationMissing,
                        format!("no CollectorConfig registered for '{collector_type}'"),
                    )),
                }).left_future());
                continue;
            };
            collector_futures.push(
                self.run_collector(&request, collector_type.clone(), config.clone(), &breaker_key)
                    .right_future(),
            );
        }

        let outcomes = futures::future::join_all(collector_futures).await;
        self.state.metrics.record_active_delta(-1);
        outcomes
    }

    async fn run_collector(
        &self,
        request: &Request,
        collector_type: String,
        collector_config: CollectorConfig,
        breaker_key: &str,
    ) -> CollectorRunResult {
        let state_manager = StateManager::new(self.state.store.clone());
        let (brand, competitors) = self.resolve_brand(request.brand_id).await;
        let topic = self.resolve_topic(request.query_id).await;
        let now = Utc::now();
        let mut metadata = Map::new();
        metadata.insert("suppress_scoring".to_string(), request.suppress_scoring.into());
        let execution = Execution {
            id: answer_types::ids::ExecutionId(0),
            query_id: request.query_id,
            brand_id: request.brand_id,
            customer_id: request.customer_id,
            collector_type: collector_type.clone(),
            status: ExecutionStatus::Pending,
            brightdata_snapshot_id: None,
            error_message: None,
            error_metadata: None,
            retry_count: 0,
            retry_history: Vec::new(),
            metadata,
            created_at: now,
            updated_at: now,
        };
        let result = CollectorResult {
            id: answer_types::ids::CollectorResultId(0),
            query_id: request.query_id,
            execution_id: None,
            collector_type: collector_type.clone(),
            raw_answer: String::new(),
            citations: Vec::new(),
            urls: Vec::new(),
            brand,
            question: Some(request.query_text.clone()),
            competitors,
            topic,
            collection_time_ms: None,
            status: CollectorResultStatus::Processing,
            brightdata_snapshot_id: None,
            raw_response_json: None,
            metadata: Map::new(),
            error_message: None,
        };

        let (execution_id, _) = match state_manager.create(execution, result).await {
            Ok(ids) => ids,
            Err(e) => {
                return CollectorRunResult {
                    query_id: request.query_id,
                    collector_type,
                    outcome: Err(CollectorError::new(answer_types::error::ErrorKind::Unknown, e.message)),
                };
            }
        };

        let config = self.state.config.as_ref();
        let breakers = &self.state.circuit_breakers;
        let state = &self.state;
        let outcome = with_retry_and_circuit_breaker(config, breakers, breaker_key, |attempt| {
            let state = state.clone();
            let request = request.clone();
            let collector_type = collector_type.clone();
            let collector_config = collector_config.clone();
            async move {
                let result = executor::execute(&state, &request, &collector_type, &collector_config, execution_id).await;
                if result.is_err() {
                    state.metrics.retries_performed.fetch_add(1, AtomicOrdering::Relaxed);
                }
                let _ = attempt;
                result
            }
        })
        .await;

        if outcome.is_err() {
            self.state
                .metrics
                .executions_failed
                .fetch_add(1, AtomicOrdering::Relaxed);
            let reason = outcome.as_ref().err().map(|e| e.message.clone()).unwrap_or_default();
            let _ = state_manager.finalize_failure(execution_id, &reason).await;
        }

        CollectorRunResult {
            query_id: request.query_id,
            collector_type,
            outcome,
        }
    }

    /// Resolves the brand's display name and competitor set via
    /// `BrandMetadataReader` (§6.1), once per collector run so the stored
    /// `CollectorResult` carries the name the trait exists to provide rather
    /// than the raw id. Absent reader or failed lookup degrades to `None`/
    /// empty, matching `scoring::maybe_handoff`'s degrade-on-absence pattern.
    async fn resolve_brand(&self, brand_id: answer_types::ids::BrandId) -> (Option<String>, Vec<String>) {
        let Some(reader) = self.state.brand_reader.as_ref() else {
            return (None, Vec::new());
        };
        let name = reader.get_brand_name(brand_id).await;
        let competitors = reader.get_competitors(brand_id).await;
        (name, competitors)
    }

    /// Resolves the query's topic via `QueryMetadataReader` (§6.1). Resolved
    /// once here, at `CollectorResult` creation, rather than deferred to
    /// poller finalization, since the topic doesn't change across a
    /// collector's retries and a single lookup keeps it in one place.
    async fn resolve_topic(&self, query_id: QueryId) -> Option<String> {
        let reader = self.state.query_reader.as_ref()?;
        reader.get_query(query_id).await.and_then(|meta| meta.topic)
    }
}
