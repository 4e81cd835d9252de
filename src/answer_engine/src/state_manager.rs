//! Durable state manager: creates and transitions the paired `Execution`
//! and `CollectorResult` records, and runs the post-batch reconciliation
//! sweep. Grounded in the host's `claim_job`/`complete_job` RPC pair
//! (`clients/canister/conversation.rs`), generalized from a single
//! canister-call to an injected `CollectorStore`.

use answer_types::collector_result::{CollectorResult, CollectorResultStatus};
use answer_types::error::StoreError;
use answer_types::execution::{Execution, ExecutionStatus};
use answer_types::ids::{CollectorResultId, ExecutionId};
use answer_types::store::{CollectorResultPatch, CollectorStore, ExecutionPatch};
use serde_json::Map;
use std::sync::Arc;
use tracing::{info, warn};

/// Computes the `status_transitions`/`last_status_transition` metadata delta
/// for moving `current` to `to`, via `Execution::record_transition` on a
/// scratch clone so the bookkeeping logic lives in one place.
fn transition_metadata_merge(current: &Execution, to: ExecutionStatus, source: &str) -> Map<String, serde_json::Value> {
    let mut scratch = current.clone();
    scratch.record_transition(to, source, None);
    let mut merge = Map::new();
    if let Some(transitions) = scratch.metadata.get("status_transitions") {
        merge.insert("status_transitions".to_string(), transitions.clone());
    }
    if let Some(last) = scratch.metadata.get("last_status_transition") {
        merge.insert("last_status_transition".to_string(), last.clone());
    }
    merge
}

pub struct StateManager {
    store: Arc<dyn CollectorStore>,
}

impl StateManager {
    pub fn new(store: Arc<dyn CollectorStore>) -> Self {
        StateManager { store }
    }

    /// Inserts the Execution/CollectorResult pair for a fresh (request,
    /// collector) attempt.
    pub async fn create(
        &self,
        execution: Execution,
        mut result: CollectorResult,
    ) -> Result<(ExecutionId, CollectorResultId), StoreError> {
        let execution_id = self.store.insert_execution(execution).await?;
        result.execution_id = Some(execution_id);
        let result_id = self.store.insert_collector_result(result).await?;
        Ok((execution_id, result_id))
    }

    /// Validates and applies an Execution status transition. Downgrades a
    /// `Completed` target back to `Running` if the paired CollectorResult
    /// has no usable answer yet, preserving invariant 1.
    pub async fn transition(
        &self,
        execution_id: ExecutionId,
        to: ExecutionStatus,
        source: &str,
        mut patch: ExecutionPatch,
    ) -> Result<(), StoreError> {
        let Some(current) = self.store.get_execution(execution_id).await? else {
            return Err(StoreError::new(format!("execution {execution_id} not found")));
        };

        if current.status.is_terminal() {
            info!(%execution_id, status = ?current.status, "transition skipped, already terminal");
            return Ok(());
        }

        let effective_to = if to == ExecutionStatus::Completed {
            let ready = match self.store.get_collector_result_by_execution(execution_id).await {
                Ok(Some(r)) => r.is_ready(),
                _ => false,
            };
            if ready {
                ExecutionStatus::Completed
            } else {
                warn!(%execution_id, "downgrading completed transition: paired result has no answer yet");
                ExecutionStatus::Running
            }
        } else {
            to
        };

        patch.status = Some(effective_to);
        let mut merge = transition_metadata_merge(&current, effective_to, source);
        if let Some(existing) = patch.metadata_merge.take() {
            merge.extend(existing);
        }
        patch.metadata_merge = Some(merge);
        self.store.update_execution(execution_id, patch).await?;
        info!(%execution_id, from = ?current.status, to = ?effective_to, source, "execution transitioned");
        Ok(())
    }

    /// Idempotent finalization: upserts the terminal CollectorResult fields,
    /// then tolerates failure of the separate large-payload write.
    pub async fn finalize_success(
        &self,
        execution_id: ExecutionId,
        mut patch: CollectorResultPatch,
        raw_response_json: Option<serde_json::Value>,
    ) -> Result<(), StoreError> {
        patch.status = Some(CollectorResultStatus::Completed);
        self.store
            .upsert_collector_result_by_execution(execution_id, patch)
            .await?;

        self.transition(
            execution_id,
            ExecutionStatus::Completed,
            "state_manager::finalize_success",
            ExecutionPatch::default(),
        )
        .await?;

        if let Some(raw) = raw_response_json {
            let large_patch = CollectorResultPatch {
                raw_response_json: Some(raw),
                ..Default::default()
            };
            if let Err(e) = self
                .store
                .upsert_collector_result_by_execution(execution_id, large_patch)
                .await
            {
                warn!(%execution_id, error = %e, "raw_response_json write failed, essential fields preserved");
            }
        }

        Ok(())
    }

    pub async fn finalize_failure(&self, execution_id: ExecutionId, reason: &str) -> Result<(), StoreError> {
        self.store
            .upsert_collector_result_by_execution(
                execution_id,
                CollectorResultPatch {
                    status: Some(CollectorResultStatus::Failed),
                    error_message: Some(reason.to_string()),
                    ..Default::default()
                },
            )
            .await?;
        self.transition(
            execution_id,
            ExecutionStatus::Failed,
            "state_manager::finalize_failure",
            ExecutionPatch {
                error_message: Some(reason.to_string()),
                ..Default::default()
            },
        )
        .await
    }

    /// Startup/end-of-batch reconciliation sweep (spec §4.6, Open Question 1
    /// resolved "yes" in `DESIGN.md`): fixes executions left in an
    /// inconsistent state by a crash or a race between quick-poll and
    /// background-poll finalization.
    pub async fn reconcile(&self) -> Result<usize, StoreError> {
        let mut fixed = 0usize;
        for execution in self.store.list_non_terminal_executions().await? {
            let paired = self
                .store
                .get_collector_result_by_execution(execution.id)
                .await?;
            match (execution.status, paired.as_ref().map(|r| r.is_ready())) {
                (ExecutionStatus::Running, Some(true)) => {
                    self.transition(
                        execution.id,
                        ExecutionStatus::Completed,
                        "state_manager::reconcile",
                        ExecutionPatch::default(),
                    )
                    .await?;
                    fixed += 1;
                }
                (ExecutionStatus::Completed, Some(false)) | (ExecutionStatus::Completed, None) => {
                    self.store
                        .update_execution(
                            execution.id,
                            ExecutionPatch {
                                status: Some(ExecutionStatus::Running),
                                ..Default::default()
                            },
                        )
                        .await?;
                    fixed += 1;
                }
                _ => {}
            }
        }
        Ok(fixed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_store::InMemoryStore;
    use answer_types::collector_result::CollectorResultStatus;
    use answer_types::ids::{BrandId, CustomerId, QueryId};
    use serde_json::Map as JsonMap;

    fn fresh_execution() -> Execution {
        let now = chrono::Utc::now();
        Execution {
            id: ExecutionId(0),
            query_id: QueryId(1),
            brand_id: BrandId(1),
            customer_id: CustomerId(1),
            collector_type: "chatgpt".into(),
            status: ExecutionStatus::Pending,
            brightdata_snapshot_id: None,
            error_message: None,
            error_metadata: None,
            retry_count: 0,
            retry_history: Vec::new(),
            metadata: JsonMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn fresh_result(query_id: QueryId) -> CollectorResult {
        CollectorResult {
            id: CollectorResultId(0),
            query_id,
            execution_id: None,
            collector_type: "chatgpt".into(),
            raw_answer: String::new(),
            citations: Vec::new(),
            urls: Vec::new(),
            brand: None,
            question: None,
            competitors: Vec::new(),
            topic: None,
            collection_time_ms: None,
            status: CollectorResultStatus::Processing,
            brightdata_snapshot_id: None,
            raw_response_json: None,
            metadata: JsonMap::new(),
            error_message: None,
        }
    }

    #[tokio::test]
    async fn completing_without_an_answer_downgrades_to_running() {
        let store: Arc<dyn CollectorStore> = Arc::new(InMemoryStore::new());
        let manager = StateManager::new(store.clone());
        let (execution_id, _) = manager
            .create(fresh_execution(), fresh_result(QueryId(1)))
            .await
            .unwrap();

        manager
            .transition(execution_id, ExecutionStatus::Completed, "test", ExecutionPatch::default())
            .await
            .unwrap();

        let execution = store.get_execution(execution_id).await.unwrap().unwrap();
        assert_eq!(execution.status, ExecutionStatus::Running);
    }

    #[tokio::test]
    async fn transition_appends_a_status_transition_entry() {
        let store: Arc<dyn CollectorStore> = Arc::new(InMemoryStore::new());
        let manager = StateManager::new(store.clone());
        let (execution_id, _) = manager
            .create(fresh_execution(), fresh_result(QueryId(1)))
            .await
            .unwrap();

        manager
            .transition(execution_id, ExecutionStatus::Running, "test", ExecutionPatch::default())
            .await
            .unwrap();

        let execution = store.get_execution(execution_id).await.unwrap().unwrap();
        let transitions = execution
            .metadata
            .get("status_transitions")
            .and_then(|v| v.as_array())
            .unwrap();
        assert_eq!(transitions.len(), 1);
        assert!(execution.metadata.contains_key("last_status_transition"));
    }

    #[tokio::test]
    async fn terminal_executions_ignore_further_transitions() {
        let store: Arc<dyn CollectorStore> = Arc::new(InMemoryStore::new());
        let manager = StateManager::new(store.clone());
        let (execution_id, _) = manager
            .create(fresh_execution(), fresh_result(QueryId(1)))
            .await
            .unwrap();
        manager.finalize_failure(execution_id, "boom").await.unwrap();

        manager
            .transition(execution_id, ExecutionStatus::Running, "test", ExecutionPatch::default())
            .await
            .unwrap();

        let execution = store.get_execution(execution_id).await.unwrap().unwrap();
        assert_eq!(execution.status, ExecutionStatus::Failed);
    }

    #[tokio::test]
    async fn finalize_success_marks_both_records_completed() {
        let store: Arc<dyn CollectorStore> = Arc::new(InMemoryStore::new());
        let manager = StateManager::new(store.clone());
        let (execution_id, result_id) = manager
            .create(fresh_execution(), fresh_result(QueryId(1)))
            .await
            .unwrap();

        manager
            .finalize_success(
                execution_id,
                CollectorResultPatch {
                    raw_answer: Some("hello".into()),
                    ..Default::default()
                },
                Some(serde_json::json!({"raw": true})),
            )
            .await
            .unwrap();

        let execution = store.get_execution(execution_id).await.unwrap().unwrap();
        assert_eq!(execution.status, ExecutionStatus::Completed);
        let result = store.get_collector_result(result_id).await.unwrap().unwrap();
        assert_eq!(result.status, CollectorResultStatus::Completed);
        assert_eq!(result.raw_answer, "hello");
        assert!(result.raw_response_json.is_some());
    }

    #[tokio::test]
    async fn reconcile_promotes_running_execution_with_ready_result() {
        let store: Arc<dyn CollectorStore> = Arc::new(InMemoryStore::new());
        let manager = StateManager::new(store.clone());
        let (execution_id, _) = manager
            .create(fresh_execution(), fresh_result(QueryId(1)))
            .await
            .unwrap();
        manager
            .transition(execution_id, ExecutionStatus::Running, "test", ExecutionPatch::default())
            .await
            .unwrap();
        store
            .upsert_collector_result_by_execution(
                execution_id,
                CollectorResultPatch {
                    raw_answer: Some("already answered".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let fixed = manager.reconcile().await.unwrap();

        assert_eq!(fixed, 1);
        let execution = store.get_execution(execution_id).await.unwrap().unwrap();
        assert_eq!(execution.status, ExecutionStatus::Completed);
    }
}
