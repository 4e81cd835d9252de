//! `InMemoryStore`: the `CollectorStore` implementation used by the demo
//! binary and the test suite. Production callers provide their own
//! implementation against a real database; the core never depends on one.

use answer_types::collector_result::CollectorResult;
use answer_types::error::StoreError;
use answer_types::execution::Execution;
use answer_types::ids::{CollectorResultId, ExecutionId};
use answer_types::store::{CollectorResultPatch, CollectorStore, ExecutionPatch};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

pub struct InMemoryStore {
    next_execution_id: AtomicU64,
    next_result_id: AtomicU64,
    executions: RwLock<HashMap<u64, Execution>>,
    results: RwLock<HashMap<u64, CollectorResult>>,
    execution_by_execution_id: RwLock<HashMap<u64, u64>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        InMemoryStore {
            next_execution_id: AtomicU64::new(1),
            next_result_id: AtomicU64::new(1),
            executions: RwLock::new(HashMap::new()),
            results: RwLock::new(HashMap::new()),
            execution_by_execution_id: RwLock::new(HashMap::new()),
        }
    }

    fn apply_execution_patch(execution: &mut Execution, patch: ExecutionPatch) {
        if let Some(status) = patch.status {
            execution.status = status;
        }
        if let Some(snapshot) = patch.brightdata_snapshot_id {
            execution.brightdata_snapshot_id = Some(snapshot);
        }
        if let Some(msg) = patch.error_message {
            execution.error_message = Some(msg);
        }
        if let Some(meta) = patch.error_metadata {
            execution.error_metadata = Some(meta);
        }
        if let Some(count) = patch.retry_count {
            execution.retry_count = count;
        }
        if let Some(attempt) = patch.append_attempt {
            execution.retry_history.push(attempt);
        }
        if let Some(merge) = patch.metadata_merge {
            execution.metadata.extend(merge);
        }
        execution.updated_at = chrono::Utc::now();
    }

    fn apply_result_patch(result: &mut CollectorResult, patch: CollectorResultPatch) {
        if let Some(status) = patch.status {
            result.status = status;
        }
        if let Some(answer) = patch.raw_answer {
            result.raw_answer = answer;
        }
        if let Some(citations) = patch.citations {
            result.citations = citations;
        }
        if let Some(urls) = patch.urls {
            result.urls = urls;
        }
        if let Some(topic) = patch.topic {
            result.topic = Some(topic);
        }
        if let Some(ms) = patch.collection_time_ms {
            result.collection_time_ms = Some(ms);
        }
        if let Some(snapshot) = patch.brightdata_snapshot_id {
            result.brightdata_snapshot_id = Some(snapshot);
        }
        if let Some(raw) = patch.raw_response_json {
            result.raw_response_json = Some(raw);
        }
        if let Some(msg) = patch.error_message {
            result.error_message = Some(msg);
        }
        if let Some(merge) = patch.metadata_merge {
            result.metadata.extend(merge);
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CollectorStore for InMemoryStore {
    async fn insert_execution(&self, mut execution: Execution) -> Result<ExecutionId, StoreError> {
        let id = self.next_execution_id.fetch_add(1, Ordering::SeqCst);
        execution.id = ExecutionId(id);
        self.executions.write().await.insert(id, execution);
        Ok(ExecutionId(id))
    }

    async fn insert_collector_result(
        &self,
        mut result: CollectorResult,
    ) -> Result<CollectorResultId, StoreError> {
        let id = self.next_result_id.fetch_add(1, Ordering::SeqCst);
        result.id = CollectorResultId(id);
        if let Some(exec_id) = result.execution_id {
            self.execution_by_execution_id
                .write()
                .await
                .insert(exec_id.0, id);
        }
        self.results.write().await.insert(id, result);
        Ok(CollectorResultId(id))
    }

    async fn update_execution(&self, id: ExecutionId, patch: ExecutionPatch) -> Result<(), StoreError> {
        let mut guard = self.executions.write().await;
        let execution = guard
            .get_mut(&id.0)
            .ok_or_else(|| StoreError::new(format!("execution {id} not found")))?;
        Self::apply_execution_patch(execution, patch);
        Ok(())
    }

    async fn update_collector_result(
        &self,
        id: CollectorResultId,
        patch: CollectorResultPatch,
    ) -> Result<(), StoreError> {
        let mut guard = self.results.write().await;
        let result = guard
            .get_mut(&id.0)
            .ok_or_else(|| StoreError::new(format!("collector result {id} not found")))?;
        Self::apply_result_patch(result, patch);
        Ok(())
    }

    async fn upsert_collector_result_by_execution(
        &self,
        execution_id: ExecutionId,
        patch: CollectorResultPatch,
    ) -> Result<CollectorResultId, StoreError> {
        let existing_id = self
            .execution_by_execution_id
            .read()
            .await
            .get(&execution_id.0)
            .copied();

        if let Some(result_id) = existing_id {
            self.update_collector_result(CollectorResultId(result_id), patch).await?;
            return Ok(CollectorResultId(result_id));
        }

        let execution = self
            .executions
            .read()
            .await
            .get(&execution_id.0)
            .cloned()
            .ok_or_else(|| StoreError::new(format!("execution {execution_id} not found")))?;

        let mut fresh = CollectorResult {
            id: CollectorResultId(0),
            query_id: execution.query_id,
            execution_id: Some(execution_id),
            collector_type: execution.collector_type.clone(),
            raw_answer: String::new(),
            citations: Vec::new(),
            urls: Vec::new(),
            // This fallback path only fires when no CollectorResult row was
            // ever created for the execution (recovery edge case); the
            // store has no access to `BrandMetadataReader`, so it can only
            // fall back to the raw id rather than a resolved name.
            brand: Some(execution.brand_id.to_string()),
            question: None,
            competitors: Vec::new(),
            topic: None,
            collection_time_ms: None,
            status: answer_types::collector_result::CollectorResultStatus::Processing,
            brightdata_snapshot_id: None,
            raw_response_json: None,
            metadata: Default::default(),
            error_message: None,
        };
        Self::apply_result_patch(&mut fresh, patch);
        self.insert_collector_result(fresh).await
    }

    async fn find_collector_result_by_snapshot(
        &self,
        snapshot_id: &str,
    ) -> Result<Option<CollectorResult>, StoreError> {
        Ok(self
            .results
            .read()
            .await
            .values()
            .find(|r| r.brightdata_snapshot_id.as_deref() == Some(snapshot_id))
            .cloned())
    }

    async fn find_execution_by_snapshot(&self, snapshot_id: &str) -> Result<Option<Execution>, StoreError> {
        Ok(self
            .executions
            .read()
            .await
            .values()
            .find(|e| e.brightdata_snapshot_id.as_deref() == Some(snapshot_id))
            .cloned())
    }

    async fn get_execution(&self, id: ExecutionId) -> Result<Option<Execution>, StoreError> {
        Ok(self.executions.read().await.get(&id.0).cloned())
    }

    async fn get_collector_result(&self, id: CollectorResultId) -> Result<Option<CollectorResult>, StoreError> {
        Ok(self.results.read().await.get(&id.0).cloned())
    }

    async fn get_collector_result_by_execution(
        &self,
        execution_id: ExecutionId,
    ) -> Result<Option<CollectorResult>, StoreError> {
        let id = self
            .execution_by_execution_id
            .read()
            .await
            .get(&execution_id.0)
            .copied();
        match id {
            Some(id) => self.get_collector_result(CollectorResultId(id)).await,
            None => Ok(None),
        }
    }

    async fn list_non_terminal_executions(&self) -> Result<Vec<Execution>, StoreError> {
        Ok(self
            .executions
            .read()
            .await
            .values()
            .filter(|e| !e.status.is_terminal())
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use answer_types::collector_result::CollectorResultStatus;
    use answer_types::execution::ExecutionStatus;
    use answer_types::ids::{BrandId, CustomerId, QueryId};

    fn new_execution() -> Execution {
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
            metadata: Default::default(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn upsert_by_execution_creates_then_updates_same_result() {
        let store = InMemoryStore::new();
        let exec_id = store.insert_execution(new_execution()).await.unwrap();

        let first = store
            .upsert_collector_result_by_execution(
                exec_id,
                CollectorResultPatch {
                    raw_answer: Some("hello".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let second = store
            .upsert_collector_result_by_execution(
                exec_id,
                CollectorResultPatch {
                    status: Some(CollectorResultStatus::Completed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(first, second);
        let result = store.get_collector_result(first).await.unwrap().unwrap();
        assert_eq!(result.raw_answer, "hello");
        assert_eq!(result.status, CollectorResultStatus::Completed);
    }
}
