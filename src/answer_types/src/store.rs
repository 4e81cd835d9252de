//! The durable store collaborator.
//!
//! Treated as a generic typed table abstraction (`SPEC_FULL.md` §6); the
//! core never depends on a concrete database. Mirrors the shape of the
//! host's canister RPC surface (`claim_job`/`complete_job` style
//! request/response pairs) without any IC-specific transport.

use crate::collector_result::CollectorResult;
use crate::error::StoreError;
use crate::execution::Execution;
use crate::ids::{CollectorResultId, ExecutionId};
use async_trait::async_trait;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default)]
pub struct ExecutionPatch {
    pub status: Option<crate::execution::ExecutionStatus>,
    pub brightdata_snapshot_id: Option<String>,
    pub error_message: Option<String>,
    pub error_metadata: Option<Value>,
    pub retry_count: Option<u32>,
    pub append_attempt: Option<crate::execution::Attempt>,
    pub metadata_merge: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Default)]
pub struct CollectorResultPatch {
    pub status: Option<crate::collector_result::CollectorResultStatus>,
    pub raw_answer: Option<String>,
    pub citations: Option<Vec<String>>,
    pub urls: Option<Vec<String>>,
    pub topic: Option<String>,
    pub collection_time_ms: Option<u64>,
    pub brightdata_snapshot_id: Option<String>,
    pub raw_response_json: Option<Value>,
    pub error_message: Option<String>,
    pub metadata_merge: Option<Map<String, Value>>,
}

#[async_trait]
pub trait CollectorStore: Send + Sync {
    async fn insert_execution(&self, execution: Execution) -> Result<ExecutionId, StoreError>;
    async fn insert_collector_result(
        &self,
        result: CollectorResult,
    ) -> Result<CollectorResultId, StoreError>;
    async fn update_execution(
        &self,
        id: ExecutionId,
        patch: ExecutionPatch,
    ) -> Result<(), StoreError>;
    async fn update_collector_result(
        &self,
        id: CollectorResultId,
        patch: CollectorResultPatch,
    ) -> Result<(), StoreError>;
    async fn upsert_collector_result_by_execution(
        &self,
        execution_id: ExecutionId,
        patch: CollectorResultPatch,
    ) -> Result<CollectorResultId, StoreError>;
    async fn find_collector_result_by_snapshot(
        &self,
        snapshot_id: &str,
    ) -> Result<Option<CollectorResult>, StoreError>;
    async fn find_execution_by_snapshot(
        &self,
        snapshot_id: &str,
    ) -> Result<Option<Execution>, StoreError>;
    async fn get_execution(&self, id: ExecutionId) -> Result<Option<Execution>, StoreError>;
    async fn get_collector_result(
        &self,
        id: CollectorResultId,
    ) -> Result<Option<CollectorResult>, StoreError>;
    async fn get_collector_result_by_execution(
        &self,
        execution_id: ExecutionId,
    ) -> Result<Option<CollectorResult>, StoreError>;
    /// All executions not yet in a terminal status, for startup reconciliation.
    async fn list_non_terminal_executions(&self) -> Result<Vec<Execution>, StoreError>;
}
