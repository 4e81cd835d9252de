use crate::ids::{CollectorResultId, ExecutionId, QueryId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectorResultStatus {
    Processing,
    Completed,
    Failed,
    FailedRetry,
}

/// Normalized, durable outcome of one Execution.
///
/// At most one `CollectorResult` exists per `Execution`, conflict-keyed on
/// `execution_id` (invariant 2 in `SPEC_FULL.md` §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorResult {
    pub id: CollectorResultId,
    pub query_id: QueryId,
    #[serde(default)]
    pub execution_id: Option<ExecutionId>,
    pub collector_type: String,
    #[serde(default)]
    pub raw_answer: String,
    #[serde(default)]
    pub citations: Vec<String>,
    #[serde(default)]
    pub urls: Vec<String>,
    /// Resolved brand name (via `BrandMetadataReader::get_brand_name`), not
    /// the raw `BrandId` — the id is already on the paired `Execution`.
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub competitors: Vec<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub collection_time_ms: Option<u64>,
    pub status: CollectorResultStatus,
    #[serde(default)]
    pub brightdata_snapshot_id: Option<String>,
    /// Large raw payload, written separately from the essential fields so a
    /// `PayloadTooLarge` rejection on this write never loses them.
    #[serde(default)]
    pub raw_response_json: Option<Value>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl CollectorResult {
    pub fn is_ready(&self) -> bool {
        !self.raw_answer.is_empty()
    }
}
