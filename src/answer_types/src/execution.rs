use crate::ids::{BrandId, CustomerId, ExecutionId, QueryId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ExecutionStatus::Completed | ExecutionStatus::Failed)
    }
}

/// One attempt at one provider within a collector's fallback chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    pub attempt_number: u32,
    pub timestamp: DateTime<Utc>,
    pub error_type: String,
    pub retryable: bool,
}

/// A compact record of a status transition, appended to `Execution::metadata`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusTransition {
    pub from: ExecutionStatus,
    pub to: ExecutionStatus,
    pub at: DateTime<Utc>,
    pub source: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Durable record of one (request, collector) attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: ExecutionId,
    pub query_id: QueryId,
    pub brand_id: BrandId,
    pub customer_id: CustomerId,
    pub collector_type: String,
    pub status: ExecutionStatus,
    #[serde(default)]
    pub brightdata_snapshot_id: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub error_metadata: Option<Value>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub retry_history: Vec<Attempt>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Execution {
    pub fn record_transition(&mut self, to: ExecutionStatus, source: &str, reason: Option<String>) {
        let transition = StatusTransition {
            from: self.status,
            to,
            at: Utc::now(),
            source: source.to_string(),
            reason,
        };
        self.status = to;
        self.updated_at = transition.at;
        let entry = serde_json::to_value(&transition).expect("StatusTransition always serializes");
        self.metadata
            .entry("status_transitions")
            .or_insert_with(|| Value::Array(Vec::new()))
            .as_array_mut()
            .expect("status_transitions is always an array")
            .push(entry.clone());
        self.metadata
            .insert("last_status_transition".to_string(), entry);
    }
}
