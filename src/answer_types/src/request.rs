use crate::ids::{BrandId, CustomerId, QueryId};
use serde::{Deserialize, Serialize};

/// A single natural-language query to fan out across collectors.
///
/// Immutable once accepted by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub query_id: QueryId,
    pub brand_id: BrandId,
    pub customer_id: CustomerId,
    pub query_text: String,
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    pub collectors: Vec<String>,
    #[serde(default)]
    pub suppress_scoring: bool,
}
