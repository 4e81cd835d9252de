//! External collaborator interfaces described in `SPEC_FULL.md` §6.
//!
//! All reads may fail; failure degrades to `None`, it never blocks core
//! execution. `Scorer` is fire-and-forget by construction: the trait method
//! is synchronous so a caller cannot accidentally `.await` it on the request
//! path.

use crate::ids::{BrandId, CustomerId, QueryId};
use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct QueryMetadata {
    pub query_text: String,
    pub topic: Option<String>,
    pub metadata: Option<Value>,
}

#[async_trait]
pub trait BrandMetadataReader: Send + Sync {
    async fn get_brand_name(&self, brand_id: BrandId) -> Option<String>;
    async fn get_competitors(&self, brand_id: BrandId) -> Vec<String>;
}

#[async_trait]
pub trait QueryMetadataReader: Send + Sync {
    async fn get_query(&self, query_id: QueryId) -> Option<QueryMetadata>;
}

pub trait Scorer: Send + Sync {
    fn score_brand_async(&self, brand_id: BrandId, customer_id: CustomerId);
}
