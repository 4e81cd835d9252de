//! Provider adapters: one per backend, translating a normalized request into
//! a backend-specific HTTP call and the response back into a normalized
//! answer. Modeled on the host's `Provider` enum-dispatch
//! (`clients/ai_provider/provider.rs`) and the strategy-per-backend idiom
//! seen in the wider retrieved pack's multi-provider orchestrators.

pub mod ai_overview_batch;
pub mod chat_scraper_async;
pub mod chat_scraper_sync;
pub mod direct_llm;
pub mod mock;
pub mod search_serp;

use answer_types::error::{CollectorError, ErrorKind};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AdapterRequest {
    pub prompt: String,
    pub brand: Option<String>,
    pub locale: Option<String>,
    pub country: Option<String>,
    pub collector_type: String,
}

#[derive(Debug, Clone)]
pub struct NormalizedAnswer {
    pub answer: String,
    pub citations: Vec<String>,
    pub urls: Vec<String>,
    pub model_used: Option<String>,
    pub metadata: Value,
}

#[derive(Debug, Clone)]
pub enum AdapterOutcome {
    Sync(NormalizedAnswer),
    AsyncSubmitted { snapshot_id: String, raw: Value },
}

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn name(&self) -> &str;
    fn is_async(&self) -> bool;
    async fn call(&self, req: &AdapterRequest) -> Result<AdapterOutcome, CollectorError>;
    /// Poll a previously-submitted snapshot. Only meaningful when
    /// `is_async()` is true; `executor.rs` only calls this after an adapter
    /// itself returns `AdapterOutcome::AsyncSubmitted`, so the default below
    /// is unreachable for the shipped adapters. It returns an error rather
    /// than panicking so a misconfigured future sync adapter fails the
    /// request instead of taking the process down.
    async fn poll_snapshot(&self, _snapshot_id: &str) -> Result<Option<NormalizedAnswer>, CollectorError> {
        Err(CollectorError::new(
            ErrorKind::InvalidInput,
            format!("{} does not implement poll_snapshot but was asked to poll a snapshot", self.name()),
        ))
    }

    /// Background poll cadence override for this adapter. `None` (the
    /// default for every adapter except `AiOverviewBatchAdapter`) means
    /// the poller falls back to the global `snapshot_poll_interval`/
    /// `snapshot_poll_max_attempts` config knobs.
    fn poll_interval(&self) -> Option<Duration> {
        None
    }

    fn poll_max_attempts(&self) -> Option<u32> {
        None
    }

    /// Lightweight liveness probe used by `health.rs`. Distinct from
    /// `call`/`poll_snapshot`: it never submits real work, only checks that
    /// the provider's base endpoint is reachable. Defaults to a no-op
    /// success for adapters with no cheap endpoint to probe (per
    /// `SPEC_FULL.md` §4.8).
    async fn health_check(&self) -> Result<(), CollectorError> {
        Ok(())
    }
}

/// Built once at startup from `Config`, shared via `Arc` the same way the
/// host shares its single `openai_client`.
pub struct ProviderRegistry {
    adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        ProviderRegistry {
            adapters: HashMap::new(),
        }
    }

    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(adapter.name().to_string(), adapter);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(name).cloned()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
