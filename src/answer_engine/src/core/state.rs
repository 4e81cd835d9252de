//! Process-wide shared state, handed to every task as an `Arc`. Mirrors the
//! host's `AppState`/`SharedState` pair (`core/state.rs`): one struct holding
//! every injected collaborator, built once at startup and cloned cheaply.

use crate::adapters::ProviderRegistry;
use crate::config::Config;
use crate::core::metrics::Metrics;
use crate::health::HealthRegistry;
use crate::retry::CircuitBreakerRegistry;
use answer_types::collaborators::{BrandMetadataReader, QueryMetadataReader, Scorer};
use answer_types::store::CollectorStore;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::Semaphore;

pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn CollectorStore>,
    pub circuit_breakers: CircuitBreakerRegistry,
    pub adapters: Arc<ProviderRegistry>,
    pub health: Arc<HealthRegistry>,
    pub metrics: Arc<Metrics>,
    /// Bounds in-flight executions to `config.concurrency` (falling back to
    /// `config.batch_size` when unset) worth of concurrent provider work,
    /// the same role the host's `request_semaphore` plays around its
    /// inference calls.
    pub request_semaphore: Arc<Semaphore>,
    pub shutdown: Arc<AtomicBool>,
    pub scorer: Option<Arc<dyn Scorer>>,
    pub brand_reader: Option<Arc<dyn BrandMetadataReader>>,
    pub query_reader: Option<Arc<dyn QueryMetadataReader>>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(config: Config, store: Arc<dyn CollectorStore>, adapters: ProviderRegistry) -> SharedState {
        Self::new_with_scorer(config, store, adapters, None)
    }

    pub fn new_with_scorer(
        config: Config,
        store: Arc<dyn CollectorStore>,
        adapters: ProviderRegistry,
        scorer: Option<Arc<dyn Scorer>>,
    ) -> SharedState {
        Self::new_with_collaborators(config, store, adapters, scorer, None, None)
    }

    /// Full constructor taking every optional collaborator (§6: scorer,
    /// brand/query metadata readers). All reads through these may fail or
    /// be absent; failure degrades to `None` fields rather than blocking
    /// core execution.
    pub fn new_with_collaborators(
        config: Config,
        store: Arc<dyn CollectorStore>,
        adapters: ProviderRegistry,
        scorer: Option<Arc<dyn Scorer>>,
        brand_reader: Option<Arc<dyn BrandMetadataReader>>,
        query_reader: Option<Arc<dyn QueryMetadataReader>>,
    ) -> SharedState {
        let permits = config.concurrency.unwrap_or(config.batch_size).max(1);
        Arc::new(AppState {
            config: Arc::new(config),
            store,
            circuit_breakers: CircuitBreakerRegistry::new(),
            adapters: Arc::new(adapters),
            health: Arc::new(HealthRegistry::new()),
            metrics: Arc::new(Metrics::default()),
            request_semaphore: Arc::new(Semaphore::new(permits)),
            shutdown: Arc::new(AtomicBool::new(false)),
            scorer,
            brand_reader,
            query_reader,
        })
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(std::sync::atomic::Ordering::Relaxed)
    }
}
