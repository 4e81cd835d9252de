//! Thin smoke-test binary: loads `Config`, builds an in-memory store and a
//! mock provider set, and runs one batch end-to-end. Not part of the
//! library's public contract, grounded in the host's `main.rs` startup
//! sequence (parse args, init telemetry, build state, run).

use answer_engine::adapters::mock::MockAdapter;
use answer_engine::adapters::ProviderRegistry;
use answer_engine::config::{Args, Config};
use answer_engine::core::state::AppState;
use answer_engine::memory_store::InMemoryStore;
use answer_engine::orchestrator::Orchestrator;
use answer_engine::state_manager::StateManager;
use answer_types::collector_config::{CollectorConfig, ProviderSpec};
use answer_types::ids::{BrandId, CustomerId, QueryId};
use answer_types::request::Request;
use clap::Parser;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

fn demo_collector_configs() -> HashMap<String, CollectorConfig> {
    let mut configs = HashMap::new();
    configs.insert(
        "chatgpt".to_string(),
        CollectorConfig {
            name: "chatgpt".to_string(),
            enabled: true,
            timeout_ms: 5_000,
            retries: 0,
            priority_rank: 0,
            providers: vec![ProviderSpec {
                name: "mock-primary".to_string(),
                priority: 0,
                enabled: true,
                timeout_ms: 5_000,
                retries: 0,
                fallback_on_failure: true,
            }],
        },
    );
    configs
}

fn demo_requests() -> Vec<Request> {
    vec![Request {
        query_id: QueryId(1),
        brand_id: BrandId(1),
        customer_id: CustomerId(1),
        query_text: "What's the best project management tool?".to_string(),
        intent: None,
        locale: Some("en-US".to_string()),
        country: Some("US".to_string()),
        collectors: vec!["chatgpt".to_string()],
        suppress_scoring: true,
    }]
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::from_env().apply_args(&args);
    let _guard = answer_engine::telemetry::init(config.log_format);

    info!(batch_size = config.batch_size, mock_mode = config.mock_mode, "starting demo run");

    let store = Arc::new(InMemoryStore::new());
    let mut adapters = ProviderRegistry::new();
    adapters.register(Arc::new(MockAdapter::new("mock-primary", 0)));

    let state = AppState::new(config, store, adapters);

    let state_manager = StateManager::new(state.store.clone());
    match state_manager.reconcile().await {
        Ok(fixed) if fixed > 0 => info!(fixed, "startup reconciliation fixed stuck executions"),
        Ok(_) => {}
        Err(e) => info!(error = %e, "startup reconciliation failed"),
    }

    answer_engine::health::spawn_health_check_task(state.clone(), state.adapters.clone(), vec!["mock-primary".to_string()]);
    let orchestrator = Orchestrator::new(state.clone());

    let configs = demo_collector_configs();
    let results = orchestrator.run_batches(demo_requests(), &configs).await;

    for result in &results {
        match &result.outcome {
            Ok(outcome) => info!(
                query_id = %result.query_id,
                collector = %result.collector_type,
                fallback_used = outcome.fallback_used,
                "collector completed"
            ),
            Err(e) => info!(
                query_id = %result.query_id,
                collector = %result.collector_type,
                error = %e,
                "collector failed"
            ),
        }
    }

    Ok(())
}
