//! End-to-end scenario tests (`SPEC_FULL.md` §8, S1-S6) against
//! `InMemoryStore` and scripted `ProviderAdapter`s standing in for the real
//! HTTP backends, per the test-tooling mapping in §8.1.

use answer_engine::adapters::{AdapterOutcome, AdapterRequest, NormalizedAnswer, ProviderAdapter, ProviderRegistry};
use answer_engine::config::{Config, LogFormat};
use answer_engine::core::state::AppState;
use answer_engine::memory_store::InMemoryStore;
use answer_engine::orchestrator::Orchestrator;
use answer_types::collector_config::{CollectorConfig, ProviderSpec};
use answer_types::error::{CollectorError, ErrorKind};
use answer_types::ids::{BrandId, CustomerId, QueryId};
use answer_types::request::Request;
use answer_types::store::CollectorStore;
use async_trait::async_trait;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

fn test_config() -> Config {
    Config {
        max_retries: 3,
        retry_base_delay: Duration::from_millis(1),
        circuit_breaker_threshold: 2,
        circuit_breaker_reset_timeout: Duration::from_millis(50),
        batch_size: 4,
        concurrency: None,
        inter_batch_delay: Duration::from_millis(0),
        verbose_logs: false,
        log_format: LogFormat::Compact,
        health_check_interval: Duration::from_secs(3600),
        snapshot_poll_interval: Duration::from_millis(5),
        snapshot_poll_max_attempts: 20,
        mock_mode: true,
        provider_credentials: HashMap::new(),
    }
}

fn request(query_id: u64, collectors: &[&str]) -> Request {
    Request {
        query_id: QueryId(query_id),
        brand_id: BrandId(1),
        customer_id: CustomerId(1),
        query_text: "compare X and Y".to_string(),
        intent: None,
        locale: None,
        country: None,
        collectors: collectors.iter().map(|s| s.to_string()).collect(),
        suppress_scoring: true,
    }
}

fn provider(name: &str, fallback_on_failure: bool) -> ProviderSpec {
    ProviderSpec {
        name: name.to_string(),
        priority: 0,
        enabled: true,
        timeout_ms: 2_000,
        retries: 0,
        fallback_on_failure,
    }
}

fn collector_config(name: &str, providers: Vec<ProviderSpec>) -> CollectorConfig {
    let mut providers = providers;
    for (idx, p) in providers.iter_mut().enumerate() {
        p.priority = idx as u32;
    }
    CollectorConfig {
        name: name.to_string(),
        enabled: true,
        timeout_ms: 2_000,
        retries: 0,
        priority_rank: 0,
        providers,
    }
}

/// An adapter driven by a prepared script of `call()` results and, for async
/// adapters, `poll_snapshot()` results, popped front-to-back. Tracks the
/// number of times `call` was invoked so fast-fail scenarios (S4) can assert
/// the breaker actually skipped the adapter.
struct ScriptedAdapter {
    name: String,
    is_async: bool,
    call_script: Mutex<VecDeque<Result<AdapterOutcome, CollectorError>>>,
    poll_script: Mutex<VecDeque<Result<Option<NormalizedAnswer>, CollectorError>>>,
    call_count: Mutex<u32>,
}

impl ScriptedAdapter {
    fn sync(name: &str, script: Vec<Result<AdapterOutcome, CollectorError>>) -> Self {
        ScriptedAdapter {
            name: name.to_string(),
            is_async: false,
            call_script: Mutex::new(script.into()),
            poll_script: Mutex::new(VecDeque::new()),
            call_count: Mutex::new(0),
        }
    }

    fn asynchronous(
        name: &str,
        call_script: Vec<Result<AdapterOutcome, CollectorError>>,
        poll_script: Vec<Result<Option<NormalizedAnswer>, CollectorError>>,
    ) -> Self {
        ScriptedAdapter {
            name: name.to_string(),
            is_async: true,
            call_script: Mutex::new(call_script.into()),
            poll_script: Mutex::new(poll_script.into()),
            call_count: Mutex::new(0),
        }
    }

    fn calls(&self) -> u32 {
        *self.call_count.lock().unwrap()
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_async(&self) -> bool {
        self.is_async
    }

    async fn call(&self, _req: &AdapterRequest) -> Result<AdapterOutcome, CollectorError> {
        *self.call_count.lock().unwrap() += 1;
        self.call_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(CollectorError::new(ErrorKind::Unknown, "script exhausted")))
    }

    async fn poll_snapshot(&self, _snapshot_id: &str) -> Result<Option<NormalizedAnswer>, CollectorError> {
        self.poll_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(None))
    }
}

fn answer(text: &str, urls: Vec<&str>) -> NormalizedAnswer {
    NormalizedAnswer {
        answer: text.to_string(),
        citations: urls.iter().map(|s| s.to_string()).collect(),
        urls: urls.iter().map(|s| s.to_string()).collect(),
        model_used: None,
        metadata: json!({}),
    }
}

/// S1 - happy path, sync provider.
#[tokio::test]
async fn s1_happy_path_sync_provider() {
    let adapter = Arc::new(ScriptedAdapter::sync(
        "openrouter_claude",
        vec![Ok(AdapterOutcome::Sync(answer("the comparison text", vec!["https://a"])))],
    ));
    let mut registry = ProviderRegistry::new();
    registry.register(adapter);
    let store = Arc::new(InMemoryStore::new());
    let state = AppState::new(test_config(), store.clone(), registry);

    let configs: HashMap<String, CollectorConfig> = [(
        "claude".to_string(),
        collector_config("claude", vec![provider("openrouter_claude", true)]),
    )]
    .into_iter()
    .collect();

    let orchestrator = Orchestrator::new(state.clone());
    let results = orchestrator.run_batches(vec![request(1, &["claude"])], &configs).await;

    assert_eq!(results.len(), 1);
    let outcome = results[0].outcome.as_ref().expect("expected success");
    assert!(!outcome.fallback_used);

    let execution = store
        .list_non_terminal_executions()
        .await
        .unwrap();
    assert!(execution.is_empty(), "execution should have reached a terminal state");
}

/// S3 - fallback engages: P1 fails retryably, P2 succeeds.
#[tokio::test]
async fn s3_fallback_engages_on_retryable_failure() {
    let p1 = Arc::new(ScriptedAdapter::sync(
        "P1",
        vec![Err(CollectorError::new(ErrorKind::Transport, "502"))],
    ));
    let p2 = Arc::new(ScriptedAdapter::sync(
        "P2",
        vec![Ok(AdapterOutcome::Sync(answer("from P2", vec![])))],
    ));
    let mut registry = ProviderRegistry::new();
    registry.register(p1);
    registry.register(p2);
    let store = Arc::new(InMemoryStore::new());
    let state = AppState::new(test_config(), store.clone(), registry);

    let configs: HashMap<String, CollectorConfig> = [(
        "gemini".to_string(),
        collector_config("gemini", vec![provider("P1", true), provider("P2", true)]),
    )]
    .into_iter()
    .collect();

    let orchestrator = Orchestrator::new(state.clone());
    let results = orchestrator
        .run_batches(vec![request(1, &["gemini"])], &configs)
        .await;

    let outcome = results[0].outcome.as_ref().expect("expected eventual success");
    assert!(outcome.fallback_used);
    assert_eq!(outcome.fallback_chain, vec!["P1".to_string(), "P2".to_string()]);
}

/// S4 - all providers fail; breaker opens; a second identical request fails
/// fast without calling the adapter again.
#[tokio::test]
async fn s4_all_providers_fail_then_breaker_opens() {
    let always_fails: Vec<Result<AdapterOutcome, CollectorError>> = (0..10)
        .map(|_| Err(CollectorError::new(ErrorKind::Transport, "down")))
        .collect();
    let adapter = Arc::new(ScriptedAdapter::sync("P1", always_fails));
    let mut registry = ProviderRegistry::new();
    registry.register(adapter.clone());
    let store = Arc::new(InMemoryStore::new());
    let state = AppState::new(test_config(), store.clone(), registry);

    let configs: HashMap<String, CollectorConfig> = [(
        "perplexity".to_string(),
        collector_config("perplexity", vec![provider("P1", false)]),
    )]
    .into_iter()
    .collect();

    let orchestrator = Orchestrator::new(state.clone());
    let first = orchestrator
        .run_batches(vec![request(1, &["perplexity"])], &configs)
        .await;
    assert!(first[0].outcome.is_err());

    let calls_after_first = adapter.calls();

    let second = orchestrator
        .run_batches(vec![request(2, &["perplexity"])], &configs)
        .await;
    assert!(second[0].outcome.is_err());
    assert!(
        matches!(&second[0].outcome, Err(e) if e.kind == ErrorKind::CircuitOpen),
        "expected CircuitOpen, got {:?}",
        second[0].outcome.as_ref().err()
    );
    assert_eq!(adapter.calls(), calls_after_first, "breaker must skip the adapter entirely");
}

/// S5 - partial batch: one async collector, one sync collector.
#[tokio::test]
async fn s5_partial_batch_async_and_sync_collectors() {
    let chatgpt_adapter = Arc::new(ScriptedAdapter::asynchronous(
        "chatgpt_scraper",
        vec![Ok(AdapterOutcome::AsyncSubmitted {
            snapshot_id: "s1".to_string(),
            raw: json!({"snapshot_id": "s1"}),
        })],
        vec![Ok(None), Ok(Some(answer("hello", vec![])))],
    ));
    let claude_adapter = Arc::new(ScriptedAdapter::sync(
        "claude_direct",
        vec![Ok(AdapterOutcome::Sync(answer("claude answer", vec![])))],
    ));
    let mut registry = ProviderRegistry::new();
    registry.register(chatgpt_adapter);
    registry.register(claude_adapter);
    let store = Arc::new(InMemoryStore::new());
    let state = AppState::new(test_config(), store.clone(), registry);

    let configs: HashMap<String, CollectorConfig> = [
        (
            "chatgpt".to_string(),
            collector_config("chatgpt", vec![provider("chatgpt_scraper", true)]),
        ),
        (
            "claude".to_string(),
            collector_config("claude", vec![provider("claude_direct", true)]),
        ),
    ]
    .into_iter()
    .collect();

    let orchestrator = Orchestrator::new(state.clone());
    let results = orchestrator
        .run_batches(vec![request(1, &["chatgpt", "claude"])], &configs)
        .await;
    assert_eq!(results.len(), 2);
    for r in &results {
        assert!(r.outcome.is_ok(), "{}: {:?}", r.collector_type, r.outcome.as_ref().err());
    }

    // The background poller runs on its own spawned task; give it a few
    // ticks (interval is 5ms in test_config) to finalize.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let execution = store
        .find_execution_by_snapshot("s1")
        .await
        .unwrap()
        .expect("chatgpt execution recorded by snapshot id");
    assert_eq!(execution.status, answer_types::execution::ExecutionStatus::Completed);

    let result = store
        .find_collector_result_by_snapshot("s1")
        .await
        .unwrap()
        .expect("chatgpt result recorded by snapshot id");
    assert_eq!(result.raw_answer, "hello");
}

/// S6 - oversized payload: the large raw_response_json write fails, but
/// essential fields (raw_answer/citations) survive and the execution still
/// completes.
#[tokio::test]
async fn s6_oversized_payload_tolerated() {
    let adapter = Arc::new(ScriptedAdapter::sync(
        "P1",
        vec![Ok(AdapterOutcome::Sync(NormalizedAnswer {
            answer: "a real answer".to_string(),
            citations: vec!["https://example.com".to_string()],
            urls: vec!["https://example.com".to_string()],
            model_used: None,
            // Stand-in for a 50 MB payload: large enough to exceed the test
            // store's threshold without actually allocating 50 MB.
            metadata: json!({ "blob": "x".repeat(2_000_000) }),
        }))],
    ));
    let mut registry = ProviderRegistry::new();
    registry.register(adapter);
    let store: Arc<RejectingStore> = Arc::new(RejectingStore::new(1_000_000));
    let state = AppState::new(test_config(), store.clone(), registry);

    let configs: HashMap<String, CollectorConfig> = [(
        "gemini".to_string(),
        collector_config("gemini", vec![provider("P1", true)]),
    )]
    .into_iter()
    .collect();

    let orchestrator = Orchestrator::new(state.clone());
    let results = orchestrator
        .run_batches(vec![request(1, &["gemini"])], &configs)
        .await;
    assert!(results[0].outcome.is_ok());

    let execution = store
        .inner
        .list_non_terminal_executions()
        .await
        .unwrap();
    assert!(execution.is_empty());

    let result = store
        .inner
        .get_collector_result(answer_types::ids::CollectorResultId(1))
        .await
        .unwrap()
        .expect("result exists");
    assert_eq!(result.status, answer_types::collector_result::CollectorResultStatus::Completed);
    assert_eq!(result.raw_answer, "a real answer");
    assert!(result.raw_response_json.is_none(), "oversized payload must not be persisted");
}

/// Store wrapper that rejects any `CollectorResultPatch::raw_response_json`
/// write over `max_bytes`, simulating the durable store's payload-size limit
/// (spec §7, `PayloadTooLarge`) without needing a real oversized allocation.
struct RejectingStore {
    inner: InMemoryStore,
    max_bytes: usize,
}

impl RejectingStore {
    fn new(max_bytes: usize) -> Self {
        RejectingStore {
            inner: InMemoryStore::new(),
            max_bytes,
        }
    }
}

#[async_trait]
impl answer_types::store::CollectorStore for RejectingStore {
    async fn insert_execution(
        &self,
        execution: answer_types::execution::Execution,
    ) -> Result<answer_types::ids::ExecutionId, answer_types::error::StoreError> {
        self.inner.insert_execution(execution).await
    }

    async fn insert_collector_result(
        &self,
        result: answer_types::collector_result::CollectorResult,
    ) -> Result<answer_types::ids::CollectorResultId, answer_types::error::StoreError> {
        self.inner.insert_collector_result(result).await
    }

    async fn update_execution(
        &self,
        id: answer_types::ids::ExecutionId,
        patch: answer_types::store::ExecutionPatch,
    ) -> Result<(), answer_types::error::StoreError> {
        self.inner.update_execution(id, patch).await
    }

    async fn update_collector_result(
        &self,
        id: answer_types::ids::CollectorResultId,
        patch: answer_types::store::CollectorResultPatch,
    ) -> Result<(), answer_types::error::StoreError> {
        self.inner.update_collector_result(id, patch).await
    }

    async fn upsert_collector_result_by_execution(
        &self,
        execution_id: answer_types::ids::ExecutionId,
        patch: answer_types::store::CollectorResultPatch,
    ) -> Result<answer_types::ids::CollectorResultId, answer_types::error::StoreError> {
        if let Some(raw) = &patch.raw_response_json {
            let size = serde_json::to_vec(raw).map(|v| v.len()).unwrap_or(0);
            if size > self.max_bytes {
                return Err(answer_types::error::StoreError::payload_too_large(format!(
                    "raw_response_json is {size} bytes, exceeds {}",
                    self.max_bytes
                )));
            }
        }
        self.inner.upsert_collector_result_by_execution(execution_id, patch).await
    }

    async fn find_collector_result_by_snapshot(
        &self,
        snapshot_id: &str,
    ) -> Result<Option<answer_types::collector_result::CollectorResult>, answer_types::error::StoreError> {
        self.inner.find_collector_result_by_snapshot(snapshot_id).await
    }

    async fn find_execution_by_snapshot(
        &self,
        snapshot_id: &str,
    ) -> Result<Option<answer_types::execution::Execution>, answer_types::error::StoreError> {
        self.inner.find_execution_by_snapshot(snapshot_id).await
    }

    async fn get_execution(
        &self,
        id: answer_types::ids::ExecutionId,
    ) -> Result<Option<answer_types::execution::Execution>, answer_types::error::StoreError> {
        self.inner.get_execution(id).await
    }

    async fn get_collector_result(
        &self,
        id: answer_types::ids::CollectorResultId,
    ) -> Result<Option<answer_types::collector_result::CollectorResult>, answer_types::error::StoreError> {
        self.inner.get_collector_result(id).await
    }

    async fn get_collector_result_by_execution(
        &self,
        execution_id: answer_types::ids::ExecutionId,
    ) -> Result<Option<answer_types::collector_result::CollectorResult>, answer_types::error::StoreError> {
        self.inner.get_collector_result_by_execution(execution_id).await
    }

    async fn list_non_terminal_executions(
        &self,
    ) -> Result<Vec<answer_types::execution::Execution>, answer_types::error::StoreError> {
        self.inner.list_non_terminal_executions().await
    }
}
