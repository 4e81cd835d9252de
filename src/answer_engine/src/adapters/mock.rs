use super::{AdapterOutcome, AdapterRequest, NormalizedAnswer, ProviderAdapter};
use answer_types::error::CollectorError;
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};

/// Deterministic adapter used by the demo binary and tests. Never runs for a
/// production request unless `Config::mock_mode` explicitly selects it.
pub struct MockAdapter {
    pub name: String,
    pub fail_first_n: u32,
    attempts: AtomicU32,
}

impl MockAdapter {
    pub fn new(name: impl Into<String>, fail_first_n: u32) -> Self {
        MockAdapter {
            name: name.into(),
            fail_first_n,
            attempts: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl ProviderAdapter for MockAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_async(&self) -> bool {
        false
    }

    async fn call(&self, req: &AdapterRequest) -> Result<AdapterOutcome, CollectorError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.fail_first_n {
            return Err(CollectorError::new(
                answer_types::error::ErrorKind::Transport,
                format!("{}: simulated failure on attempt {attempt}", self.name),
            ));
        }
        Ok(AdapterOutcome::Sync(NormalizedAnswer {
            answer: format!("mock answer for: {}", req.prompt),
            citations: vec!["https://mock.example/source".to_string()],
            urls: vec!["https://mock.example/source".to_string()],
            model_used: Some("mock-model".to_string()),
            metadata: json!({ "mock": true }),
        }))
    }
}
