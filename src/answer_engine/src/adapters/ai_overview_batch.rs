use super::{AdapterOutcome, AdapterRequest, NormalizedAnswer, ProviderAdapter};
use crate::normalizer;
use answer_types::error::{CollectorError, ErrorKind};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::Duration;

/// Batch SERP cadence per `SPEC_FULL.md` §5: 30 s between polls, up to 30
/// attempts (15 min wall-clock), distinct from the chat-scraper default of
/// 10 s / 60 attempts.
const POLL_INTERVAL: Duration = Duration::from_secs(30);
const POLL_MAX_ATTEMPTS: u32 = 30;

/// Batch SERP backend: a single trigger call submits an array of prompts and
/// returns one snapshot id covering the whole batch; each item in the
/// finished snapshot is addressed by its input index. This adapter always
/// submits a batch of one, since the orchestrator calls adapters per
/// (request, collector) pair; true multi-prompt batching is left to a
/// caller that groups requests before invoking this adapter directly.
pub struct AiOverviewBatchAdapter {
    pub name: String,
    pub trigger_url: String,
    pub snapshot_url_template: String,
    pub api_key: Option<String>,
    pub client: reqwest::Client,
}

#[async_trait]
impl ProviderAdapter for AiOverviewBatchAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_async(&self) -> bool {
        true
    }

    fn poll_interval(&self) -> Option<Duration> {
        Some(POLL_INTERVAL)
    }

    fn poll_max_attempts(&self) -> Option<u32> {
        Some(POLL_MAX_ATTEMPTS)
    }

    async fn health_check(&self) -> Result<(), CollectorError> {
        let resp = self.client.head(&self.trigger_url).send().await.map_err(CollectorError::from)?;
        if resp.status().is_server_error() {
            return Err(CollectorError::new(
                ErrorKind::Transport,
                format!("{} base endpoint returned {}", self.name, resp.status()),
            ));
        }
        Ok(())
    }

    async fn call(&self, req: &AdapterRequest) -> Result<AdapterOutcome, CollectorError> {
        let Some(api_key) = &self.api_key else {
            return Err(CollectorError::new(
                ErrorKind::ConfigurationMissing,
                format!("{}: missing API credential", self.name),
            ));
        };

        let body = json!([{ "prompt": req.prompt, "country": req.country }]);
        let resp = self
            .client
            .post(&self.trigger_url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(CollectorError::from)?;

        if !resp.status().is_success() {
            return Err(CollectorError::new(ErrorKind::Transport, "batch trigger failed"));
        }

        let parsed: Value = resp.json().await.map_err(CollectorError::from)?;
        let snapshot_id = parsed
            .get("snapshot_id")
            .and_then(Value::as_str)
            .ok_or_else(|| CollectorError::new(ErrorKind::ParseError, "no snapshot id in trigger response"))?
            .to_string();

        Ok(AdapterOutcome::AsyncSubmitted { snapshot_id, raw: parsed })
    }

    async fn poll_snapshot(&self, snapshot_id: &str) -> Result<Option<NormalizedAnswer>, CollectorError> {
        let url = self.snapshot_url_template.replace("{snapshot_id}", snapshot_id);
        let resp = self
            .client
            .get(url)
            .bearer_auth(self.api_key.as_deref().unwrap_or_default())
            .send()
            .await
            .map_err(CollectorError::from)?;

        if resp.status() == reqwest::StatusCode::ACCEPTED {
            return Ok(None);
        }
        let parsed: Value = match resp.json().await {
            Ok(v) => v,
            Err(_) => return Ok(None),
        };

        let item = parsed.get(0).cloned().unwrap_or(parsed.clone());
        let answer = normalizer::extract_answer(&item);
        if answer.is_empty() {
            return Ok(None);
        }
        Ok(Some(NormalizedAnswer {
            answer,
            citations: normalizer::extract_urls(&item),
            urls: normalizer::extract_urls(&item),
            model_used: normalizer::extract_model(&item),
            metadata: item,
        }))
    }
}
