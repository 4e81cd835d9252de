use super::{AdapterOutcome, AdapterRequest, NormalizedAnswer, ProviderAdapter};
use crate::normalizer;
use answer_types::error::{CollectorError, ErrorKind};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, warn};

/// Scraper backend whose trigger endpoint returns a snapshot id almost
/// immediately, but the snapshot itself may take minutes to populate.
/// Attempts one short quick-poll before handing the snapshot off to the
/// background poller (`SPEC_FULL.md` §4.1, §4.3).
pub struct ChatScraperAsyncAdapter {
    pub name: String,
    pub trigger_url: String,
    pub snapshot_url_template: String,
    pub api_key: Option<String>,
    pub client: reqwest::Client,
    pub quick_poll_timeout: Duration,
}

impl ChatScraperAsyncAdapter {
    fn snapshot_url(&self, snapshot_id: &str) -> String {
        self.snapshot_url_template.replace("{snapshot_id}", snapshot_id)
    }

    fn auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    fn extract_snapshot_id(body: &Value) -> Option<String> {
        for key in ["snapshot_id", "id", "job_id"] {
            if let Some(s) = body.get(key).and_then(Value::as_str) {
                return Some(s.to_string());
            }
        }
        body.as_array()
            .and_then(|a| a.first())
            .and_then(|v| v.get("snapshot_id"))
            .and_then(Value::as_str)
            .map(|s| s.to_string())
    }
}

#[async_trait]
impl ProviderAdapter for ChatScraperAsyncAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_async(&self) -> bool {
        true
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
        if self.api_key.is_none() {
            return Err(CollectorError::new(
                ErrorKind::ConfigurationMissing,
                format!("{}: missing API credential", self.name),
            ));
        }

        let body = json!([{
            "url": req.prompt,
            "prompt": req.prompt,
            "country": req.country,
        }]);

        let resp = self
            .auth(self.client.post(&self.trigger_url).json(&body))
            .send()
            .await
            .map_err(CollectorError::from)?;

        let status = resp.status();
        let parsed: Value = resp.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            return Err(classify_status(status, &parsed));
        }

        let snapshot_id = Self::extract_snapshot_id(&parsed).ok_or_else(|| {
            CollectorError::new(ErrorKind::ParseError, "trigger response carried no snapshot id")
        })?;

        debug!(snapshot_id = %snapshot_id, provider = %self.name, "submitted async scrape job");

        match tokio::time::timeout(self.quick_poll_timeout, self.poll_snapshot(&snapshot_id)).await {
            Ok(Ok(Some(answer))) => Ok(AdapterOutcome::Sync(answer)),
            Ok(Ok(None)) | Err(_) => Ok(AdapterOutcome::AsyncSubmitted {
                snapshot_id,
                raw: parsed,
            }),
            Ok(Err(e)) if matches!(e.kind, ErrorKind::ParseError) => Ok(AdapterOutcome::AsyncSubmitted {
                snapshot_id,
                raw: parsed,
            }),
            Ok(Err(e)) => Err(e),
        }
    }

    async fn poll_snapshot(&self, snapshot_id: &str) -> Result<Option<NormalizedAnswer>, CollectorError> {
        let resp = self
            .auth(self.client.get(self.snapshot_url(snapshot_id)))
            .send()
            .await
            .map_err(CollectorError::from)?;

        if resp.status() == reqwest::StatusCode::ACCEPTED {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(classify_status(resp.status(), &Value::Null));
        }

        let parsed: Value = match resp.json().await {
            Ok(v) => v,
            Err(_) => return Ok(None),
        };

        let answer = normalizer::extract_answer(&parsed);
        if answer.is_empty() {
            return Ok(None);
        }

        Ok(Some(NormalizedAnswer {
            answer,
            citations: normalizer::extract_urls(&parsed),
            urls: normalizer::extract_urls(&parsed),
            model_used: normalizer::extract_model(&parsed),
            metadata: parsed,
        }))
    }
}

fn classify_status(status: reqwest::StatusCode, body: &Value) -> CollectorError {
    let message = body
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("provider returned an error status")
        .to_string();
    let kind = match status.as_u16() {
        401 | 403 => ErrorKind::Auth,
        400 | 422 => ErrorKind::InvalidInput,
        413 => ErrorKind::PayloadTooLarge,
        s if s >= 500 => ErrorKind::Transport,
        _ => {
            warn!(status = %status, "unclassified scraper status code");
            ErrorKind::Unknown
        }
    };
    CollectorError::new(kind, message)
}
