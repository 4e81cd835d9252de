use super::{AdapterOutcome, AdapterRequest, NormalizedAnswer, ProviderAdapter};
use crate::normalizer;
use answer_types::error::{CollectorError, ErrorKind};
use async_trait::async_trait;
use serde_json::{Value, json};

/// Scraper backend that is synchronous in the common case, but may reply
/// with HTTP 202 and a snapshot id when the job queue is backed up. Promotes
/// to the same polling path as `ChatScraperAsyncAdapter` in that case.
pub struct ChatScraperSyncAdapter {
    pub name: String,
    pub endpoint_url: String,
    pub snapshot_url_template: String,
    pub api_key: Option<String>,
    pub client: reqwest::Client,
}

impl ChatScraperSyncAdapter {
    fn auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

#[async_trait]
impl ProviderAdapter for ChatScraperSyncAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_async(&self) -> bool {
        true
    }

    async fn health_check(&self) -> Result<(), CollectorError> {
        let resp = self.client.head(&self.endpoint_url).send().await.map_err(CollectorError::from)?;
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

        let body = json!({ "prompt": req.prompt, "locale": req.locale, "country": req.country });
        let resp = self
            .auth(self.client.post(&self.endpoint_url).json(&body))
            .send()
            .await
            .map_err(CollectorError::from)?;

        if resp.status() == reqwest::StatusCode::ACCEPTED {
            let parsed: Value = resp.json().await.unwrap_or(Value::Null);
            let snapshot_id = parsed
                .get("snapshot_id")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    CollectorError::new(ErrorKind::ParseError, "202 response carried no snapshot id")
                })?
                .to_string();
            return Ok(AdapterOutcome::AsyncSubmitted { snapshot_id, raw: parsed });
        }

        if !resp.status().is_success() {
            return Err(match resp.status().as_u16() {
                401 | 403 => CollectorError::new(ErrorKind::Auth, "unauthorized"),
                400 | 422 => CollectorError::new(ErrorKind::InvalidInput, "bad request"),
                s if s >= 500 => CollectorError::new(ErrorKind::Transport, "server error"),
                _ => CollectorError::new(ErrorKind::Unknown, "unexpected status"),
            });
        }

        let parsed: Value = resp.json().await.map_err(CollectorError::from)?;
        let answer = normalizer::extract_answer(&parsed);
        if answer.is_empty() {
            return Err(CollectorError::new(ErrorKind::EmptyResponse, "no usable content"));
        }

        Ok(AdapterOutcome::Sync(NormalizedAnswer {
            answer,
            citations: normalizer::extract_urls(&parsed),
            urls: normalizer::extract_urls(&parsed),
            model_used: normalizer::extract_model(&parsed),
            metadata: parsed,
        }))
    }

    async fn poll_snapshot(&self, snapshot_id: &str) -> Result<Option<NormalizedAnswer>, CollectorError> {
        let url = self.snapshot_url_template.replace("{snapshot_id}", snapshot_id);
        let resp = self
            .auth(self.client.get(url))
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
