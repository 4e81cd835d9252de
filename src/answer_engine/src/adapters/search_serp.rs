use super::{AdapterOutcome, AdapterRequest, NormalizedAnswer, ProviderAdapter};
use crate::normalizer;
use answer_types::error::{CollectorError, ErrorKind};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeSet;

/// Search-augmented-generation backend: GET a search URL, parse an ordered
/// sequence of typed text blocks into plain text, collect reference URLs
/// from both a top-level list and per-block inline annotations.
pub struct SearchSerpAdapter {
    pub name: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub client: reqwest::Client,
}

#[async_trait]
impl ProviderAdapter for SearchSerpAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_async(&self) -> bool {
        false
    }

    async fn health_check(&self) -> Result<(), CollectorError> {
        let resp = self.client.head(&self.base_url).send().await.map_err(CollectorError::from)?;
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

        let resp = self
            .client
            .get(&self.base_url)
            .query(&[
                ("q", req.prompt.as_str()),
                ("locale", req.locale.as_deref().unwrap_or("")),
                ("gl", req.country.as_deref().unwrap_or("")),
            ])
            .bearer_auth(api_key)
            .send()
            .await
            .map_err(CollectorError::from)?;

        if !resp.status().is_success() {
            return Err(match resp.status().as_u16() {
                401 | 403 => CollectorError::new(ErrorKind::Auth, "unauthorized"),
                s if s >= 500 => CollectorError::new(ErrorKind::Transport, "server error"),
                _ => CollectorError::new(ErrorKind::InvalidInput, "bad request"),
            });
        }

        let parsed: Value = resp.json().await.map_err(CollectorError::from)?;

        let answer = render_text_blocks(&parsed);
        if answer.is_empty() {
            return Err(CollectorError::new(ErrorKind::EmptyResponse, "no text blocks in response"));
        }
        let urls = collect_reference_urls(&parsed);

        Ok(AdapterOutcome::Sync(NormalizedAnswer {
            answer,
            citations: urls.clone(),
            urls,
            model_used: None,
            metadata: parsed,
        }))
    }
}

fn render_text_blocks(root: &Value) -> String {
    let Some(blocks) = root.get("text_blocks").and_then(Value::as_array) else {
        return String::new();
    };
    let mut lines = Vec::new();
    for block in blocks {
        let kind = block.get("type").and_then(Value::as_str).unwrap_or("paragraph");
        let text = block.get("text").and_then(Value::as_str).unwrap_or("");
        if text.is_empty() {
            continue;
        }
        match kind {
            "heading" => lines.push(format!("## {text}")),
            "list_item" => lines.push(format!("- {text}")),
            "code" => lines.push(format!("```\n{text}\n```")),
            _ => lines.push(text.to_string()),
        }
    }
    lines.join("\n")
}

/// Unions the SERP-specific top-level `references` list with the
/// shared `normalizer::extract_urls` walk, which already covers per-block
/// `snippet_links` (and every other shape `SPEC_FULL.md` §4.2 names)
/// recursively over `text_blocks`.
fn collect_reference_urls(root: &Value) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut ordered = Vec::new();
    let mut push = |s: &str| {
        if (s.starts_with("http://") || s.starts_with("https://")) && seen.insert(s.to_string()) {
            ordered.push(s.to_string());
        }
    };

    if let Some(refs) = root.get("references").and_then(Value::as_array) {
        for r in refs {
            if let Some(s) = r.as_str().or_else(|| r.get("url").and_then(Value::as_str)) {
                push(s);
            }
        }
    }
    for url in normalizer::extract_urls(root) {
        push(&url);
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_headings_lists_and_code_blocks() {
        let payload = json!({
            "text_blocks": [
                {"type": "heading", "text": "Overview"},
                {"type": "paragraph", "text": "Some body text."},
                {"type": "list_item", "text": "first point"},
                {"type": "code", "text": "let x = 1;"},
            ]
        });
        let rendered = render_text_blocks(&payload);
        assert!(rendered.contains("## Overview"));
        assert!(rendered.contains("- first point"));
        assert!(rendered.contains("```\nlet x = 1;\n```"));
    }

    #[test]
    fn collects_and_dedupes_references_and_inline_links() {
        let payload = json!({
            "references": ["https://a.example"],
            "text_blocks": [
                {"type": "paragraph", "text": "x", "snippet_links": ["https://a.example", "https://b.example"]}
            ]
        });
        assert_eq!(
            collect_reference_urls(&payload),
            vec!["https://a.example", "https://b.example"]
        );
    }
}
