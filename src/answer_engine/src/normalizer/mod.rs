//! Shared response normalization utilities.
//!
//! Provider payloads are wildly heterogeneous (nested objects, arrays,
//! markdown, HTML). These functions never fail: an unrecognized shape
//! yields an empty result rather than an error, the same tolerant-of-
//! malformed-fragments posture as the host's resilient SSE response types
//! (`clients/ai_provider/resilient_types.rs`).

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeSet;

static URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"https?://[^\s<>"{}|\\^`\[\]]+"#).expect("static URL regex is valid")
});

static MARKDOWN_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[[^\]]*\]\((https?://[^)\s]+)\)").expect("static markdown-link regex is valid"));

/// Extracts plain answer text from a provider payload, trying known shapes
/// in the precedence order documented in `SPEC_FULL.md` §4.2.
pub fn extract_answer(root: &Value) -> String {
    if let Some(text) = try_results_path(root) {
        return text;
    }
    if let Some(text) = try_content_path(root) {
        return text;
    }
    if let Some(text) = try_flat_answer_fields(root) {
        return text;
    }
    if let Some(html) = root.get("answer_section_html").and_then(Value::as_str) {
        return strip_html_tags(html);
    }
    if let Some(text) = try_answer_results(root) {
        return text;
    }
    String::new()
}

fn try_results_path(root: &Value) -> Option<String> {
    let content = root.get("results")?.get(0)?.get("content")?;
    for key in [
        "response_text",
        "markdown_text",
        "answer_results_md",
    ] {
        if let Some(s) = content.get(key).and_then(Value::as_str) {
            if !s.is_empty() {
                return Some(s.to_string());
            }
        }
    }
    if let Some(nodes) = content.get("markdown_json") {
        let collected = collect_markdown_json(nodes);
        if !collected.is_empty() {
            return Some(collected);
        }
    }
    if let Some(s) = content.get("text").and_then(Value::as_str) {
        if !s.is_empty() {
            return Some(s.to_string());
        }
    }
    None
}

fn collect_markdown_json(node: &Value) -> String {
    let mut lines = Vec::new();
    collect_markdown_json_into(node, &mut lines);
    lines.join("\n")
}

fn collect_markdown_json_into(node: &Value, lines: &mut Vec<String>) {
    match node {
        Value::Object(map) => {
            if let Some(raw) = map.get("raw").and_then(Value::as_str) {
                lines.push(raw.to_string());
            }
            if let Some(items) = map.get("items").and_then(Value::as_array) {
                for item in items {
                    collect_markdown_json_into(item, lines);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_markdown_json_into(item, lines);
            }
        }
        _ => {}
    }
}

fn try_content_path(root: &Value) -> Option<String> {
    let content = root.get("content")?;
    if let Some(s) = content.as_str() {
        if !s.is_empty() {
            return Some(s.to_string());
        }
    }
    if let Some(s) = content.get("text").and_then(Value::as_str) {
        if !s.is_empty() {
            return Some(s.to_string());
        }
    }
    if let Some(arr) = content.as_array() {
        let joined: String = arr
            .iter()
            .filter_map(|v| v.as_str().or_else(|| v.get("text").and_then(Value::as_str)))
            .collect::<Vec<_>>()
            .join("\n");
        if !joined.is_empty() {
            return Some(joined);
        }
    }
    None
}

fn try_flat_answer_fields(root: &Value) -> Option<String> {
    for key in ["answer_text", "answer", "response", "content"] {
        if let Some(s) = root.get(key).and_then(Value::as_str) {
            if !s.is_empty() {
                return Some(s.to_string());
            }
        }
    }
    None
}

fn try_answer_results(root: &Value) -> Option<String> {
    let items = root.get("answer_results")?.as_array()?;
    if items.is_empty() {
        return None;
    }
    let mut lines = Vec::new();
    for item in items {
        if let Some(rows) = item.get("table").and_then(Value::as_array) {
            for row in rows {
                if let Some(cells) = row.as_array() {
                    let rendered: Vec<String> = cells
                        .iter()
                        .map(|c| c.as_str().unwrap_or_default().to_string())
                        .collect();
                    lines.push(format!("| {} |", rendered.join(" | ")));
                }
            }
        } else if let Some(s) = item.as_str() {
            lines.push(format!("- {s}"));
        } else if let Some(s) = item.get("text").and_then(Value::as_str) {
            lines.push(format!("- {s}"));
        }
    }
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

fn strip_html_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.trim().to_string()
}

/// Collects citation/source URLs from every known location, deduplicating
/// while preserving first-seen order, restricted to `http(s)` schemes.
pub fn extract_urls(root: &Value) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut ordered = Vec::new();
    let mut push = |url: String| {
        let trimmed = url.trim_end_matches(|c: char| ".,;:!?)\"'".contains(c)).to_string();
        if (trimmed.starts_with("http://") || trimmed.starts_with("https://"))
            && seen.insert(trimmed.clone())
        {
            ordered.push(trimmed);
        }
    };

    for key in ["citations", "sources", "urls", "links"] {
        if let Some(arr) = root.get(key).and_then(Value::as_array) {
            for v in arr {
                if let Some(s) = v.as_str() {
                    push(s.to_string());
                } else if let Some(s) = v.get("url").and_then(Value::as_str) {
                    push(s.to_string());
                }
            }
        }
    }

    walk_for_links(root, &mut push);

    let answer_text = extract_answer(root);
    for cap in MARKDOWN_LINK_RE.captures_iter(&answer_text) {
        push(cap[1].to_string());
    }
    for m in URL_RE.find_iter(&answer_text) {
        push(m.as_str().to_string());
    }

    ordered
}

fn walk_for_links(node: &Value, push: &mut impl FnMut(String)) {
    match node {
        Value::Object(map) => {
            if let Some(links) = map.get("snippet_links").and_then(Value::as_array) {
                for l in links {
                    if let Some(s) = l.as_str().or_else(|| l.get("url").and_then(Value::as_str)) {
                        push(s.to_string());
                    }
                }
            }
            if let Some(annotations) = map.get("annotations") {
                for key in ["url", "link", "source", "href"] {
                    if let Some(s) = annotations.get(key).and_then(Value::as_str) {
                        push(s.to_string());
                    }
                }
            }
            for v in map.values() {
                walk_for_links(v, push);
            }
        }
        Value::Array(items) => {
            for item in items {
                walk_for_links(item, push);
            }
        }
        _ => {}
    }
}

/// Extracts a provider-reported model identifier, if present.
pub fn extract_model(root: &Value) -> Option<String> {
    for path in [&["content", "llm_model"][..], &["content", "model"], &["llm_model"]] {
        let mut cur = root;
        let mut ok = true;
        for key in path {
            match cur.get(key) {
                Some(v) => cur = v,
                None => {
                    ok = false;
                    break;
                }
            }
        }
        if ok {
            if let Some(s) = cur.as_str() {
                return Some(s.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_response_text_from_results_path() {
        let payload = json!({
            "results": [{ "content": { "response_text": "hello world" } }]
        });
        assert_eq!(extract_answer(&payload), "hello world");
    }

    #[test]
    fn falls_back_through_precedence_order() {
        let payload = json!({ "answer": "fallback answer" });
        assert_eq!(extract_answer(&payload), "fallback answer");
    }

    #[test]
    fn strips_html_when_only_html_present() {
        let payload = json!({ "answer_section_html": "<p>Hi <b>there</b></p>" });
        assert_eq!(extract_answer(&payload), "Hi there");
    }

    #[test]
    fn unrecognized_shape_yields_empty_string() {
        let payload = json!({ "unexpected": 123 });
        assert_eq!(extract_answer(&payload), "");
    }

    #[test]
    fn urls_deduplicated_preserving_first_seen_order() {
        let payload = json!({
            "citations": ["https://a.example", "https://b.example", "https://a.example"]
        });
        assert_eq!(
            extract_urls(&payload),
            vec!["https://a.example", "https://b.example"]
        );
    }

    #[test]
    fn non_http_urls_are_dropped() {
        let payload = json!({ "urls": ["ftp://x", "https://ok.example"] });
        assert_eq!(extract_urls(&payload), vec!["https://ok.example"]);
    }

    #[test]
    fn extracts_urls_from_markdown_in_answer_text() {
        let payload = json!({ "answer": "see [here](https://docs.example/page) for more" });
        assert_eq!(extract_urls(&payload), vec!["https://docs.example/page"]);
    }

    #[test]
    fn extracts_model_from_nested_content() {
        let payload = json!({ "content": { "llm_model": "gpt-4" } });
        assert_eq!(extract_model(&payload), Some("gpt-4".to_string()));
    }

    #[test]
    fn malformed_fragments_never_panic() {
        let payload = json!({ "results": [null], "citations": "not-an-array" });
        assert_eq!(extract_answer(&payload), "");
        assert!(extract_urls(&payload).is_empty());
    }
}
