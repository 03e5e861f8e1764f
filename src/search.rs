use serde_json::Value;
use std::time::Instant;
use tracing::debug;

use crate::config::Config;
use crate::output::{SearchFailure, SearchOutput, SearchSuccess};
use crate::providers::chat_completions::{self, RequestFailure};
use crate::reply;
use crate::value::{self, JsonObject};

/// Runs one research query end to end and shapes the result object.
pub async fn run_search(cfg: &Config, query: &str) -> SearchOutput {
    let started = Instant::now();
    let outcome = chat_completions::send(cfg, query).await;
    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    match outcome {
        Ok(response) => SearchOutput::Success(success_output(cfg, query, &response, elapsed_ms)),
        Err(failure) => SearchOutput::Failure(failure_output(cfg, &failure, elapsed_ms)),
    }
}

pub fn success_output(
    cfg: &Config,
    query: &str,
    response: &JsonObject,
    elapsed_ms: u64,
) -> SearchSuccess {
    let message = reply::message_content(response);
    let normalized = reply::normalize(&message);
    debug!(
        message_len = message.len(),
        content_len = normalized.content.len(),
        source_count = normalized.sources.len(),
        structured = normalized.raw.is_empty(),
        "normalized model reply"
    );

    let model = match response.get("model") {
        Some(Value::String(model)) if !model.is_empty() => model.clone(),
        _ => cfg.model.clone(),
    };
    let usage = response
        .get("usage")
        .filter(|usage| value::is_set(usage))
        .cloned()
        .unwrap_or_else(|| Value::Object(JsonObject::new()));

    SearchSuccess {
        ok: true,
        query: query.to_string(),
        config_path: cfg.config_path.display().to_string(),
        base_url: cfg.base_url.clone(),
        model,
        content: normalized.content,
        sources: normalized.sources,
        raw: normalized.raw,
        usage,
        elapsed_ms,
    }
}

pub fn failure_output(cfg: &Config, failure: &RequestFailure, elapsed_ms: u64) -> SearchFailure {
    SearchFailure {
        ok: false,
        error: failure.error_label(),
        detail: failure.detail().to_string(),
        config_path: cfg.config_path.display().to_string(),
        base_url: cfg.base_url.clone(),
        model: cfg.model.clone(),
        elapsed_ms,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use std::path::PathBuf;

    use super::{failure_output, success_output};
    use crate::config::Config;
    use crate::providers::chat_completions::RequestFailure;
    use crate::reply::Source;
    use crate::value::JsonObject;

    fn test_config() -> Config {
        Config {
            base_url: "https://x.test".to_string(),
            api_key: "secret".to_string(),
            model: "grok-2-latest".to_string(),
            timeout_seconds: 60.0,
            extra_headers: JsonObject::new(),
            extra_body: JsonObject::new(),
            config_path: PathBuf::from("/skill/config.json"),
        }
    }

    fn response(value: serde_json::Value) -> JsonObject {
        match value {
            serde_json::Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn success_prefers_reported_model_and_usage() {
        let body = response(json!({
            "model": "grok-3-mini",
            "usage": {"total_tokens": 10},
            "choices": [{"message": {"content": "{\"content\":\"ok\",\"sources\":[]}"}}]
        }));
        let out = success_output(&test_config(), "q", &body, 7);

        assert!(out.ok);
        assert_eq!(out.model, "grok-3-mini");
        assert_eq!(out.usage, json!({"total_tokens": 10}));
        assert_eq!(out.content, "ok");
        assert!(out.sources.is_empty());
        assert_eq!(out.config_path, "/skill/config.json");
        assert_eq!(out.elapsed_ms, 7);
    }

    #[test]
    fn success_falls_back_to_requested_model_and_empty_usage() {
        let body = response(json!({
            "model": "",
            "choices": [{"message": {"content": "read https://a.test/x."}}]
        }));
        let out = success_output(&test_config(), "q", &body, 0);

        assert_eq!(out.model, "grok-2-latest");
        assert_eq!(out.usage, json!({}));
        assert_eq!(out.raw, "read https://a.test/x.");
        assert_eq!(out.sources, vec![Source::bare("https://a.test/x")]);
    }

    #[test]
    fn success_with_missing_choices_is_still_ok() {
        let out = success_output(&test_config(), "q", &response(json!({})), 0);
        assert!(out.ok);
        assert_eq!(out.content, "");
        assert_eq!(out.raw, "");
        assert!(out.sources.is_empty());
    }

    #[test]
    fn failure_carries_context() {
        let failure = RequestFailure::HttpStatus {
            status: 429,
            detail: "slow down".to_string(),
        };
        let out = failure_output(&test_config(), &failure, 3);
        assert!(!out.ok);
        assert_eq!(out.error, "HTTP 429");
        assert_eq!(out.detail, "slow down");
        assert_eq!(out.base_url, "https://x.test");
        assert_eq!(out.model, "grok-2-latest");
    }
}
