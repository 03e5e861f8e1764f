use anyhow::{Context, Result};
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{Config, normalize_base_url};
use crate::model::research_conversation;
use crate::providers::http_errors::{classify_transport_error, describe_error_chain};
use crate::value::JsonObject;

pub const USER_AGENT_VALUE: &str = "grok-search/1.0";
pub const TEMPERATURE: f64 = 0.2;

/// Why the single chat-completions call did not produce a response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestFailure {
    HttpStatus { status: u16, detail: String },
    Transport { detail: String },
}

impl RequestFailure {
    fn transport(detail: impl Into<String>) -> Self {
        Self::Transport {
            detail: detail.into(),
        }
    }

    pub fn error_label(&self) -> String {
        match self {
            Self::HttpStatus { status, .. } => format!("HTTP {status}"),
            Self::Transport { .. } => "request_failed".to_string(),
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            Self::HttpStatus { detail, .. } | Self::Transport { detail } => detail,
        }
    }
}

pub fn chat_completions_url(base_url: &str) -> String {
    format!("{}/v1/chat/completions", normalize_base_url(base_url))
}

pub fn build_request_body(cfg: &Config, query: &str) -> Result<JsonObject> {
    let mut body = JsonObject::new();
    body.insert("model".to_string(), Value::from(cfg.model.clone()));
    body.insert(
        "messages".to_string(),
        serde_json::to_value(research_conversation(query))
            .context("Failed to encode chat messages")?,
    );
    body.insert("temperature".to_string(), Value::from(TEMPERATURE));
    body.insert("stream".to_string(), Value::Bool(false));
    body.extend(cfg.extra_body.clone());
    Ok(body)
}

pub fn build_headers(cfg: &Config) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cfg.api_key))
            .context("API key is not a valid header value")?,
    );
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

    for (name, value) in &cfg.extra_headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .with_context(|| format!("Invalid extra header name '{name}'"))?;
        let text = match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        let header_value = HeaderValue::from_str(&text)
            .with_context(|| format!("Invalid value for extra header '{name}'"))?;
        headers.insert(header_name, header_value);
    }
    Ok(headers)
}

fn request_timeout(timeout_seconds: f64) -> Duration {
    Duration::try_from_secs_f64(timeout_seconds).unwrap_or(Duration::MAX)
}

/// Performs the one POST of a run and returns the decoded response object.
pub async fn send(cfg: &Config, query: &str) -> std::result::Result<JsonObject, RequestFailure> {
    let api_url = chat_completions_url(&cfg.base_url);
    let body = build_request_body(cfg, query)
        .and_then(|body| serde_json::to_vec(&body).context("Failed to encode request body"))
        .map_err(|err| RequestFailure::transport(format!("{err:#}")))?;
    let headers = build_headers(cfg).map_err(|err| RequestFailure::transport(format!("{err:#}")))?;

    let client = Client::builder()
        .timeout(request_timeout(cfg.timeout_seconds))
        .build()
        .map_err(|err| RequestFailure::transport(describe_error_chain(&err)))?;

    debug!(
        api_url = %api_url,
        model = %cfg.model,
        body_len = body.len(),
        extra_header_count = cfg.extra_headers.len(),
        "sending chat completions request"
    );

    let response = client
        .post(&api_url)
        .headers(headers)
        .body(body)
        .send()
        .await
        .map_err(|err| {
            let kind = classify_transport_error(&err);
            warn!(
                api_url = %api_url,
                model = %cfg.model,
                kind = %kind,
                error = %err,
                "chat completions request failed"
            );
            RequestFailure::transport(describe_error_chain(&err))
        })?;

    let status = response.status();
    if !status.is_success() {
        let response_body = response.text().await.unwrap_or_default();
        warn!(
            api_url = %api_url,
            model = %cfg.model,
            status = %status,
            response_body_len = response_body.len(),
            "chat completions returned non-success status"
        );
        let detail = if response_body.is_empty() {
            status.to_string()
        } else {
            response_body
        };
        return Err(RequestFailure::HttpStatus {
            status: status.as_u16(),
            detail,
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|err| RequestFailure::transport(describe_error_chain(&err)))?;
    let text = String::from_utf8_lossy(&bytes);
    let parsed: Value = serde_json::from_str(&text).map_err(|err| {
        warn!(api_url = %api_url, error = %err, "chat completions response is not JSON");
        RequestFailure::transport(format!("Failed to parse chat completions response: {err}"))
    })?;

    match parsed {
        Value::Object(map) => {
            debug!(
                model = %cfg.model,
                response_len = bytes.len(),
                "received chat completions response"
            );
            Ok(map)
        }
        _ => Err(RequestFailure::transport(
            "Chat completions response is not a JSON object",
        )),
    }
}

#[cfg(test)]
mod tests {
    use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
    use serde_json::json;
    use std::path::PathBuf;

    use super::{
        RequestFailure, TEMPERATURE, USER_AGENT_VALUE, build_headers, build_request_body,
        chat_completions_url, request_timeout,
    };
    use crate::config::Config;
    use crate::value::JsonObject;

    fn test_config() -> Config {
        Config {
            base_url: "https://x.test".to_string(),
            api_key: "secret".to_string(),
            model: "grok-2-latest".to_string(),
            timeout_seconds: 60.0,
            extra_headers: JsonObject::new(),
            extra_body: JsonObject::new(),
            config_path: PathBuf::from("/tmp/config.json"),
        }
    }

    fn object(value: serde_json::Value) -> JsonObject {
        match value {
            serde_json::Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn chat_completions_url_appends_v1_path_once() {
        assert_eq!(
            chat_completions_url("https://x.test/"),
            "https://x.test/v1/chat/completions"
        );
        assert_eq!(
            chat_completions_url("https://x.test/v1"),
            "https://x.test/v1/chat/completions"
        );
    }

    #[test]
    fn request_body_has_fixed_fields() {
        let body = build_request_body(&test_config(), "latest rust release")
            .expect("body should build");

        assert_eq!(body.get("model"), Some(&json!("grok-2-latest")));
        assert_eq!(body.get("temperature"), Some(&json!(TEMPERATURE)));
        assert_eq!(body.get("stream"), Some(&json!(false)));
        let messages = body
            .get("messages")
            .and_then(|value| value.as_array())
            .expect("messages array");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], json!("system"));
        assert_eq!(messages[1], json!({"role": "user", "content": "latest rust release"}));
    }

    #[test]
    fn extra_body_overrides_and_extends() {
        let mut cfg = test_config();
        cfg.extra_body = object(json!({
            "temperature": 0.9,
            "model": "grok-4",
            "search_parameters": {"mode": "on"}
        }));

        let body = build_request_body(&cfg, "q").expect("body should build");
        assert_eq!(body.get("temperature"), Some(&json!(0.9)));
        assert_eq!(body.get("model"), Some(&json!("grok-4")));
        assert_eq!(
            body.get("search_parameters"),
            Some(&json!({"mode": "on"}))
        );
    }

    #[test]
    fn headers_carry_defaults_and_stringified_extras() {
        let mut cfg = test_config();
        cfg.extra_headers = object(json!({
            "X-Trace": "abc",
            "X-Retries": 3,
            "user-agent": "custom/2.0"
        }));

        let headers = build_headers(&cfg).expect("headers should build");
        assert_eq!(headers[CONTENT_TYPE], "application/json");
        assert_eq!(headers[AUTHORIZATION], "Bearer secret");
        assert_eq!(headers["x-trace"], "abc");
        assert_eq!(headers["x-retries"], "3");
        assert_eq!(headers[USER_AGENT], "custom/2.0");
        assert_ne!(headers[USER_AGENT], USER_AGENT_VALUE);
    }

    #[test]
    fn invalid_extra_header_name_is_an_error() {
        let mut cfg = test_config();
        cfg.extra_headers = object(json!({"bad header": "x"}));
        let err = build_headers(&cfg).expect_err("space is not allowed in header names");
        assert!(
            err.to_string().contains("bad header"),
            "unexpected message: {err}"
        );
    }

    #[test]
    fn failure_labels_match_output_contract() {
        let http = RequestFailure::HttpStatus {
            status: 500,
            detail: "boom".to_string(),
        };
        assert_eq!(http.error_label(), "HTTP 500");
        assert_eq!(http.detail(), "boom");

        let transport = RequestFailure::Transport {
            detail: "refused".to_string(),
        };
        assert_eq!(transport.error_label(), "request_failed");
        assert_eq!(transport.detail(), "refused");
    }

    #[test]
    fn request_timeout_handles_fractional_and_huge_values() {
        assert_eq!(request_timeout(1.5).as_millis(), 1500);
        assert_eq!(request_timeout(f64::MAX), std::time::Duration::MAX);
    }
}
