use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::value::{self, JsonObject};

static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://[^\s)\]}>"']+"#).expect("URL pattern is a valid regex")
});

const URL_TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', '\'', '"'];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Source {
    pub url: String,
    pub title: String,
    pub snippet: String,
}

impl Source {
    pub fn bare(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: String::new(),
            snippet: String::new(),
        }
    }
}

/// The assistant message either is the requested JSON object or it isn't.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply {
    JsonObject(JsonObject),
    OpaqueText(String),
}

impl ModelReply {
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.starts_with('{')
            && trimmed.ends_with('}')
            && let Ok(Value::Object(map)) = serde_json::from_str::<Value>(trimmed)
        {
            return Self::JsonObject(map);
        }
        Self::OpaqueText(text.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedReply {
    pub content: String,
    pub sources: Vec<Source>,
    pub raw: String,
}

/// Pulls `choices[0].message.content` out of a chat completions response.
/// Anything missing or oddly shaped reads as an empty message.
pub fn message_content(response: &JsonObject) -> String {
    response
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

pub fn normalize(message: &str) -> NormalizedReply {
    match ModelReply::parse(message) {
        ModelReply::JsonObject(parsed) => {
            let content = value::text_of(parsed.get("content"));
            let mut sources = parsed
                .get("sources")
                .and_then(Value::as_array)
                .map(|items| dedupe_sources(items.iter().filter_map(project_source)))
                .unwrap_or_default();
            if sources.is_empty() {
                sources = extract_urls(&content).into_iter().map(Source::bare).collect();
            }
            NormalizedReply {
                content,
                sources,
                raw: String::new(),
            }
        }
        ModelReply::OpaqueText(raw) => NormalizedReply {
            content: String::new(),
            sources: extract_urls(&raw).into_iter().map(Source::bare).collect(),
            raw,
        },
    }
}

fn project_source(item: &Value) -> Option<Source> {
    let item = item.as_object()?;
    let url = value::text_of(item.get("url"));
    if url.is_empty() {
        return None;
    }
    Some(Source {
        url,
        title: value::text_of(item.get("title")),
        snippet: value::text_of(item.get("snippet")),
    })
}

/// Keeps the first source seen for each URL.
fn dedupe_sources(sources: impl Iterator<Item = Source>) -> Vec<Source> {
    let mut seen = HashSet::new();
    sources
        .filter(|source| seen.insert(source.url.clone()))
        .collect()
}

/// Finds http(s) URLs in free text, trims trailing punctuation, and
/// deduplicates them in first-seen order.
pub fn extract_urls(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    URL_PATTERN
        .find_iter(text)
        .map(|found| found.as_str().trim_end_matches(URL_TRAILING_PUNCTUATION))
        .filter(|url| !url.is_empty() && seen.insert(*url))
        .map(str::to_string)
        .collect()
}
