use anyhow::{Context, Result, anyhow};
use directories::BaseDirs;
use serde_json::Value;
use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::cli::Args;
use crate::value::{self, JsonObject};

pub const DEFAULT_MODEL: &str = "grok-2-latest";
pub const DEFAULT_TIMEOUT_SECONDS: f64 = 60.0;

const ENV_CONFIG_PATH: &str = "GROK_CONFIG_PATH";
const ENV_BASE_URL: &str = "GROK_BASE_URL";
const ENV_API_KEY: &str = "GROK_API_KEY";
const ENV_MODEL: &str = "GROK_MODEL";
const ENV_TIMEOUT_SECONDS: &str = "GROK_TIMEOUT_SECONDS";
const ENV_EXTRA_BODY_JSON: &str = "GROK_EXTRA_BODY_JSON";
const ENV_EXTRA_HEADERS_JSON: &str = "GROK_EXTRA_HEADERS_JSON";

const API_KEY_PLACEHOLDERS: &[&str] = &["YOUR_API_KEY", "API_KEY", "CHANGE_ME", "REPLACE_ME"];
const BASE_URL_PLACEHOLDERS: &[&str] = &[
    "https://your-grok-endpoint.example",
    "YOUR_BASE_URL",
    "BASE_URL",
    "CHANGE_ME",
    "REPLACE_ME",
];

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout_seconds: f64,
    pub extra_headers: JsonObject,
    pub extra_body: JsonObject,
    pub config_path: PathBuf,
}

/// The config file chosen for this run. `values` is empty when the file
/// does not exist.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub path: PathBuf,
    pub values: JsonObject,
}

impl ConfigFile {
    fn field(&self, key: &str) -> Option<String> {
        Some(value::text_of(self.values.get(key)))
    }
}

impl Config {
    pub fn resolve(args: &Args) -> Result<Self> {
        Self::resolve_with(args, |key| env::var(key).ok(), &default_candidate_paths())
    }

    fn resolve_with(
        args: &Args,
        mut get_var: impl FnMut(&str) -> Option<String>,
        candidates: &[PathBuf],
    ) -> Result<Self> {
        let explicit_path = [args.config.clone(), get_var(ENV_CONFIG_PATH)]
            .into_iter()
            .flatten()
            .map(|raw| raw.trim().to_string())
            .find(|raw| !raw.is_empty())
            .map(PathBuf::from);
        let file = select_config_file(explicit_path.as_deref(), candidates)?;
        let config_path = file.path.clone();

        let base_url = first_present(
            [
                args.base_url.clone(),
                get_var(ENV_BASE_URL),
                file.field("base_url"),
            ],
            normalize_base_url_value,
        );
        let api_key = first_present(
            [
                args.api_key.clone(),
                get_var(ENV_API_KEY),
                file.field("api_key"),
            ],
            normalize_api_key,
        );
        let mut model = first_present(
            [args.model.clone(), get_var(ENV_MODEL), file.field("model")],
            |raw| raw.trim().to_string(),
        );
        if model.is_empty() {
            model = DEFAULT_MODEL.to_string();
        }

        let env_timeout = get_var(ENV_TIMEOUT_SECONDS);
        if let Some(raw) = env_timeout.as_deref()
            && !raw.trim().is_empty()
            && parse_timeout_seconds(raw).is_none()
        {
            warn!(value = %raw, "ignoring invalid {}", ENV_TIMEOUT_SECONDS);
        }
        let timeout_seconds = resolve_timeout_seconds(
            args.timeout_seconds,
            env_timeout.as_deref(),
            file.values.get("timeout_seconds"),
        );

        if base_url.is_empty() {
            return Err(anyhow!(
                "Missing base URL: set {}, write it to config, or pass --base-url\nConfig path: {}",
                ENV_BASE_URL,
                config_path.display()
            ));
        }
        if api_key.is_empty() {
            return Err(anyhow!(
                "Missing API key: set {}, write it to config, or pass --api-key\nConfig path: {}",
                ENV_API_KEY,
                config_path.display()
            ));
        }

        let extra_body = merge_extra(
            file.values.get("extra_body"),
            [
                (get_var(ENV_EXTRA_BODY_JSON), ENV_EXTRA_BODY_JSON),
                (args.extra_body_json.clone(), "--extra-body-json"),
            ],
        )
        .map_err(|err| anyhow!("Invalid JSON: {err:#}"))?;
        let extra_headers = merge_extra(
            file.values.get("extra_headers"),
            [
                (get_var(ENV_EXTRA_HEADERS_JSON), ENV_EXTRA_HEADERS_JSON),
                (args.extra_headers_json.clone(), "--extra-headers-json"),
            ],
        )
        .map_err(|err| anyhow!("Invalid JSON: {err:#}"))?;

        let cfg = Self {
            base_url,
            api_key,
            model,
            timeout_seconds,
            extra_headers,
            extra_body,
            config_path,
        };
        info!(
            config_path = %cfg.config_path.display(),
            base_url = %cfg.base_url,
            model = %cfg.model,
            timeout_seconds = cfg.timeout_seconds,
            extra_body_keys = cfg.extra_body.len(),
            extra_header_keys = cfg.extra_headers.len(),
            "resolved configuration"
        );
        Ok(cfg)
    }
}

pub fn default_candidate_paths() -> Vec<PathBuf> {
    let root = skill_root();
    vec![
        root.join("config.json"),
        root.join("config.local.json"),
        user_config_path(),
    ]
}

// Binaries ship as <skill>/bin/grok-search, so the skill root sits two levels up.
fn skill_root() -> PathBuf {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().and_then(Path::parent).map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn user_config_path() -> PathBuf {
    let home = BaseDirs::new()
        .map(|dirs| dirs.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("~"));
    home.join(".codex").join("config").join("grok-search.json")
}

/// Picks the config file for this run.
///
/// An explicit path is the only candidate. Otherwise the defaults are
/// scanned in order and the first one holding a real API key wins; failing
/// that, the first existing file, and failing that, the first default path
/// with no values. A broken file anywhere in the scan is fatal.
pub fn select_config_file(explicit: Option<&Path>, candidates: &[PathBuf]) -> Result<ConfigFile> {
    if let Some(path) = explicit {
        let values = load_config_file(path).map_err(|err| invalid_config(path, err))?;
        debug!(config_path = %path.display(), "using explicit config file");
        return Ok(ConfigFile {
            path: path.to_path_buf(),
            values,
        });
    }

    let mut fallback: Option<ConfigFile> = None;
    for candidate in candidates {
        if !candidate.exists() {
            continue;
        }

        let values = load_config_file(candidate).map_err(|err| invalid_config(candidate, err))?;
        let file = ConfigFile {
            path: candidate.clone(),
            values,
        };
        if !normalize_api_key(&value::text_of(file.values.get("api_key"))).is_empty() {
            debug!(config_path = %candidate.display(), "selected config file with api key");
            return Ok(file);
        }
        if fallback.is_none() {
            fallback = Some(file);
        }
    }

    if let Some(file) = fallback {
        debug!(config_path = %file.path.display(), "selected config file without api key");
        return Ok(file);
    }

    let path = candidates.first().cloned().unwrap_or_default();
    debug!(config_path = %path.display(), "no config file found");
    Ok(ConfigFile {
        path,
        values: JsonObject::new(),
    })
}

fn invalid_config(path: &Path, err: anyhow::Error) -> anyhow::Error {
    anyhow!("Invalid config ({}): {:#}", path.display(), err)
}

/// Reads a JSON object config file, tolerating a UTF-8 byte-order mark.
/// A missing file reads as an empty object.
pub fn load_config_file(path: &Path) -> Result<JsonObject> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(JsonObject::new()),
        Err(err) => return Err(err).context("failed to read config file"),
    };
    let text = std::str::from_utf8(&bytes).context("config is not valid UTF-8")?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let parsed: Value = serde_json::from_str(text).context("config is not valid JSON")?;
    match parsed {
        Value::Object(map) => Ok(map),
        _ => Err(anyhow!("config must be a JSON object")),
    }
}

fn first_present<const N: usize>(
    sources: [Option<String>; N],
    normalize: impl Fn(&str) -> String,
) -> String {
    sources
        .into_iter()
        .flatten()
        .map(|raw| normalize(&raw))
        .find(|value| !value.is_empty())
        .unwrap_or_default()
}

fn is_placeholder(value: &str, placeholders: &[&str]) -> bool {
    placeholders
        .iter()
        .any(|placeholder| placeholder.eq_ignore_ascii_case(value))
}

pub fn normalize_api_key(raw: &str) -> String {
    let key = raw.trim();
    if key.is_empty() || is_placeholder(key, API_KEY_PLACEHOLDERS) {
        return String::new();
    }
    key.to_string()
}

pub fn normalize_base_url_value(raw: &str) -> String {
    let url = raw.trim();
    if url.is_empty() || is_placeholder(url, BASE_URL_PLACEHOLDERS) {
        return String::new();
    }
    normalize_base_url(url)
}

/// Strips trailing slashes and a trailing `/v1`, so the request path can
/// always be appended as `/v1/chat/completions`.
pub fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    trimmed
        .strip_suffix("/v1")
        .unwrap_or(trimmed)
        .trim_end_matches('/')
        .to_string()
}

fn parse_timeout_seconds(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && *value > 0.0)
}

fn resolve_timeout_seconds(flag: Option<f64>, env: Option<&str>, file: Option<&Value>) -> f64 {
    flag.filter(|value| value.is_finite() && *value > 0.0)
        .or_else(|| env.and_then(parse_timeout_seconds))
        .or_else(|| match file {
            Some(Value::Number(number)) => number
                .as_f64()
                .filter(|value| value.is_finite() && *value > 0.0),
            Some(Value::String(raw)) => parse_timeout_seconds(raw),
            _ => None,
        })
        .unwrap_or(DEFAULT_TIMEOUT_SECONDS)
}

/// Layers extra body/header objects: the config file's object first, then
/// each raw JSON source in order. Later keys overwrite earlier ones.
fn merge_extra<const N: usize>(
    file_value: Option<&Value>,
    layers: [(Option<String>, &str); N],
) -> Result<JsonObject> {
    let mut merged = match file_value {
        Some(Value::Object(map)) => map.clone(),
        _ => JsonObject::new(),
    };
    for (raw, label) in layers {
        let layer = value::parse_object(raw.as_deref().unwrap_or_default(), label)?;
        merged.extend(layer);
    }
    Ok(merged)
}
