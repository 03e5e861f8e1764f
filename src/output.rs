use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::io::Write;
use std::process::ExitCode;

use crate::reply::Source;

pub const EXIT_REQUEST_FAILED: u8 = 1;
pub const EXIT_SETUP_ERROR: u8 = 2;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchSuccess {
    pub ok: bool,
    pub query: String,
    pub config_path: String,
    pub base_url: String,
    pub model: String,
    pub content: String,
    pub sources: Vec<Source>,
    pub raw: String,
    pub usage: Value,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchFailure {
    pub ok: bool,
    pub error: String,
    pub detail: String,
    pub config_path: String,
    pub base_url: String,
    pub model: String,
    pub elapsed_ms: u64,
}

/// The single JSON object a run prints. Field order is the wire order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SearchOutput {
    Success(SearchSuccess),
    Failure(SearchFailure),
}

impl SearchOutput {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Success(_) => ExitCode::SUCCESS,
            Self::Failure(_) => ExitCode::from(EXIT_REQUEST_FAILED),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("Failed to encode search result")
    }

    /// Writes compact JSON with no trailing newline.
    pub fn write_to(&self, out: &mut impl Write) -> Result<()> {
        out.write_all(self.to_json()?.as_bytes())
            .context("Failed to write search result")?;
        out.flush().context("Failed to flush stdout")
    }
}
