use anyhow::{Context, Result, anyhow};
use serde_json::{Map, Value};

pub type JsonObject = Map<String, Value>;

/// Mirrors the loose "is this set" test config files and model replies get:
/// null, false, zero, and empty strings/arrays/objects all count as unset.
pub fn is_set(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Renders a loosely typed JSON field as text. Strings come back verbatim,
/// other set values as compact JSON, unset values as "".
pub fn text_of(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(text)) => text.clone(),
        Some(other) if is_set(other) => other.to_string(),
        _ => String::new(),
    }
}

/// Parses user-supplied JSON that must be an object. Blank input is an
/// empty object.
pub fn parse_object(raw: &str, label: &str) -> Result<JsonObject> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(JsonObject::new());
    }

    let value: Value =
        serde_json::from_str(raw).with_context(|| format!("{label} is not valid JSON"))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(anyhow!("{label} must be a JSON object")),
    }
}
