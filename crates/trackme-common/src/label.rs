//! Enum-like string fields that the API may return as objects.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A label such as `app` or `autopayment`.
///
/// Written as a plain string, but read back as `{ "status": ..., "highlight": ... }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlexLabel {
    Plain(String),
    Structured(Map<String, Value>),
    Other(Value),
}

impl FlexLabel {
    /// Collapse to the plain string the write endpoints accept.
    ///
    /// Objects yield their `status`, then their `name`, then their JSON text.
    pub fn into_label(self) -> String {
        match self {
            FlexLabel::Plain(label) => label,
            FlexLabel::Structured(map) => ["status", "name"]
                .iter()
                .find_map(|key| map.get(*key).and_then(render_present))
                .unwrap_or_else(|| Value::Object(map).to_string()),
            FlexLabel::Other(Value::String(s)) => s,
            FlexLabel::Other(value) => value.to_string(),
        }
    }
}

impl From<&str> for FlexLabel {
    fn from(s: &str) -> Self {
        FlexLabel::Plain(s.to_string())
    }
}

/// Render a value unless it is empty-ish (null, false, empty string).
fn render_present(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
