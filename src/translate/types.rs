//! Inbound and outbound request documents.
//!
//! Field values are kept as raw JSON. The backend validates ranges and types, so a
//! `temperature` of `"hot"` is forwarded exactly as received.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{ProxyError, Result};

/// Tuning parameters forwarded only when the caller names them.
pub const OPTIONAL_PARAMS: [&str; 3] = ["top_p", "frequency_penalty", "presence_penalty"];

/// An inbound chat-completions request, reduced to the fields the proxy forwards.
///
/// `None` means the key was absent. A key present with `null` is `Some(Value::Null)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatRequest {
    pub messages: Option<Value>,
    pub model: Option<Value>,
    pub temperature: Option<Value>,
    pub max_tokens: Option<Value>,
    pub stream: Option<Value>,
    /// Keys from [`OPTIONAL_PARAMS`] that were present, with their values untouched.
    pub tuning: Map<String, Value>,
}

impl ChatRequest {
    /// Parse a raw request body.
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        let doc: Value = serde_json::from_slice(body)?;
        Self::from_value(doc)
    }

    /// Extract the forwarded fields from an already parsed document.
    pub fn from_value(doc: Value) -> Result<Self> {
        let mut fields = match doc {
            Value::Object(map) => map,
            other => {
                return Err(ProxyError::translation(format!(
                    "request body must be a JSON object, got {}",
                    json_kind(&other)
                )))
            }
        };

        let mut tuning = Map::new();
        for name in OPTIONAL_PARAMS {
            if let Some(value) = fields.remove(name) {
                tuning.insert(name.to_string(), value);
            }
        }

        Ok(Self {
            messages: fields.remove("messages"),
            model: fields.remove("model"),
            temperature: fields.remove("temperature"),
            max_tokens: fields.remove("max_tokens"),
            stream: fields.remove("stream"),
            tuning,
        })
    }

    /// Whether the caller asked for an event stream. Anything falsy, or no flag, is `false`.
    pub fn is_streaming(&self) -> bool {
        self.stream.as_ref().is_some_and(is_truthy)
    }

    /// The requested model as text, for logging.
    pub fn model_name(&self) -> Option<String> {
        self.model.as_ref().map(|m| match m {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}

/// The document POSTed to the backend's `/chat/completions`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendPayload {
    pub model: Value,
    pub messages: Value,
    pub temperature: Value,
    pub max_tokens: Value,
    pub stream: Value,
    #[serde(flatten)]
    pub tuning: Map<String, Value>,
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
