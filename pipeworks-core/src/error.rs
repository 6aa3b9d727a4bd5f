//! Backend error payloads
//!
//! Backends reject requests with either a plain message or a structured
//! object (validation reports, nested errors). Both are kept verbatim.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Detail attached to a backend rejection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorDetail {
    Message(String),
    Structured(JsonValue),
}

impl ErrorDetail {
    /// Fields checked, in order, when a JSON error body is an object
    const DETAIL_FIELDS: [&'static str; 3] = ["detail", "message", "error"];

    /// Extracts the detail from a raw response body
    ///
    /// JSON objects yield their `detail`, `message` or `error` field (first
    /// non-null wins), or the whole object when none is present. Non-JSON
    /// bodies are kept as text; empty bodies fall back to the status code.
    pub fn from_body(status: u16, body: &str) -> Self {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            return Self::Message(format!("HTTP {}", status));
        }

        match serde_json::from_str::<JsonValue>(trimmed) {
            Ok(JsonValue::Object(map)) => {
                let picked = Self::DETAIL_FIELDS
                    .iter()
                    .find_map(|field| map.get(*field).filter(|v| !v.is_null()).cloned());
                match picked {
                    Some(value) => Self::from_value(value),
                    None => Self::Structured(JsonValue::Object(map)),
                }
            }
            Ok(value) => Self::from_value(value),
            Err(_) => Self::Message(trimmed.to_string()),
        }
    }

    /// Wraps a JSON value, unwrapping plain strings into messages
    pub fn from_value(value: JsonValue) -> Self {
        match value {
            JsonValue::String(message) => Self::Message(message),
            other => Self::Structured(other),
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, Self::Structured(_))
    }

    /// Multi-line rendering for terminals; structured details are pretty-printed
    pub fn render_pretty(&self) -> String {
        match self {
            Self::Message(message) => message.clone(),
            Self::Structured(value) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
        }
    }
}

impl std::fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Message(message) => write!(f, "{}", message),
            Self::Structured(value) => write!(f, "{}", value),
        }
    }
}

impl From<String> for ErrorDetail {
    fn from(message: String) -> Self {
        Self::Message(message)
    }
}

impl From<&str> for ErrorDetail {
    fn from(message: &str) -> Self {
        Self::Message(message.to_string())
    }
}
