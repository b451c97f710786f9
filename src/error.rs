//! Error types for the proxy.
//!
//! Every fault the proxy itself produces is rendered to the caller as the same
//! [`ErrorEnvelope`] with status 500. Backend-reported errors never pass through here;
//! they are relayed unchanged.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ProxyError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// The inbound document could not be turned into a backend payload.
    #[error("Translation error: {message}")]
    Translation { message: String },

    /// The backend call could not be issued or its reply could not be read.
    #[error("Backend error: {message}")]
    Backend { message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl ProxyError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn translation(msg: impl Into<String>) -> Self {
        Self::Translation {
            message: msg.into(),
        }
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend {
            message: msg.into(),
        }
    }

    /// Render this error as the caller-facing envelope.
    pub fn to_envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope::internal(self.to_string())
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, Json(self.to_envelope())).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ProxyError>;

/// `{"error": {"message", "type", "code"}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: String,
    pub code: String,
}

impl ErrorEnvelope {
    pub fn new(message: impl Into<String>, error_type: &str, code: &str) -> Self {
        Self {
            error: ErrorBody {
                message: message.into(),
                error_type: error_type.to_string(),
                code: code.to_string(),
            },
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(message, "proxy_error", "internal_error")
    }

    /// Used for the terminal chunk of a stream that failed after it started.
    pub fn stream_failure(message: impl Into<String>) -> Self {
        Self::new(message, "proxy_error", "stream_error")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_shape() {
        let err = ProxyError::translation("request body must be a JSON object");
        let value = serde_json::to_value(err.to_envelope()).unwrap();

        assert_eq!(value["error"]["type"], "proxy_error");
        assert_eq!(value["error"]["code"], "internal_error");
        assert_eq!(
            value["error"]["message"],
            "Translation error: request body must be a JSON object"
        );
        assert_eq!(value.as_object().unwrap().len(), 1);
        assert_eq!(value["error"].as_object().unwrap().len(), 3);
    }

    #[test]
    fn test_json_error_becomes_internal_error() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err = ProxyError::from(parse_err);
        let envelope = err.to_envelope();

        assert_eq!(envelope.error.error_type, "proxy_error");
        assert_eq!(envelope.error.code, "internal_error");
        assert!(envelope.error.message.starts_with("JSON error:"));
    }

    #[test]
    fn test_into_response_is_500() {
        let resp = ProxyError::backend("connection refused").into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
