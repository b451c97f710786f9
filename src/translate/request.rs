//! Build the backend payload and headers for a chat-completions call.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::{json, Value};

use super::types::{BackendPayload, ChatRequest};
use crate::error::{ProxyError, Result};

pub const DEFAULT_MODEL: &str = "meta/llama-3.1-405b-instruct";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TOKENS: u64 = 1024;

/// Translate an inbound request into the backend payload.
/// Pure function: defaults fill absent core fields, tuning parameters are copied only if present.
pub fn translate_request(req: &ChatRequest) -> BackendPayload {
    BackendPayload {
        model: req.model.clone().unwrap_or_else(|| json!(DEFAULT_MODEL)),
        messages: req.messages.clone().unwrap_or_else(|| json!([])),
        temperature: req
            .temperature
            .clone()
            .unwrap_or_else(|| json!(DEFAULT_TEMPERATURE)),
        max_tokens: req
            .max_tokens
            .clone()
            .unwrap_or_else(|| json!(DEFAULT_MAX_TOKENS)),
        stream: req.stream.clone().unwrap_or(Value::Bool(false)),
        tuning: req.tuning.clone(),
    }
}

/// Bearer credential plus JSON content type.
pub fn backend_headers(api_key: &str) -> Result<HeaderMap> {
    let bearer = HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(|_| {
        ProxyError::translation("API key contains characters that are not valid in a header")
    })?;

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, bearer);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload_for(doc: Value) -> Value {
        let req = ChatRequest::from_value(doc).unwrap();
        serde_json::to_value(translate_request(&req)).unwrap()
    }

    #[test]
    fn test_defaults() {
        let payload = payload_for(json!({}));
        assert_eq!(
            payload,
            json!({
                "model": "meta/llama-3.1-405b-instruct",
                "messages": [],
                "temperature": 0.7,
                "max_tokens": 1024,
                "stream": false,
            })
        );
    }

    #[test]
    fn test_unset_optionals_do_not_leak() {
        let payload = payload_for(json!({
            "messages": [{"role": "user", "content": "hi"}],
            "model": "meta/llama-3.1-8b-instruct",
        }));
        let keys: Vec<&str> = payload.as_object().unwrap().keys().map(String::as_str).collect();
        for name in ["top_p", "frequency_penalty", "presence_penalty"] {
            assert!(!keys.contains(&name), "{name} leaked into payload");
        }
        assert_eq!(payload.as_object().unwrap().len(), 5);
    }

    #[test]
    fn test_falsy_optionals_are_copied() {
        let payload = payload_for(json!({
            "top_p": 0,
            "frequency_penalty": "",
            "presence_penalty": null,
        }));
        assert_eq!(payload["top_p"], json!(0));
        assert_eq!(payload["frequency_penalty"], json!(""));
        assert!(payload.as_object().unwrap().contains_key("presence_penalty"));
        assert_eq!(payload["presence_penalty"], Value::Null);
    }

    #[test]
    fn test_values_pass_through_untouched() {
        let messages = json!([
            {"role": "system", "content": "be brief"},
            {"role": "user", "content": "hello"},
        ]);
        let payload = payload_for(json!({
            "messages": messages,
            "model": "custom/model",
            "temperature": 7.5,
            "max_tokens": "lots",
            "stream": true,
            "top_p": 0.9,
            "stop": ["\n"],
        }));

        assert_eq!(payload["messages"], messages);
        assert_eq!(payload["model"], "custom/model");
        assert_eq!(payload["temperature"], json!(7.5));
        assert_eq!(payload["max_tokens"], "lots");
        assert_eq!(payload["stream"], true);
        assert_eq!(payload["top_p"], json!(0.9));
        assert!(payload.get("stop").is_none());
    }

    #[test]
    fn test_large_integers_survive_translation() {
        let req = ChatRequest::from_slice(br#"{"max_tokens": 100000000000000000000, "top_p": 1}"#)
            .unwrap();
        let body = serde_json::to_string(&translate_request(&req)).unwrap();
        assert!(body.contains(r#""max_tokens":100000000000000000000"#));
        assert!(body.contains(r#""top_p":1"#));
    }

    #[test]
    fn test_headers() {
        let headers = backend_headers("nvapi-abc").unwrap();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer nvapi-abc");
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/json");
    }

    #[test]
    fn test_empty_key_still_sends_bearer() {
        let headers = backend_headers("").unwrap();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer ");
    }

    #[test]
    fn test_invalid_key_is_translation_error() {
        let err = backend_headers("bad\nkey").unwrap_err();
        assert!(matches!(err, ProxyError::Translation { .. }));
    }
}
