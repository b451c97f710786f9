//! Model listing.
//!
//! The backend's `/models` reply is relayed as-is. When the backend cannot be reached
//! or answers with something that is not JSON, a fixed list of Llama 3.1 models is
//! served instead.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Backend;
use crate::error::{ProxyError, Result};
use crate::translate::backend_headers;

pub const FALLBACK_MODELS: [&str; 3] = [
    "meta/llama-3.1-405b-instruct",
    "meta/llama-3.1-70b-instruct",
    "meta/llama-3.1-8b-instruct",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub id: String,
    pub object: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelList {
    pub object: String,
    pub data: Vec<ModelEntry>,
}

#[must_use]
pub fn fallback_models() -> ModelList {
    ModelList {
        object: "list".to_string(),
        data: FALLBACK_MODELS
            .iter()
            .map(|id| ModelEntry {
                id: (*id).to_string(),
                object: "model".to_string(),
            })
            .collect(),
    }
}

/// Fetch the backend's model list.
///
/// # Errors
/// Returns `ProxyError::Backend` if the request fails or the body is not JSON. A non-2xx
/// status with a JSON body is not an error; it is returned for the caller to relay.
pub async fn fetch_backend_models(
    client: &reqwest::Client,
    backend: &Backend,
) -> Result<(StatusCode, Value)> {
    let url = backend.endpoint("models");
    let headers = backend_headers(&backend.api_key)?;

    tracing::info!(%url, "GET");

    let response = client
        .get(&url)
        .headers(headers)
        .send()
        .await
        .map_err(|e| ProxyError::backend(format!("Failed to fetch models: {e}")))?;

    let status = response.status();
    let body: Value = response
        .json()
        .await
        .map_err(|e| ProxyError::backend(format!("Failed to parse models response: {e}")))?;

    Ok((status, body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fallback_shape() {
        let value = serde_json::to_value(fallback_models()).unwrap();
        assert_eq!(
            value,
            json!({
                "object": "list",
                "data": [
                    {"id": "meta/llama-3.1-405b-instruct", "object": "model"},
                    {"id": "meta/llama-3.1-70b-instruct", "object": "model"},
                    {"id": "meta/llama-3.1-8b-instruct", "object": "model"},
                ]
            })
        );
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_an_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = reqwest::Client::new();
        let backend = Backend::new(format!("http://{addr}/v1"), "k");
        let err = fetch_backend_models(&client, &backend).await.unwrap_err();
        assert!(matches!(err, ProxyError::Backend { .. }));
    }
}
