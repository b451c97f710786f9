use crate::config::Backend;
use crate::error::{ProxyError, Result};
use crate::translate::{backend_headers, BackendPayload};

/// Issue the chat-completions call. Returns as soon as the backend's status line and
/// headers arrive; the body is left unread so a streamed reply can be relayed lazily.
pub async fn send_chat_completion(
    client: &reqwest::Client,
    backend: &Backend,
    payload: &BackendPayload,
) -> Result<reqwest::Response> {
    let url = backend.endpoint("chat/completions");
    let headers = backend_headers(&backend.api_key)?;

    tracing::info!(%url, model = %payload.model, stream = %payload.stream, "POST");

    let response = client
        .post(&url)
        .headers(headers)
        .json(payload)
        .send()
        .await
        .map_err(|e| ProxyError::backend(format!("Request failed: {}", e)))?;

    tracing::debug!(status = response.status().as_u16(), "backend responded");

    Ok(response)
}
