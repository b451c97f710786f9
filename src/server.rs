use crate::config::{Backend, ProxyConfig};
use crate::error::{ProxyError, Result};
use crate::journal::{Outcome, RequestRecord, SharedJournal};
use crate::models;
use crate::proxy;
use crate::relay;
use crate::translate::{translate_request, ChatRequest};

use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

pub const SERVICE_NAME: &str = "nvidia-nim-proxy";

const CHAT_ROUTE: &str = "/v1/chat/completions";
const MODELS_ROUTE: &str = "/v1/models";
const HEALTH_ROUTE: &str = "/health";

#[derive(Clone)]
pub struct AppState {
    pub config: ProxyConfig,
    pub backend: Backend,
    pub client: reqwest::Client,
    pub journal: SharedJournal,
}

impl AppState {
    /// Resolve the credential and build the shared HTTP client. Called once at startup.
    pub fn from_config(config: ProxyConfig, journal: SharedJournal) -> Result<Self> {
        // read_timeout resets on every chunk; a total timeout would cut long streams
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.backend.connect_timeout_secs))
            .read_timeout(Duration::from_secs(config.backend.read_timeout_secs))
            .build()?;
        let backend = config.backend();

        Ok(Self {
            config,
            backend,
            client,
            journal,
        })
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(CHAT_ROUTE, post(handle_chat_completions))
        .route(MODELS_ROUTE, get(handle_models))
        .route(HEALTH_ROUTE, get(handle_health))
        .route("/", get(handle_index))
        .layer(DefaultBodyLimit::max(state.config.max_body_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_chat_completions(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Bytes, BytesRejection>,
) -> Response {
    let request_id = Uuid::new_v4();

    let result = match body {
        Ok(body) => forward_chat(&state, request_id, &body).await,
        // over-limit or unreadable bodies still get the JSON envelope
        Err(rejection) => Err(ProxyError::translation(rejection.body_text())),
    };

    match result {
        Ok(resp) => resp,
        Err(e) => {
            state.journal.append(
                RequestRecord::new(request_id, CHAT_ROUTE, Outcome::ProxyError)
                    .status(StatusCode::INTERNAL_SERVER_ERROR.as_u16())
                    .detail(e.to_string()),
            );
            e.into_response()
        }
    }
}

/// Translate, call the backend, relay. Any error here becomes the 500 envelope.
async fn forward_chat(state: &AppState, request_id: Uuid, body: &[u8]) -> Result<Response> {
    let req = ChatRequest::from_slice(body)?;
    let streaming = req.is_streaming();
    let payload = translate_request(&req);

    tracing::info!(
        %request_id,
        model = req.model_name().as_deref().unwrap_or("<default>"),
        streaming,
        "chat completion"
    );

    let response = proxy::send_chat_completion(&state.client, &state.backend, &payload).await?;
    let status = response.status();
    let record = RequestRecord::new(request_id, CHAT_ROUTE, Outcome::Relayed)
        .model(req.model_name())
        .stream(streaming)
        .status(status.as_u16());

    if streaming {
        return Ok(relay::relay_stream(
            status,
            response.bytes_stream(),
            state.journal.clone(),
            record,
        ));
    }

    let relayed = relay::relay_json(response).await?;
    state.journal.append(record);
    Ok(relayed)
}

async fn handle_models(State(state): State<Arc<AppState>>) -> Response {
    let request_id = Uuid::new_v4();

    match models::fetch_backend_models(&state.client, &state.backend).await {
        Ok((status, body)) => {
            state.journal.append(
                RequestRecord::new(request_id, MODELS_ROUTE, Outcome::Relayed)
                    .status(status.as_u16()),
            );
            (status, Json(body)).into_response()
        }
        Err(e) => {
            tracing::warn!(%request_id, error = %e, "model listing failed, serving fallback list");
            state.journal.append(
                RequestRecord::new(request_id, MODELS_ROUTE, Outcome::Fallback)
                    .status(StatusCode::OK.as_u16())
                    .detail(e.to_string()),
            );
            (StatusCode::OK, Json(models::fallback_models())).into_response()
        }
    }
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": SERVICE_NAME,
    }))
}

async fn handle_index() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "NVIDIA NIM to OpenAI API Proxy",
        "endpoints": {
            "chat": CHAT_ROUTE,
            "models": MODELS_ROUTE,
            "health": HEALTH_ROUTE,
        }
    }))
}
