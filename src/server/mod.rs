//! Proxy Server
//!
//! Re-exposes the backend's routes under the paths a browser UI expects.
//! Status codes and bodies are relayed unchanged; the chat stream is piped
//! through chunk by chunk.
//!
//! | Route                            | Backend                        |
//! |----------------------------------|--------------------------------|
//! | `POST /api/chat/stream`          | `POST /chat/completions/stream`|
//! | `GET /api/models/config`         | `GET /models/config`           |
//! | `GET /api/wiki/projects`         | `GET /api/processed_projects`  |
//! | `GET/POST/DELETE /api/wiki_cache`| same path                      |
//! | `POST /export/wiki`              | same path                      |
//! | `GET /local_repo/structure`      | same path                      |
//! | `GET /api/auth/status`           | `GET /auth/status`             |
//! | `POST /api/auth/validate`        | `POST /auth/validate`          |
//!
//! A backend that cannot be reached answers 503 with a JSON error.

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::{RawQuery, State};
use axum::http::{HeaderMap, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Json;
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::constants::backend::{
    AUTH_STATUS_PATH, AUTH_VALIDATE_PATH, EXPORT_PATH, HTTP_CHAT_PATH, LOCAL_STRUCTURE_PATH,
    MODELS_CONFIG_PATH, PROCESSED_PROJECTS_PATH, WIKI_CACHE_PATH,
};
use crate::constants::network::USER_AGENT;
use crate::types::{Result, WikiError};

#[derive(Debug, Clone)]
pub struct ProxyState {
    client: reqwest::Client,
    backend: Arc<str>,
}

impl ProxyState {
    pub fn new(client: reqwest::Client, backend: &str) -> Self {
        Self {
            client,
            backend: Arc::from(backend.trim_end_matches('/')),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.backend.connect_timeout())
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| WikiError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self::new(client, config.backend.base()))
    }
}

pub fn router(state: ProxyState) -> Router {
    Router::new()
        .route("/api/chat/stream", post(chat_stream))
        .route("/api/models/config", get(models_config))
        .route("/api/wiki/projects", get(projects))
        .route(
            "/api/wiki_cache",
            get(wiki_cache).post(wiki_cache).delete(wiki_cache),
        )
        .route(EXPORT_PATH, post(export))
        .route(LOCAL_STRUCTURE_PATH, get(local_structure))
        .route("/api/auth/status", get(auth_status))
        .route("/api/auth/validate", post(auth_validate))
        .with_state(state)
}

/// Bind the configured address and serve until Ctrl-C
pub async fn serve(config: &Config) -> Result<()> {
    let state = ProxyState::from_config(config)?;
    let listener = TcpListener::bind(&config.server.bind).await?;
    let addr = listener.local_addr()?;
    info!("Proxy listening on http://{} (backend {})", addr, state.backend);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down proxy");
        })
        .await?;
    Ok(())
}

// =============================================================================
// Forwarding
// =============================================================================

struct Forward<'a> {
    method: Method,
    path: &'a str,
    query: Option<String>,
    body: Option<Bytes>,
}

impl<'a> Forward<'a> {
    fn new(method: Method, path: &'a str) -> Self {
        Self {
            method,
            path,
            query: None,
            body: None,
        }
    }

    fn query(mut self, query: Option<String>) -> Self {
        self.query = query;
        self
    }

    fn json_body(mut self, body: Bytes) -> Self {
        self.body = Some(body);
        self
    }

    async fn send(self, state: &ProxyState) -> std::result::Result<reqwest::Response, Response> {
        let mut url = format!("{}{}", state.backend, self.path);
        if let Some(query) = self.query.filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(&query);
        }
        debug!("{} {}", self.method, url);

        let mut request = state.client.request(self.method, &url);
        if let Some(body) = self.body {
            request = request
                .header(header::CONTENT_TYPE, "application/json")
                .body(body);
        }
        request.send().await.map_err(|e| {
            warn!("Backend unreachable ({}): {}", url, e);
            unavailable(&e)
        })
    }
}

fn unavailable(err: &reqwest::Error) -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "error": format!("Failed to connect to the Python backend. {}", err) })),
    )
        .into_response()
}

fn json_error(status: StatusCode, message: String) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// Status, content headers and a streamed body, as the backend sent them
fn relay(response: reqwest::Response) -> Response {
    let status = response.status();
    let mut headers = HeaderMap::new();
    for name in [header::CONTENT_TYPE, header::CONTENT_DISPOSITION] {
        if let Some(value) = response.headers().get(&name) {
            headers.insert(name, value.clone());
        }
    }
    let body = Body::from_stream(response.bytes_stream());
    (status, headers, body).into_response()
}

/// Relay success, or a JSON error naming the backend status
fn relay_or(response: reqwest::Response, error: impl FnOnce(StatusCode) -> String) -> Response {
    let status = response.status();
    if status.is_success() {
        relay(response)
    } else {
        json_error(status, error(status))
    }
}

// =============================================================================
// Handlers
// =============================================================================

async fn chat_stream(State(state): State<ProxyState>, body: Bytes) -> Response {
    match Forward::new(Method::POST, HTTP_CHAT_PATH)
        .json_body(body)
        .send(&state)
        .await
    {
        Ok(response) => relay(response),
        Err(response) => response,
    }
}

async fn models_config(State(state): State<ProxyState>) -> Response {
    match Forward::new(Method::GET, MODELS_CONFIG_PATH).send(&state).await {
        Ok(response) => relay_or(response, |status| {
            format!("Backend service responded with status: {}", status.as_u16())
        }),
        Err(response) => response,
    }
}

async fn projects(State(state): State<ProxyState>) -> Response {
    match Forward::new(Method::GET, PROCESSED_PROJECTS_PATH).send(&state).await {
        Ok(response) => relay(response),
        Err(response) => response,
    }
}

async fn wiki_cache(
    State(state): State<ProxyState>,
    method: Method,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Response {
    let mut forward = Forward::new(method.clone(), WIKI_CACHE_PATH).query(query);
    if method == Method::POST {
        forward = forward.json_body(body);
    }
    match forward.send(&state).await {
        Ok(response) => relay(response),
        Err(response) => response,
    }
}

async fn export(State(state): State<ProxyState>, body: Bytes) -> Response {
    match Forward::new(Method::POST, EXPORT_PATH)
        .json_body(body)
        .send(&state)
        .await
    {
        Ok(response) => relay(response),
        Err(response) => response,
    }
}

async fn local_structure(State(state): State<ProxyState>, RawQuery(query): RawQuery) -> Response {
    match Forward::new(Method::GET, LOCAL_STRUCTURE_PATH)
        .query(query)
        .send(&state)
        .await
    {
        Ok(response) => relay(response),
        Err(response) => response,
    }
}

async fn auth_status(State(state): State<ProxyState>) -> Response {
    match Forward::new(Method::GET, AUTH_STATUS_PATH).send(&state).await {
        Ok(response) => relay(response),
        Err(response) => response,
    }
}

async fn auth_validate(State(state): State<ProxyState>, body: Bytes) -> Response {
    match Forward::new(Method::POST, AUTH_VALIDATE_PATH)
        .json_body(body)
        .send(&state)
        .await
    {
        Ok(response) => relay_or(response, |status| {
            format!("Backend server returned {}", status.as_u16())
        }),
        Err(response) => response,
    }
}
