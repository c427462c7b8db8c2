//! Streaming Transport
//!
//! One request/response exchange with the generation backend, delivered as a
//! lazy sequence of text chunks over either a WebSocket session or a chunked
//! HTTP body.
//!
//! ## Transport Selection
//!
//! - **WebSocket first**: when a realtime endpoint is configured, the payload
//!   is sent once on open and every inbound frame is a chunk
//! - **HTTP fallback**: if the socket does not open within the connect
//!   timeout, or breaks before a clean close, the same request is POSTed to
//!   the streaming endpoint. Text the socket already delivered is retracted
//!   with [`StreamChunk::Restart`]
//!
//! Callers obtain a [`SharedTransport`] from [`TransportFactory`] and never
//! branch on the transport kind. Exactly one transport's output survives
//! each call.

mod decoder;
mod fallback;
mod http;
pub mod timeout;
mod websocket;

pub use decoder::Utf8StreamDecoder;
pub use fallback::FallbackTransport;
pub use http::HttpTransport;
pub use timeout::{TimeoutConfig, with_timeout_map};
pub use websocket::WebSocketTransport;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::config::{BackendConfig, GenerationConfig};
use crate::types::{Language, RepositorySpec, Result, TransportKind, WikiError};

/// One item of a chat stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamChunk {
    Text(String),
    /// Everything received so far came from an abandoned attempt
    Restart,
}

impl StreamChunk {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }
}

/// Finite, non-restartable sequence of stream chunks
pub type ChunkStream = BoxStream<'static, Result<StreamChunk>>;

// =============================================================================
// Request Payload
// =============================================================================

/// A single chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Generation request as the backend expects it on both transports
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub repo_url: String,
    #[serde(rename = "type")]
    pub repo_type: String,
    pub messages: Vec<ChatMessage>,
    #[serde(rename = "filePath", default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excluded_dirs: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excluded_files: Option<String>,
}

impl fmt::Debug for ChatRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatRequest")
            .field("repo_url", &self.repo_url)
            .field("repo_type", &self.repo_type)
            .field("messages", &self.messages.len())
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("language", &self.language)
            .finish()
    }
}

impl ChatRequest {
    /// Single-prompt request for a repository
    pub fn new(repo: &RepositorySpec, prompt: impl Into<String>) -> Self {
        Self::with_messages(repo, vec![ChatMessage::user(prompt)])
    }

    pub fn with_messages(repo: &RepositorySpec, messages: Vec<ChatMessage>) -> Self {
        Self {
            repo_url: repo.repo_url(),
            repo_type: repo.host_type.to_string(),
            messages,
            file_path: None,
            token: repo.token_str().map(str::to_string),
            provider: None,
            model: None,
            custom_model: None,
            language: None,
            excluded_dirs: None,
            excluded_files: None,
        }
    }

    /// Attach model selection, language and file filters
    pub fn with_generation(mut self, generation: &GenerationConfig, language: &Language) -> Self {
        self.provider = generation.provider.clone();
        self.model = generation.model.clone();
        if generation.model.as_deref() == Some("custom") {
            self.custom_model = generation.custom_model.clone();
        }
        self.language = Some(language.code().to_string());
        if !generation.excluded_dirs.is_empty() {
            self.excluded_dirs = Some(generation.excluded_dirs.join("\n"));
        }
        if !generation.excluded_files.is_empty() {
            self.excluded_files = Some(generation.excluded_files.join("\n"));
        }
        self
    }

    /// Prompt of the last message, for logging
    pub fn prompt_len(&self) -> usize {
        self.messages.last().map(|m| m.content.len()).unwrap_or(0)
    }
}

// =============================================================================
// Transport Trait
// =============================================================================

#[async_trait]
pub trait Transport: Send + Sync {
    /// Preferred delivery mechanism
    fn kind(&self) -> TransportKind;

    /// Start one exchange. The returned stream ends on close/EOF and yields
    /// an error item if the exchange breaks mid-stream.
    async fn send(&self, request: &ChatRequest) -> Result<ChunkStream>;
}

pub type SharedTransport = Arc<dyn Transport>;

/// Endpoints for one category of calls
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    pub http_url: String,
    pub ws_url: Option<String>,
    pub connect_timeout: Duration,
}

impl EndpointConfig {
    pub fn from_backend(backend: &BackendConfig, connect_timeout: Duration) -> Self {
        Self {
            http_url: backend.http_chat_url(),
            ws_url: backend.ws_enabled.then(|| backend.ws_chat_url()),
            connect_timeout,
        }
    }
}

/// Builds the transport for an endpoint configuration
pub struct TransportFactory;

impl TransportFactory {
    pub fn build(endpoint: &EndpointConfig, client: reqwest::Client) -> SharedTransport {
        let http = HttpTransport::new(client, endpoint.http_url.clone());
        match &endpoint.ws_url {
            Some(ws_url) => Arc::new(FallbackTransport::new(
                WebSocketTransport::new(ws_url.clone(), endpoint.connect_timeout),
                http,
            )),
            None => Arc::new(http),
        }
    }

    /// Streaming client: no whole-request timeout, bounded connect
    pub fn streaming_client(connect_timeout: Duration) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| WikiError::transport(TransportKind::Http, format!("Failed to create HTTP client: {}", e)))
    }
}

// =============================================================================
// Collection
// =============================================================================

/// Accumulated stream output
#[derive(Debug)]
pub struct StreamOutput {
    /// Everything received before the stream ended
    pub text: String,
    /// Set when the stream broke instead of closing cleanly
    pub error: Option<WikiError>,
}

impl StreamOutput {
    /// Fail if the stream broke, discarding partial text
    pub fn into_result(self) -> Result<String> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.text),
        }
    }
}

/// Drain a chunk stream, reporting each chunk as it arrives
pub async fn collect_stream<F>(stream: ChunkStream, on_chunk: F) -> StreamOutput
where
    F: FnMut(&str),
{
    collect_stream_with_restart(stream, on_chunk, || {}).await
}

/// Like [`collect_stream`], with `on_restart` called whenever the text
/// received so far is discarded
pub async fn collect_stream_with_restart<F, R>(
    mut stream: ChunkStream,
    mut on_chunk: F,
    mut on_restart: R,
) -> StreamOutput
where
    F: FnMut(&str),
    R: FnMut(),
{
    let mut text = String::new();
    while let Some(item) = stream.next().await {
        match item {
            Ok(StreamChunk::Text(chunk)) => {
                on_chunk(&chunk);
                text.push_str(&chunk);
            }
            Ok(StreamChunk::Restart) => {
                text.clear();
                on_restart();
            }
            Err(err) => return StreamOutput { text, error: Some(err) },
        }
    }
    StreamOutput { text, error: None }
}

/// Send a request and collect the full response text
pub async fn fetch_text(transport: &dyn Transport, request: &ChatRequest) -> Result<String> {
    let stream = transport.send(request).await?;
    collect_stream(stream, |_| {}).await.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HostType;

    #[test]
    fn test_chat_request_wire_format() {
        let repo = RepositorySpec::new("octo", "hello", HostType::Github)
            .with_token(Some("tok".to_string()));
        let generation = GenerationConfig {
            provider: Some("openai".to_string()),
            model: Some("custom".to_string()),
            custom_model: Some("my-model".to_string()),
            excluded_dirs: vec!["node_modules".to_string(), "dist".to_string()],
            ..Default::default()
        };
        let request = ChatRequest::new(&repo, "hi").with_generation(&generation, &Language::default());
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["repo_url"], "https://github.com/octo/hello");
        assert_eq!(json["type"], "github");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["token"], "tok");
        assert_eq!(json["custom_model"], "my-model");
        assert_eq!(json["language"], "en");
        assert_eq!(json["excluded_dirs"], "node_modules\ndist");
        assert!(json.get("excluded_files").is_none());
        assert!(json.get("filePath").is_none());
    }

    #[test]
    fn test_custom_model_only_when_selected() {
        let repo = RepositorySpec::new("o", "r", HostType::Github);
        let generation = GenerationConfig {
            model: Some("gpt-4o".to_string()),
            custom_model: Some("ignored".to_string()),
            ..Default::default()
        };
        let request = ChatRequest::new(&repo, "x").with_generation(&generation, &Language::default());
        assert!(request.custom_model.is_none());
    }

    #[test]
    fn test_debug_redacts_token() {
        let repo = RepositorySpec::new("o", "r", HostType::Github).with_token(Some("secret".into()));
        let debug = format!("{:?}", ChatRequest::new(&repo, "x"));
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn test_endpoint_without_websocket() {
        let backend = BackendConfig {
            ws_enabled: false,
            ..Default::default()
        };
        let endpoint = EndpointConfig::from_backend(&backend, Duration::from_secs(5));
        assert!(endpoint.ws_url.is_none());
        let transport = TransportFactory::build(&endpoint, reqwest::Client::new());
        assert_eq!(transport.kind(), TransportKind::Http);
    }

    #[tokio::test]
    async fn test_collect_stream_keeps_partial_text() {
        let items: Vec<Result<StreamChunk>> = vec![
            Ok(StreamChunk::text("# Title")),
            Ok(StreamChunk::text("\nbody")),
            Err(WikiError::transport(TransportKind::Http, "reset")),
        ];
        let stream: ChunkStream = futures::stream::iter(items).boxed();
        let mut seen = 0;
        let output = collect_stream(stream, |_| seen += 1).await;
        assert_eq!(seen, 2);
        assert_eq!(output.text, "# Title\nbody");
        assert!(output.error.is_some());
        assert!(output.into_result().is_err());
    }

    #[tokio::test]
    async fn test_collect_stream_discards_text_on_restart() {
        let items: Vec<Result<StreamChunk>> = vec![
            Ok(StreamChunk::text("stale ")),
            Ok(StreamChunk::Restart),
            Ok(StreamChunk::text("fresh")),
        ];
        let stream: ChunkStream = futures::stream::iter(items).boxed();
        let mut restarts = 0;
        let output = collect_stream_with_restart(stream, |_| {}, || restarts += 1).await;
        assert_eq!(restarts, 1);
        assert_eq!(output.into_result().unwrap(), "fresh");
    }
}
