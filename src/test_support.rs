//! In-process fakes for the backend and repository hosts.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Json;
use bytes::Bytes;
use futures::StreamExt;
use tokio::net::TcpListener;

use crate::transport::{ChatRequest, ChunkStream, StreamChunk, Transport};
use crate::types::{Result, TransportKind, WikiError};

/// Serve a router on an ephemeral localhost port
pub async fn spawn(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    addr
}

/// Accept TCP connections and never answer (a socket that never opens)
pub async fn spawn_silent() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}

// =============================================================================
// Fake generation backend
// =============================================================================

/// What the fake backend answers for one request
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub chunks: Vec<String>,
    pub delay: Duration,
}

impl Reply {
    pub fn chunks(chunks: Vec<&str>) -> Self {
        Self {
            status: 200,
            chunks: chunks.into_iter().map(str::to_string).collect(),
            delay: Duration::ZERO,
        }
    }

    pub fn text(text: &str) -> Self {
        Self::chunks(vec![text])
    }
}

type Responder = Box<dyn Fn(&ChatRequest) -> Reply + Send + Sync>;

struct BackendInner {
    responder: Responder,
    /// Frames sent before a WebSocket session drops without a close frame
    websocket_drop: Option<Vec<String>>,
    http_calls: AtomicUsize,
    ws_calls: AtomicUsize,
    requests: Mutex<Vec<ChatRequest>>,
}

/// Streaming chat backend serving `/chat/completions/stream` and `/ws/chat`
#[derive(Clone)]
pub struct ChatBackend {
    inner: Arc<BackendInner>,
}

impl ChatBackend {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&ChatRequest) -> Reply + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(BackendInner {
                responder: Box::new(responder),
                websocket_drop: None,
                http_calls: AtomicUsize::new(0),
                ws_calls: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn replying(chunks: Vec<&str>) -> Self {
        let reply = Reply::chunks(chunks);
        Self::new(move |_| reply.clone())
    }

    pub fn failing(status: u16, body: &str) -> Self {
        let body = body.to_string();
        Self::new(move |_| Reply {
            status,
            chunks: vec![body.clone()],
            delay: Duration::ZERO,
        })
    }

    /// WebSocket sessions read the request, then drop without a close frame
    pub fn dropping_websocket(self) -> Self {
        self.dropping_websocket_after(vec![])
    }

    /// WebSocket sessions send `frames`, then drop without a close frame
    pub fn dropping_websocket_after(self, frames: Vec<&str>) -> Self {
        let inner = Arc::try_unwrap(self.inner).ok().unwrap();
        Self {
            inner: Arc::new(BackendInner {
                websocket_drop: Some(frames.into_iter().map(str::to_string).collect()),
                ..inner
            }),
        }
    }

    pub fn http_router(&self) -> Router {
        Router::new()
            .route("/chat/completions/stream", post(http_chat))
            .with_state(self.clone())
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/chat/completions/stream", post(http_chat))
            .route("/ws/chat", get(ws_chat))
            .with_state(self.clone())
    }

    pub fn http_calls(&self) -> usize {
        self.inner.http_calls.load(Ordering::SeqCst)
    }

    pub fn ws_calls(&self) -> usize {
        self.inner.ws_calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<ChatRequest> {
        self.inner.requests.lock().unwrap().last().cloned()
    }

    fn record(&self, request: ChatRequest) -> Reply {
        let reply = (self.inner.responder)(&request);
        self.inner.requests.lock().unwrap().push(request);
        reply
    }
}

async fn http_chat(State(backend): State<ChatBackend>, Json(request): Json<ChatRequest>) -> Response {
    backend.inner.http_calls.fetch_add(1, Ordering::SeqCst);
    let reply = backend.record(request);
    if reply.status != 200 {
        let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (status, reply.chunks.concat()).into_response();
    }

    let delay = reply.delay;
    let stream = futures::stream::iter(reply.chunks).then(move |chunk| async move {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok::<_, std::io::Error>(Bytes::from(chunk))
    });
    Body::from_stream(stream).into_response()
}

async fn ws_chat(State(backend): State<ChatBackend>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| ws_session(backend, socket))
}

async fn ws_session(backend: ChatBackend, mut socket: WebSocket) {
    let Some(Ok(Message::Text(text))) = socket.recv().await else {
        return;
    };
    let Ok(request) = serde_json::from_str::<ChatRequest>(text.as_str()) else {
        return;
    };
    backend.inner.ws_calls.fetch_add(1, Ordering::SeqCst);
    let reply = backend.record(request);
    if let Some(frames) = &backend.inner.websocket_drop {
        for frame in frames {
            if socket.send(Message::Text(frame.clone().into())).await.is_err() {
                return;
            }
        }
        return;
    }
    for chunk in reply.chunks {
        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }
        if socket.send(Message::Text(chunk.into())).await.is_err() {
            return;
        }
    }
    let _ = socket.send(Message::Close(None)).await;
}

// =============================================================================
// Scripted in-memory transport
// =============================================================================

/// Transport answering from a closure, counting calls and peak concurrency
pub struct ScriptedTransport {
    responder: Responder,
    calls: AtomicUsize,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedTransport {
    pub fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn(&ChatRequest) -> Reply + Send + Sync + 'static,
    {
        Arc::new(Self {
            responder: Box::new(responder),
            calls: AtomicUsize::new(0),
            active: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

struct ActiveGuard(Arc<AtomicUsize>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Http
    }

    async fn send(&self, request: &ChatRequest) -> Result<ChunkStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        let reply = (self.responder)(request);
        if reply.status != 200 {
            return Err(WikiError::http_status(
                reply.status,
                format!("{} - {}", reply.status, reply.chunks.concat()),
            ));
        }

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let guard = Arc::new(ActiveGuard(Arc::clone(&self.active)));
        let delay = reply.delay;
        let stream = futures::stream::iter(reply.chunks).then(move |chunk| {
            let _guard = Arc::clone(&guard);
            async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(StreamChunk::Text(chunk))
            }
        });
        Ok(stream.boxed())
    }
}
