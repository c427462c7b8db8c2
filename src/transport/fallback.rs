//! WebSocket-first transport with HTTP fallback.

use async_trait::async_trait;
use futures::StreamExt;
use tracing::warn;

use super::{ChatRequest, ChunkStream, HttpTransport, StreamChunk, Transport, WebSocketTransport};
use crate::types::{Result, TransportKind, WikiError};

/// Tries the socket first. A socket that fails to open or breaks before a
/// clean close hands the call to HTTP; text it already delivered is retracted
/// with [`StreamChunk::Restart`] ahead of the HTTP output.
#[derive(Debug, Clone)]
pub struct FallbackTransport {
    primary: WebSocketTransport,
    fallback: HttpTransport,
}

enum Leg {
    Socket(ChunkStream, HttpTransport, ChatRequest),
    Http(ChunkStream),
    Done,
}

impl FallbackTransport {
    pub fn new(primary: WebSocketTransport, fallback: HttpTransport) -> Self {
        Self { primary, fallback }
    }
}

fn log_fallback(http: &HttpTransport, err: &WikiError) {
    warn!(
        "WebSocket unavailable, falling back to HTTP ({}): {}",
        http.url(),
        err
    );
}

#[async_trait]
impl Transport for FallbackTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::WebSocket
    }

    async fn send(&self, request: &ChatRequest) -> Result<ChunkStream> {
        let err = match self.primary.send(request).await {
            Ok(mut stream) => match stream.next().await {
                Some(Ok(first)) => {
                    let head = futures::stream::once(async move { Ok(first) });
                    let socket = head.chain(stream).boxed();
                    let leg = Leg::Socket(socket, self.fallback.clone(), request.clone());
                    return Ok(futures::stream::unfold(leg, next_item).boxed());
                }
                None => return Ok(futures::stream::empty().boxed()),
                Some(Err(err)) => err,
            },
            Err(err) => err,
        };

        log_fallback(&self.fallback, &err);
        self.fallback.send(request).await
    }
}

async fn next_item(leg: Leg) -> Option<(Result<StreamChunk>, Leg)> {
    match leg {
        Leg::Socket(mut socket, http, request) => match socket.next().await {
            Some(Err(err)) => {
                log_fallback(&http, &err);
                match http.send(&request).await {
                    Ok(stream) => Some((Ok(StreamChunk::Restart), Leg::Http(stream))),
                    Err(err) => Some((Err(err), Leg::Done)),
                }
            }
            Some(item) => Some((item, Leg::Socket(socket, http, request))),
            None => None,
        },
        Leg::Http(mut stream) => {
            let item = stream.next().await?;
            Some((item, Leg::Http(stream)))
        }
        Leg::Done => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{self, ChatBackend};
    use crate::transport::{ChatMessage, collect_stream, collect_stream_with_restart};
    use std::time::Duration;

    fn request() -> ChatRequest {
        ChatRequest {
            repo_url: "https://github.com/o/r".into(),
            repo_type: "github".into(),
            messages: vec![ChatMessage::user("page")],
            file_path: None,
            token: None,
            provider: None,
            model: None,
            custom_model: None,
            language: None,
            excluded_dirs: None,
            excluded_files: None,
        }
    }

    #[tokio::test]
    async fn test_uses_websocket_when_available() {
        let backend = ChatBackend::replying(vec!["a", "b", "c"]);
        let addr = test_support::spawn(backend.router()).await;
        let transport = FallbackTransport::new(
            WebSocketTransport::new(format!("ws://{}/ws/chat", addr), Duration::from_secs(5)),
            HttpTransport::new(reqwest::Client::new(), format!("http://{}/chat/completions/stream", addr)),
        );

        let text = collect_stream(transport.send(&request()).await.unwrap(), |_| {})
            .await
            .into_result()
            .unwrap();
        assert_eq!(text, "abc");
        assert_eq!(backend.ws_calls(), 1);
        assert_eq!(backend.http_calls(), 0);
    }

    #[tokio::test]
    async fn test_open_timeout_falls_back_exactly_once() {
        let silent = test_support::spawn_silent().await;
        let backend = ChatBackend::replying(vec!["```markdown\n# Page\n", "body\n```"]);
        let http = test_support::spawn(backend.http_router()).await;
        let transport = FallbackTransport::new(
            WebSocketTransport::new(format!("ws://{}/ws/chat", silent), Duration::from_millis(200)),
            HttpTransport::new(reqwest::Client::new(), format!("http://{}/chat/completions/stream", http)),
        );

        let text = collect_stream(transport.send(&request()).await.unwrap(), |_| {})
            .await
            .into_result()
            .unwrap();
        assert_eq!(text, "```markdown\n# Page\nbody\n```");
        assert_eq!(backend.http_calls(), 1);
    }

    #[tokio::test]
    async fn test_socket_error_before_output_falls_back() {
        let backend = ChatBackend::replying(vec!["via http"]).dropping_websocket();
        let addr = test_support::spawn(backend.router()).await;
        let transport = FallbackTransport::new(
            WebSocketTransport::new(format!("ws://{}/ws/chat", addr), Duration::from_secs(5)),
            HttpTransport::new(reqwest::Client::new(), format!("http://{}/chat/completions/stream", addr)),
        );

        let text = collect_stream(transport.send(&request()).await.unwrap(), |_| {})
            .await
            .into_result()
            .unwrap();
        assert_eq!(text, "via http");
        assert_eq!(backend.ws_calls(), 1);
        assert_eq!(backend.http_calls(), 1);
    }

    #[tokio::test]
    async fn test_socket_error_after_output_restarts_over_http() {
        let backend =
            ChatBackend::replying(vec!["via http"]).dropping_websocket_after(vec!["partial "]);
        let addr = test_support::spawn(backend.router()).await;
        let transport = FallbackTransport::new(
            WebSocketTransport::new(format!("ws://{}/ws/chat", addr), Duration::from_secs(5)),
            HttpTransport::new(reqwest::Client::new(), format!("http://{}/chat/completions/stream", addr)),
        );

        let mut seen = Vec::new();
        let mut restarts = 0;
        let output = collect_stream_with_restart(
            transport.send(&request()).await.unwrap(),
            |chunk| seen.push(chunk.to_string()),
            || restarts += 1,
        )
        .await;
        assert!(output.error.is_none());
        assert_eq!(output.text, "via http");
        assert_eq!(seen, vec!["partial ", "via http"]);
        assert_eq!(restarts, 1);
        assert_eq!(backend.ws_calls(), 1);
        assert_eq!(backend.http_calls(), 1);
    }

    #[tokio::test]
    async fn test_both_transports_failing_is_single_error() {
        let transport = FallbackTransport::new(
            WebSocketTransport::new("ws://127.0.0.1:1/ws/chat", Duration::from_secs(1)),
            HttpTransport::new(reqwest::Client::new(), "http://127.0.0.1:1/chat/completions/stream"),
        );
        let err = match transport.send(&request()).await {
            Err(e) => e,
            Ok(_) => panic!("expected error"),
        };
        assert!(matches!(
            err,
            WikiError::Transport {
                kind: TransportKind::Http,
                ..
            }
        ));
    }
}
