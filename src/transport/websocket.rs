//! WebSocket transport: send the payload once on open, every frame is a chunk.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

use super::timeout::with_timeout_map;
use super::{ChatRequest, ChunkStream, StreamChunk, Transport};
use crate::types::{Result, TransportKind, WikiError};

#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    url: String,
    connect_timeout: Duration,
}

impl WebSocketTransport {
    pub fn new(url: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            connect_timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

fn ws_error(message: impl Into<String>) -> WikiError {
    WikiError::transport(TransportKind::WebSocket, message)
}

#[async_trait]
impl Transport for WebSocketTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::WebSocket
    }

    async fn send(&self, request: &ChatRequest) -> Result<ChunkStream> {
        let payload = serde_json::to_string(request)?;

        let (mut socket, _) = with_timeout_map(
            self.connect_timeout,
            connect_async(self.url.as_str()),
            "WebSocket connection",
        )
        .await?
        .map_err(|e| ws_error(format!("WebSocket connection failed: {}", e)))?;

        debug!("WebSocket connection established: {}", self.url);

        socket
            .send(Message::text(payload))
            .await
            .map_err(|e| ws_error(format!("Failed to send request: {}", e)))?;

        let stream = futures::stream::unfold(Some(socket), |state| async move {
            let mut socket = state?;
            loop {
                match socket.next().await {
                    Some(Ok(Message::Text(text))) => {
                        return Some((Ok(StreamChunk::text(text.as_str())), Some(socket)));
                    }
                    Some(Ok(Message::Binary(data))) => {
                        let text = String::from_utf8_lossy(&data).into_owned();
                        return Some((Ok(StreamChunk::Text(text)), Some(socket)));
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("WebSocket connection closed");
                        return None;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        let err = ws_error(format!("WebSocket error during message reception: {}", e));
                        return Some((Err(err), None));
                    }
                }
            }
        });

        Ok(stream.boxed())
    }
}
