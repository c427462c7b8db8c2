//! HTTP streaming transport: POST the request, decode the chunked body.

use async_trait::async_trait;
use futures::StreamExt;
use tracing::debug;

use super::{ChatRequest, ChunkStream, StreamChunk, Transport, Utf8StreamDecoder};
use crate::types::{Result, TransportKind, WikiError};

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Http
    }

    async fn send(&self, request: &ChatRequest) -> Result<ChunkStream> {
        debug!(
            "POST {} (prompt {} chars)",
            self.url,
            request.prompt_len()
        );

        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                WikiError::transport(TransportKind::Http, format!("Request to {} failed: {}", self.url, e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let reason = status.canonical_reason().unwrap_or("");
            let body = response.text().await.unwrap_or_default();
            let message = if body.trim().is_empty() {
                format!("{} - {}", status.as_u16(), reason)
            } else {
                format!("{} - {}: {}", status.as_u16(), reason, body.trim())
            };
            return Err(WikiError::http_status(status.as_u16(), message));
        }

        let body = Box::pin(response.bytes_stream());
        let stream = futures::stream::unfold(
            Some((body, Utf8StreamDecoder::new())),
            |state| async move {
                let (mut body, mut decoder) = state?;
                loop {
                    match body.next().await {
                        Some(Ok(bytes)) => {
                            let text = decoder.decode(&bytes);
                            if !text.is_empty() {
                                return Some((Ok(StreamChunk::Text(text)), Some((body, decoder))));
                            }
                        }
                        Some(Err(e)) => {
                            let err = WikiError::transport(
                                TransportKind::Http,
                                format!("Error processing response stream: {}", e),
                            );
                            return Some((Err(err), None));
                        }
                        None => {
                            let rest = decoder.finish();
                            return (!rest.is_empty()).then_some((Ok(StreamChunk::Text(rest)), None));
                        }
                    }
                }
            },
        );

        Ok(stream.boxed())
    }
}
