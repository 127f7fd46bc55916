//! Ollama generation adapter.
//!
//! `POST {base}/api/generate` with `{model, prompt, stream: true}`. The body
//! is line-delimited JSON: `{"response": "...", "done": false}` records, a
//! final `{"done": true}`, or `{"error": "..."}` on backend failure.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::debug;

use super::line_decoder::LineDecoder;
use crate::domain::RelayError;
use crate::ports::{GenerationBackend, GenerationChunk, GenerationRequest, TokenSource};

/// Streaming generation client for a local Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaGenerationBackend {
    client: reqwest::Client,
    url: String,
}

impl OllamaGenerationBackend {
    /// Build a backend for `base_url`.
    ///
    /// Only the connection phase is bounded here; the relay bounds the
    /// first token and streams may run as long as the model generates.
    ///
    /// # Errors
    ///
    /// `UpstreamUnavailable` if the HTTP client cannot be constructed.
    pub fn new(base_url: &str, connect_timeout: Duration) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| RelayError::UpstreamUnavailable {
                reason: e.to_string(),
            })?;
        Ok(Self {
            client,
            url: format!("{}/api/generate", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl GenerationBackend for OllamaGenerationBackend {
    async fn open(&self, request: GenerationRequest) -> Result<Box<dyn TokenSource>, RelayError> {
        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RelayError::UpstreamUnavailable {
                reason: format!("{}: {e}", self.url),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::UpstreamUnavailable {
                reason: format!("{} answered HTTP {status}", self.url),
            });
        }

        debug!(model = %request.model, "Generation stream opened");
        Ok(Box::new(OllamaTokenSource {
            response: Some(response),
            decoder: LineDecoder::new(),
            pending: VecDeque::new(),
        }))
    }
}

#[derive(Deserialize)]
struct OllamaRecord {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

fn parse_record(line: &str) -> Result<GenerationChunk, RelayError> {
    let record: OllamaRecord =
        serde_json::from_str(line).map_err(|e| RelayError::Protocol(e.to_string()))?;
    if let Some(error) = record.error {
        return Err(RelayError::UpstreamUnavailable { reason: error });
    }
    Ok(GenerationChunk {
        response: record.response,
        done: record.done,
    })
}

/// Open `/api/generate` response body.
struct OllamaTokenSource {
    /// `None` once the body ended or the source was closed.
    response: Option<reqwest::Response>,
    decoder: LineDecoder,
    pending: VecDeque<String>,
}

#[async_trait]
impl TokenSource for OllamaTokenSource {
    async fn next_chunk(&mut self) -> Result<Option<GenerationChunk>, RelayError> {
        loop {
            if let Some(line) = self.pending.pop_front() {
                return parse_record(&line).map(Some);
            }

            let Some(response) = self.response.as_mut() else {
                return Ok(None);
            };

            match response.chunk().await {
                Ok(Some(bytes)) => match self.decoder.push(&bytes) {
                    Ok(lines) => self.pending.extend(lines),
                    Err(e) => {
                        self.response = None;
                        return Err(e);
                    }
                },
                Ok(None) => {
                    self.response = None;
                    self.pending.extend(self.decoder.finish()?);
                }
                Err(e) => {
                    self.response = None;
                    return Err(RelayError::UpstreamUnavailable {
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    async fn close(&mut self) {
        // Dropping the body closes the connection
        if self.response.take().is_some() {
            debug!("Generation stream closed");
        }
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one streaming response, writing `parts` as separate flushes.
    async fn serve_stream(parts: Vec<&'static str>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let mut read = 0;
            loop {
                let n = socket.read(&mut buf[read..]).await.unwrap();
                read += n;
                let text = String::from_utf8_lossy(&buf[..read]).to_string();
                if let Some(end) = text.find("\r\n\r\n") {
                    let len = text
                        .lines()
                        .find_map(|l| {
                            l.to_ascii_lowercase()
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                        })
                        .unwrap_or(0);
                    if read >= end + 4 + len {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\nContent-Type: application/x-ndjson\r\nConnection: close\r\n\r\n",
                )
                .await
                .unwrap();
            for part in parts {
                // The client may hang up early
                if socket.write_all(part.as_bytes()).await.is_err() {
                    return;
                }
                socket.flush().await.ok();
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            socket.shutdown().await.ok();
        });
        format!("http://{addr}")
    }

    async fn drain(source: &mut Box<dyn TokenSource>) -> Result<Vec<GenerationChunk>, RelayError> {
        let mut chunks = Vec::new();
        while let Some(chunk) = source.next_chunk().await? {
            chunks.push(chunk);
        }
        Ok(chunks)
    }

    #[test]
    fn test_parse_record() {
        assert_eq!(
            parse_record(r#"{"response":"hi","done":false}"#).unwrap(),
            GenerationChunk::token("hi")
        );
        assert_eq!(parse_record(r#"{"done":true}"#).unwrap(), GenerationChunk::done());
        assert!(matches!(
            parse_record(r#"{"error":"model not found"}"#),
            Err(RelayError::UpstreamUnavailable { .. })
        ));
        assert!(matches!(parse_record("not json"), Err(RelayError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_stream_reassembles_split_records() {
        let base = serve_stream(vec![
            "{\"response\":\"Hel",
            "lo\",\"done\":false}\n{\"response\":\" world\",\"done\":false}\n",
            "{\"done\":true}\n",
        ])
        .await;
        let backend = OllamaGenerationBackend::new(&base, Duration::from_secs(2)).unwrap();
        let mut source = backend
            .open(GenerationRequest::streaming("llama3", "hi"))
            .await
            .unwrap();

        let chunks = drain(&mut source).await.unwrap();
        assert_eq!(
            chunks,
            vec![
                GenerationChunk::token("Hello"),
                GenerationChunk::token(" world"),
                GenerationChunk::done(),
            ]
        );
    }

    #[tokio::test]
    async fn test_close_stops_stream() {
        let base = serve_stream(vec![
            "{\"response\":\"a\",\"done\":false}\n",
            "{\"response\":\"b\",\"done\":false}\n",
        ])
        .await;
        let backend = OllamaGenerationBackend::new(&base, Duration::from_secs(2)).unwrap();
        let mut source = backend
            .open(GenerationRequest::streaming("llama3", "hi"))
            .await
            .unwrap();

        assert_eq!(source.next_chunk().await.unwrap(), Some(GenerationChunk::token("a")));
        source.close().await;
        assert_eq!(source.next_chunk().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unreachable_backend() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let backend =
            OllamaGenerationBackend::new(&format!("http://{addr}"), Duration::from_secs(1)).unwrap();
        let err = backend
            .open(GenerationRequest::streaming("llama3", "hi"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, RelayError::UpstreamUnavailable { .. }));
    }
}
