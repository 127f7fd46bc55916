//! Stream Relay Service
//!
//! One `run` per envelope. The loop is strictly sequential: read a chunk,
//! check for cancellation, forward the token. That sequencing is what
//! preserves production order.

use shared_types::Envelope;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use super::cancellation::CancelSignal;
use crate::domain::{RelayError, RelayOutcome, RelayState, StreamEvent};
use crate::ports::{GenerationBackend, GenerationChunk, GenerationRequest, TokenSource};

/// How long a terminal event may wait for room in the caller's channel.
const TERMINAL_SEND_GRACE: Duration = Duration::from_millis(250);

/// Relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Bound on opening the stream plus receiving its first record.
    pub first_token_timeout: Duration,
    /// Model used when the payload does not pin one.
    pub default_model: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            first_token_timeout: Duration::from_secs(30),
            default_model: "llama3".to_string(),
        }
    }
}

/// What interrupted a wait on the backend.
enum Wake<T> {
    Ready(T),
    Cancelled,
    HungUp,
    TimedOut,
}

/// Per-envelope relay bookkeeping.
struct Run<'a> {
    state: RelayState,
    tokens: usize,
    sink: &'a mpsc::Sender<StreamEvent>,
}

impl Run<'_> {
    /// Take the single terminal transition and notify the caller.
    async fn finish(mut self, terminal: RelayState, error: Option<RelayError>) -> RelayOutcome {
        if let Err(e) = self.state.transition(terminal) {
            // Unreachable by construction of `run`
            warn!(error = %e, "Relay attempted an illegal transition");
        }

        let event = match (&terminal, &error) {
            (RelayState::Completed, _) => Some(StreamEvent::Completed),
            (RelayState::Failed, Some(e)) => Some(StreamEvent::Failed {
                error: e.to_string(),
            }),
            (RelayState::Failed, None) => Some(StreamEvent::Failed {
                error: "generation failed".to_string(),
            }),
            (RelayState::Cancelled, _) => Some(StreamEvent::Cancelled),
            _ => None,
        };
        if let Some(event) = event {
            // Caller may be gone or no longer reading
            if let Err(e) = self.sink.send_timeout(event, TERMINAL_SEND_GRACE).await {
                debug!(error = %e, "Terminal event not delivered");
            }
        }

        RelayOutcome {
            state: self.state,
            tokens: self.tokens,
            error,
        }
    }
}

/// Relays generation output for one envelope at a time.
pub struct StreamRelay {
    backend: Arc<dyn GenerationBackend>,
    config: RelayConfig,
}

impl StreamRelay {
    pub fn new(backend: Arc<dyn GenerationBackend>, config: RelayConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Relay the generation for `envelope` into `sink`.
    ///
    /// Ends with exactly one terminal event on `sink` unless the caller hung
    /// up or stopped reading, and returns the terminal state reached.
    pub async fn run(
        &self,
        envelope: &Envelope,
        mut cancel: CancelSignal,
        sink: mpsc::Sender<StreamEvent>,
    ) -> RelayOutcome {
        let trace_id = envelope.trace_id();
        let mut run = Run {
            state: RelayState::Opening,
            tokens: 0,
            sink: &sink,
        };

        let Some(prompt) = envelope.payload().render_prompt() else {
            let error = RelayError::MissingPrompt {
                kind: envelope.payload().kind(),
            };
            return run.finish(RelayState::Failed, Some(error)).await;
        };
        let model = match envelope.payload() {
            shared_types::Payload::ChatCompletion { model: Some(m), .. } => m.clone(),
            _ => self.config.default_model.clone(),
        };

        if cancel.is_cancelled() {
            info!(%trace_id, "Cancelled before opening");
            return run.finish(RelayState::Cancelled, None).await;
        }

        // ── OPENING ───────────────────────────────────────────────────────
        let deadline = Instant::now() + self.config.first_token_timeout;
        let request = GenerationRequest::streaming(model, prompt);
        let open = tokio::select! {
            biased;
            _ = cancel.cancelled() => Wake::Cancelled,
            _ = sink.closed() => Wake::HungUp,
            result = timeout_at(deadline, self.backend.open(request)) => match result {
                Ok(opened) => Wake::Ready(opened),
                Err(_) => Wake::TimedOut,
            },
        };

        let mut source = match open {
            Wake::Ready(Ok(source)) => source,
            Wake::Ready(Err(e)) => {
                warn!(%trace_id, error = %e, "Generation backend unavailable");
                return run.finish(RelayState::Failed, Some(e)).await;
            }
            Wake::Cancelled | Wake::HungUp => {
                return run.finish(RelayState::Cancelled, None).await;
            }
            Wake::TimedOut => {
                let error = self.timeout_error();
                return run.finish(RelayState::Failed, Some(error)).await;
            }
        };

        // ── STREAMING ─────────────────────────────────────────────────────
        loop {
            let first = run.state == RelayState::Opening;
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => Wake::Cancelled,
                _ = sink.closed() => Wake::HungUp,
                result = Self::next_chunk(source.as_mut(), first.then_some(deadline)) => result,
            };

            let chunk = match next {
                Wake::Ready(Ok(Some(chunk))) => chunk,
                Wake::Ready(Ok(None)) => {
                    source.close().await;
                    warn!(%trace_id, tokens = run.tokens, "Generation stream truncated");
                    return run.finish(RelayState::Failed, Some(RelayError::Truncated)).await;
                }
                Wake::Ready(Err(e)) => {
                    source.close().await;
                    warn!(%trace_id, error = %e, "Generation stream failed");
                    return run.finish(RelayState::Failed, Some(e)).await;
                }
                Wake::Cancelled => {
                    source.close().await;
                    info!(%trace_id, tokens = run.tokens, "Generation cancelled");
                    return run.finish(RelayState::Cancelled, None).await;
                }
                Wake::HungUp => {
                    source.close().await;
                    info!(%trace_id, tokens = run.tokens, "Caller hung up");
                    return run.finish(RelayState::Cancelled, None).await;
                }
                Wake::TimedOut => {
                    source.close().await;
                    let error = self.timeout_error();
                    warn!(%trace_id, error = %error, "First token timed out");
                    return run.finish(RelayState::Failed, Some(error)).await;
                }
            };

            if first {
                if let Err(e) = run.state.transition(RelayState::Streaming) {
                    source.close().await;
                    return run.finish(RelayState::Failed, Some(e)).await;
                }
                debug!(%trace_id, "First token received");
            }

            if !chunk.response.is_empty() {
                // Token boundary
                if cancel.is_cancelled() {
                    source.close().await;
                    info!(%trace_id, tokens = run.tokens, "Generation cancelled");
                    return run.finish(RelayState::Cancelled, None).await;
                }
                // A full channel must not hold the relay past a cancel
                let sent = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Wake::Cancelled,
                    sent = sink.send(StreamEvent::token(chunk.response)) => match sent {
                        Ok(()) => Wake::Ready(()),
                        Err(_) => Wake::HungUp,
                    },
                };
                match sent {
                    Wake::Ready(()) => run.tokens += 1,
                    Wake::HungUp => {
                        source.close().await;
                        info!(%trace_id, tokens = run.tokens, "Caller hung up");
                        return run.finish(RelayState::Cancelled, None).await;
                    }
                    _ => {
                        source.close().await;
                        info!(%trace_id, tokens = run.tokens, "Cancelled while caller lagged");
                        return run.finish(RelayState::Cancelled, None).await;
                    }
                }
            }

            if chunk.done {
                source.close().await;
                debug!(%trace_id, tokens = run.tokens, "Generation completed");
                return run.finish(RelayState::Completed, None).await;
            }
        }
    }

    async fn next_chunk(
        source: &mut dyn TokenSource,
        deadline: Option<Instant>,
    ) -> Wake<Result<Option<GenerationChunk>, RelayError>> {
        match deadline {
            Some(deadline) => match timeout_at(deadline, source.next_chunk()).await {
                Ok(result) => Wake::Ready(result),
                Err(_) => Wake::TimedOut,
            },
            None => Wake::Ready(source.next_chunk().await),
        }
    }

    fn timeout_error(&self) -> RelayError {
        RelayError::FirstTokenTimeout {
            after_ms: self.config.first_token_timeout.as_millis() as u64,
        }
    }
}
