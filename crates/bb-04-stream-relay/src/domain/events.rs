//! # Caller-Facing Stream Events
//!
//! A caller receives zero or more `Token`s followed by exactly one terminal
//! event, over a bounded channel. The bound gives backpressure: a slow
//! caller slows the relay rather than growing a buffer.

use serde::Serialize;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::Stream;

/// One item of a response stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StreamEvent {
    Token { text: String },
    Completed,
    Cancelled,
    Failed { error: String },
}

impl StreamEvent {
    #[must_use]
    pub fn token(text: impl Into<String>) -> Self {
        Self::Token { text: text.into() }
    }

    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed {
            error: error.into(),
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Token { .. })
    }
}

/// Create a bounded sender/stream pair.
#[must_use]
pub fn response_channel(capacity: usize) -> (mpsc::Sender<StreamEvent>, ResponseStream) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (tx, ResponseStream { rx })
}

/// Receiving half handed to the caller. Dropping it counts as hang-up.
#[derive(Debug)]
pub struct ResponseStream {
    rx: mpsc::Receiver<StreamEvent>,
}

impl ResponseStream {
    /// Next event, `None` once the relay side is gone.
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.rx.recv().await
    }

    /// Drain to the terminal event, returning the joined text and the
    /// terminal event (`None` if the stream ended without one).
    pub async fn collect_text(mut self) -> (String, Option<StreamEvent>) {
        let mut text = String::new();
        while let Some(event) = self.rx.recv().await {
            match event {
                StreamEvent::Token { text: t } => text.push_str(&t),
                terminal => return (text, Some(terminal)),
            }
        }
        (text, None)
    }
}

impl Stream for ResponseStream {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
