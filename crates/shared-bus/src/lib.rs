//! # Shared Bus - Lifecycle Events
//!
//! Broadcast bus on which the runtime publishes what happens to each
//! envelope: queued, dispatched, streamed, finished, remembered.
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │ Region       │    publish()       │ Observer     │
//! │ worker       │ ──────┐            │ (metrics,    │
//! └──────────────┘       │            │  audit, ...) │
//!                        ▼            └──────────────┘
//!                  ┌──────────────┐          ↑
//!                  │  Event Bus   │ ─────────┘
//!                  └──────────────┘  subscribe()
//! ```
//!
//! Publishing never blocks and never fails: with no subscribers the event
//! is dropped, and a lagging subscriber loses its oldest events.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod events;
pub mod publisher;
pub mod subscriber;

pub use events::{BackboneEvent, EventFilter, EventTopic, StreamOutcome};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::Subscription;

/// Maximum events to buffer per subscriber before it starts lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
