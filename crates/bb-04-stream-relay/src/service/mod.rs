//! Service layer for the Stream Relay subsystem.

mod cancellation;
mod relay;

pub use cancellation::{CancelSignal, CancellationRegistry};
pub use relay::{RelayConfig, StreamRelay};
