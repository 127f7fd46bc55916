//! Domain layer for the Stream Relay subsystem.

pub mod errors;
pub mod events;
pub mod state;

pub use errors::RelayError;
pub use events::{response_channel, ResponseStream, StreamEvent};
pub use state::{RelayOutcome, RelayState};
