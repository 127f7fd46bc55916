//! Ports for the Dispatcher subsystem.

pub mod outbound;

pub use outbound::{ManualTimeSource, SystemTimeSource, TimeSource};
