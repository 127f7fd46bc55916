//! # Backbone Container
//!
//! Configuration plus the container holding every subsystem instance.

pub mod backbone;
pub mod config;
pub mod sinks;

pub use backbone::{BackboneContainer, Backends};
pub use config::{ConfigError, NodeConfig};
pub use sinks::CallerSinks;
