//! Domain layer for the Clock Merger subsystem.

pub mod causality;
pub mod node_clock;
pub mod resolver;
pub mod store;
