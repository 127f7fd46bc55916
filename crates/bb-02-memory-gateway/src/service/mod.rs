//! Service layer for the Memory Gateway subsystem.

mod gateway;

pub use gateway::MemoryGateway;
