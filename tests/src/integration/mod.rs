//! Cross-subsystem integration tests.

#[cfg(test)]
mod harness;

#[cfg(test)]
mod flows;

#[cfg(test)]
mod multi_node;
