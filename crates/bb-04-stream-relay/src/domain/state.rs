//! Relay state machine.

use super::errors::RelayError;
use serde::Serialize;

/// Per-envelope relay state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RelayState {
    Opening,
    Streaming,
    Completed,
    Cancelled,
    Failed,
}

impl RelayState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }

    /// Whether `self -> to` is a legal edge.
    #[must_use]
    pub fn can_transition_to(self, to: RelayState) -> bool {
        use RelayState::*;
        matches!(
            (self, to),
            (Opening, Streaming | Cancelled | Failed)
                | (Streaming, Completed | Cancelled | Failed)
        )
    }

    /// Move to `to`.
    ///
    /// # Errors
    ///
    /// `RelayError::InvalidTransition` for illegal edges, including any
    /// move out of a terminal state.
    pub fn transition(&mut self, to: RelayState) -> Result<(), RelayError> {
        if !self.can_transition_to(to) {
            return Err(RelayError::InvalidTransition { from: *self, to });
        }
        *self = to;
        Ok(())
    }
}

/// Summary of one finished relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayOutcome {
    /// Terminal state reached.
    pub state: RelayState,
    /// Tokens delivered to the caller.
    pub tokens: usize,
    pub error: Option<RelayError>,
}
