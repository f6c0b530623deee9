// medallion-core/src/domain/run/state.rs

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::error::RunError;

/// Pipeline stage a run is in. `Published` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Pending,
    Extracting,
    Validating,
    Aggregating,
    Reconciling,
    Published,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Published | Self::Failed)
    }

    pub fn can_transition_to(&self, next: &RunState) -> bool {
        match (self, next) {
            // Terminal states are frozen
            (s, _) if s.is_terminal() => false,

            // Any live state may fail
            (_, Self::Failed) => true,

            (Self::Pending, Self::Extracting) => true,
            (Self::Extracting, Self::Validating) => true,
            (Self::Validating, Self::Aggregating) => true,
            (Self::Aggregating, Self::Reconciling) => true,
            (Self::Reconciling, Self::Published) => true,

            _ => false,
        }
    }

    pub fn advance(&mut self, next: RunState) -> Result<(), RunError> {
        if !self.can_transition_to(&next) {
            return Err(RunError::InvalidTransition {
                from: *self,
                to: next,
            });
        }
        tracing::debug!(from = %self, to = %next, "run state transition");
        *self = next;
        Ok(())
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Extracting => "EXTRACTING",
            Self::Validating => "VALIDATING",
            Self::Aggregating => "AGGREGATING",
            Self::Reconciling => "RECONCILING",
            Self::Published => "PUBLISHED",
            Self::Failed => "FAILED",
        };
        f.write_str(s)
    }
}
