use serde::{Deserialize, Serialize};
use std::fmt;

/// Protocol state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Record created, nothing published yet
    Registered,
    /// Forward outputs published
    ForwardDone,
    /// Worker is blocked waiting for backward inputs
    AwaitingBackward,
    /// Backward inputs published by the driver
    BackwardDone,
    /// Outcome published
    Completed,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registered => "registered",
            Self::ForwardDone => "forward_done",
            Self::AwaitingBackward => "awaiting_backward",
            Self::BackwardDone => "backward_done",
            Self::Completed => "completed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Whether the driver may publish backward inputs
    pub fn accepts_backward(&self) -> bool {
        matches!(self, Self::ForwardDone | Self::AwaitingBackward)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
