use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Delivery status of an outbox command.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandStatus {
    #[default]
    Pending,
    InFlight,
    Failed,
    Done,
}

/// Events that move a command between statuses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Transition {
    /// Picked by a drain for delivery.
    Pick,
    /// The remote applied the command.
    Accept,
    /// The remote failed transiently; retry after backoff.
    RejectRetryable,
    /// The remote refused the command for good.
    RejectPermanent,
    /// A failed command's `next_attempt_at` has passed.
    BackoffElapsed,
    /// Start-up recovery of a command whose delivery outcome is unknown.
    Recover,
}

impl CommandStatus {
    /// The transition table. Returns `None` when `transition` is not allowed
    /// from this status.
    pub fn apply(self, transition: Transition) -> Option<CommandStatus> {
        use CommandStatus::*;
        use Transition::*;

        match (self, transition) {
            (Pending, Pick) => Some(InFlight),
            (InFlight, Accept) => Some(Done),
            (InFlight, RejectRetryable) => Some(Failed),
            (InFlight, RejectPermanent) => Some(Done),
            (InFlight, Recover) => Some(Pending),
            (Failed, BackoffElapsed) => Some(Pending),
            _ => None,
        }
    }

    /// Whether a command in this status may be picked at `now`.
    pub fn is_eligible(self, next_attempt_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match self {
            CommandStatus::Pending => true,
            CommandStatus::Failed => next_attempt_at.map_or(true, |at| at <= now),
            CommandStatus::InFlight | CommandStatus::Done => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == CommandStatus::Done
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CommandStatus::Pending => "PENDING",
            CommandStatus::InFlight => "IN_FLIGHT",
            CommandStatus::Failed => "FAILED",
            CommandStatus::Done => "DONE",
        }
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "PENDING" => Ok(CommandStatus::Pending),
            "IN_FLIGHT" => Ok(CommandStatus::InFlight),
            "FAILED" => Ok(CommandStatus::Failed),
            "DONE" => Ok(CommandStatus::Done),
            other => Err(format!("unknown command status {:?}", other)),
        }
    }
}
