use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::payload::{join_payload, CommandPayload};
use super::status::CommandStatus;

/// Identifier of an outbox command, assigned at enqueue time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(Uuid);

impl CommandId {
    pub fn new() -> Self {
        CommandId(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        CommandId(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CommandId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Tenant scope. Every queue operation is keyed by a workspace.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkspaceId(String);

impl WorkspaceId {
    pub fn new(id: impl Into<String>) -> Self {
        WorkspaceId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorkspaceId {
    fn from(value: &str) -> Self {
        WorkspaceId::new(value)
    }
}

impl From<String> for WorkspaceId {
    fn from(value: String) -> Self {
        WorkspaceId(value)
    }
}

/// Caller-assigned key identifying one logical business action.
///
/// The remote uses it to recognise replays, so it must stay identical across
/// every delivery attempt of a command.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn new(key: impl Into<String>) -> Self {
        IdempotencyKey(key.into())
    }

    /// A fresh random key, for call sites without a natural business key.
    pub fn generate() -> Self {
        IdempotencyKey(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for IdempotencyKey {
    fn from(value: &str) -> Self {
        IdempotencyKey::new(value)
    }
}

impl From<String> for IdempotencyKey {
    fn from(value: String) -> Self {
        IdempotencyKey(value)
    }
}

/// A deferred remote operation.
#[derive(Clone, Debug, PartialEq)]
pub struct OutboxCommand {
    pub id: CommandId,
    pub workspace_id: WorkspaceId,
    pub command_type: String,
    pub payload: Value,
    pub idempotency_key: IdempotencyKey,
    pub status: CommandStatus,
    pub attempt_count: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub next_attempt_at: Option<DateTime<Utc>>,
}

impl OutboxCommand {
    /// Create a new `PENDING` command with a fresh id.
    pub fn new(
        workspace_id: impl Into<WorkspaceId>,
        command_type: impl Into<String>,
        payload: Value,
        idempotency_key: impl Into<IdempotencyKey>,
        created_at: DateTime<Utc>,
    ) -> Self {
        OutboxCommand {
            id: CommandId::new(),
            workspace_id: workspace_id.into(),
            command_type: command_type.into(),
            payload,
            idempotency_key: idempotency_key.into(),
            status: CommandStatus::Pending,
            attempt_count: 0,
            last_error: None,
            created_at,
            next_attempt_at: None,
        }
    }

    /// Decode the payload into its typed form.
    pub fn payload_as<P: CommandPayload>(&self) -> Result<P, serde_json::Error> {
        join_payload(&self.command_type, &self.payload)
    }

    pub fn is_pending(&self) -> bool {
        self.status == CommandStatus::Pending
    }

    pub fn is_in_flight(&self) -> bool {
        self.status == CommandStatus::InFlight
    }

    pub fn is_failed(&self) -> bool {
        self.status == CommandStatus::Failed
    }

    pub fn is_done(&self) -> bool {
        self.status == CommandStatus::Done
    }
}
