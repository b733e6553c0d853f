use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::command::{CommandId, CommandStatus, IdempotencyKey, OutboxCommand, WorkspaceId};

/// Storage form of an outbox command.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCommand {
    pub id: String,
    pub workspace_id: String,
    #[serde(rename = "type")]
    pub command_type: String,
    /// Payload as JSON text.
    pub payload: String,
    pub idempotency_key: String,
    pub status: String,
    pub attempt_count: u32,
    pub last_error: Option<String>,
    pub created_at: String,
    pub next_attempt_at: Option<String>,
}

/// A stored record that could not be decoded.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("corrupt outbox record {id}: {reason}")]
pub struct CorruptRecord {
    pub id: String,
    pub reason: String,
}

impl CorruptRecord {
    pub fn new(id: impl Into<String>, reason: impl Into<String>) -> Self {
        CorruptRecord {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

/// Canonical, sortable text form of a timestamp.
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(text).map(|at| at.with_timezone(&Utc))
}

pub fn encode(command: &OutboxCommand) -> StoredCommand {
    StoredCommand {
        id: command.id.to_string(),
        workspace_id: command.workspace_id.as_str().to_string(),
        command_type: command.command_type.clone(),
        payload: command.payload.to_string(),
        idempotency_key: command.idempotency_key.as_str().to_string(),
        status: command.status.as_str().to_string(),
        attempt_count: command.attempt_count,
        last_error: command.last_error.clone(),
        created_at: format_timestamp(&command.created_at),
        next_attempt_at: command.next_attempt_at.as_ref().map(format_timestamp),
    }
}

/// Decode a stored record. Nothing partially decoded is ever returned.
pub fn decode(stored: &StoredCommand) -> Result<OutboxCommand, CorruptRecord> {
    let corrupt = |reason: String| CorruptRecord::new(&stored.id, reason);

    let id = Uuid::parse_str(&stored.id)
        .map(CommandId::from_uuid)
        .map_err(|e| corrupt(format!("invalid id: {}", e)))?;
    if stored.workspace_id.is_empty() {
        return Err(corrupt("empty workspace id".into()));
    }
    if stored.command_type.is_empty() {
        return Err(corrupt("empty command type".into()));
    }
    if stored.idempotency_key.is_empty() {
        return Err(corrupt("empty idempotency key".into()));
    }
    let payload: Value = serde_json::from_str(&stored.payload)
        .map_err(|e| corrupt(format!("invalid payload: {}", e)))?;
    let status: CommandStatus = stored.status.parse().map_err(corrupt)?;
    let created_at = parse_timestamp(&stored.created_at)
        .map_err(|e| corrupt(format!("invalid createdAt: {}", e)))?;
    let next_attempt_at = stored
        .next_attempt_at
        .as_deref()
        .map(parse_timestamp)
        .transpose()
        .map_err(|e| corrupt(format!("invalid nextAttemptAt: {}", e)))?;

    Ok(OutboxCommand {
        id,
        workspace_id: WorkspaceId::new(stored.workspace_id.as_str()),
        command_type: stored.command_type.clone(),
        payload,
        idempotency_key: IdempotencyKey::new(stored.idempotency_key.as_str()),
        status,
        attempt_count: stored.attempt_count,
        last_error: stored.last_error.clone(),
        created_at,
        next_attempt_at,
    })
}
