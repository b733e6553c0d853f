use chrono::{DateTime, Utc};

use super::StoreError;
use crate::codec::CorruptRecord;
use crate::command::{CommandId, CommandStatus, OutboxCommand, WorkspaceId};

/// Commands eligible for delivery, oldest first, plus any records in the same
/// workspace that failed to decode.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PendingBatch {
    pub commands: Vec<OutboxCommand>,
    pub corrupt: Vec<CorruptRecord>,
    /// The oldest queued command that is not eligible yet, if any.
    pub blocked: Option<BlockedHead>,
}

/// A queued command that is waiting out its backoff (or whose delivery
/// outcome is still unknown) and therefore holds back everything behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockedHead {
    pub id: CommandId,
    pub status: CommandStatus,
    pub next_attempt_at: Option<DateTime<Utc>>,
    /// How many entries of `commands` precede it in queue order.
    pub eligible_before: usize,
}

impl PendingBatch {
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// The prefix of `commands` that can be delivered without overtaking a
    /// blocked command.
    pub fn deliverable(&self) -> &[OutboxCommand] {
        match &self.blocked {
            Some(head) => &self.commands[..head.eligible_before.min(self.commands.len())],
            None => &self.commands,
        }
    }
}

/// Storage contract for the outbox.
///
/// Every transition on a single command is atomic; no cross-command atomicity
/// is required. The store is pure storage: ordering, backoff and retry policy
/// belong to the engine. Per-workspace exclusivity is the caller's job (see
/// [`SyncLock`](crate::SyncLock)).
pub trait CommandStore: Send + Sync {
    /// Prepare the underlying storage. Idempotent.
    fn initialize(&self) -> Result<(), StoreError>;

    /// Insert a new `PENDING` command.
    ///
    /// Fails with [`StoreError::DuplicateIdempotencyKey`] when a non-`DONE`
    /// command in the same workspace already carries the key.
    fn enqueue(&self, command: OutboxCommand) -> Result<CommandId, StoreError>;

    /// `PENDING` commands, and `FAILED` ones whose `next_attempt_at <= now`,
    /// ordered by `created_at` then enqueue order.
    fn list_pending(
        &self,
        workspace_id: &WorkspaceId,
        now: DateTime<Utc>,
    ) -> Result<PendingBatch, StoreError>;

    /// `PENDING`/eligible `FAILED` -> `IN_FLIGHT`, counting one attempt.
    fn mark_in_flight(&self, id: CommandId) -> Result<OutboxCommand, StoreError>;

    /// `IN_FLIGHT` -> `DONE`. The command leaves the queue.
    fn mark_done(&self, id: CommandId) -> Result<(), StoreError>;

    /// `IN_FLIGHT` -> `FAILED`, eligible again from `next_attempt_at`.
    fn mark_failed(
        &self,
        id: CommandId,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<OutboxCommand, StoreError>;

    /// `IN_FLIGHT` -> `DONE` with `error` kept as `last_error`. The command
    /// leaves the queue and is archived for inspection via [`rejected`](Self::rejected).
    fn mark_rejected(&self, id: CommandId, error: &str) -> Result<(), StoreError>;

    /// Number of queued (non-`DONE`) commands in the workspace.
    fn count(&self, workspace_id: &WorkspaceId) -> Result<usize, StoreError>;

    fn get(&self, id: CommandId) -> Result<Option<OutboxCommand>, StoreError>;

    /// Move every `IN_FLIGHT` command in the workspace back to `PENDING`.
    /// Returns how many were moved.
    fn recover_in_flight(&self, workspace_id: &WorkspaceId) -> Result<usize, StoreError>;

    /// Workspaces holding at least one queued command.
    fn workspaces(&self) -> Result<Vec<WorkspaceId>, StoreError>;

    /// Archived permanently rejected commands, oldest first.
    fn rejected(&self, workspace_id: &WorkspaceId) -> Result<Vec<OutboxCommand>, StoreError>;
}
