use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::{DrainOutcome, DrainResult};
use crate::codec::CorruptRecord;
use crate::command::{OutboxCommand, WorkspaceId};

/// Observability sink for drain events.
///
/// Every method defaults to doing nothing. Rejections and corrupt records are
/// the events an operator has to act on.
pub trait SyncObserver: Send + Sync {
    fn command_delivered(&self, _command: &OutboxCommand) {}

    /// A non-retryable rejection. The command has left the queue.
    fn command_rejected(&self, _command: &OutboxCommand, _reason: &str) {}

    /// A retryable failure; `command.next_attempt_at` holds the next slot.
    fn retry_scheduled(&self, _command: &OutboxCommand, _reason: &str) {}

    fn corrupt_record(&self, _workspace_id: &WorkspaceId, _record: &CorruptRecord) {}

    fn drain_finished(&self, _workspace_id: &WorkspaceId, _result: &DrainResult) {}
}

/// Reports every event through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl SyncObserver for TracingObserver {
    fn command_delivered(&self, command: &OutboxCommand) {
        debug!(
            id = %command.id,
            command_type = %command.command_type,
            attempts = command.attempt_count,
            "command delivered"
        );
    }

    fn command_rejected(&self, command: &OutboxCommand, reason: &str) {
        error!(
            id = %command.id,
            workspace = %command.workspace_id,
            command_type = %command.command_type,
            idempotency_key = %command.idempotency_key,
            reason,
            "command permanently rejected"
        );
    }

    fn retry_scheduled(&self, command: &OutboxCommand, reason: &str) {
        warn!(
            id = %command.id,
            attempts = command.attempt_count,
            next_attempt_at = ?command.next_attempt_at,
            reason,
            "delivery failed, retry scheduled"
        );
    }

    fn corrupt_record(&self, workspace_id: &WorkspaceId, record: &CorruptRecord) {
        error!(workspace = %workspace_id, id = %record.id, reason = %record.reason, "skipping corrupt outbox record");
    }

    fn drain_finished(&self, workspace_id: &WorkspaceId, result: &DrainResult) {
        match result.outcome {
            DrainOutcome::LockUnavailable | DrainOutcome::Empty => {
                debug!(workspace = %workspace_id, outcome = ?result.outcome, "drain finished")
            }
            _ => info!(
                workspace = %workspace_id,
                outcome = ?result.outcome,
                delivered = result.delivered,
                rejected = result.rejected,
                deferred = result.deferred,
                corrupt = result.corrupt,
                "drain finished"
            ),
        }
    }
}

impl<O: SyncObserver + ?Sized> SyncObserver for Arc<O> {
    fn command_delivered(&self, command: &OutboxCommand) {
        (**self).command_delivered(command)
    }

    fn command_rejected(&self, command: &OutboxCommand, reason: &str) {
        (**self).command_rejected(command, reason)
    }

    fn retry_scheduled(&self, command: &OutboxCommand, reason: &str) {
        (**self).retry_scheduled(command, reason)
    }

    fn corrupt_record(&self, workspace_id: &WorkspaceId, record: &CorruptRecord) {
        (**self).corrupt_record(workspace_id, record)
    }

    fn drain_finished(&self, workspace_id: &WorkspaceId, result: &DrainResult) {
        (**self).drain_finished(workspace_id, result)
    }
}
