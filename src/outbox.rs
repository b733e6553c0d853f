use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::command::{split_payload, CommandId, CommandPayload, IdempotencyKey, OutboxCommand, WorkspaceId};
use crate::engine::{Clock, SystemClock};
use crate::store::{CommandStore, StoreError};

/// Enqueue side of the outbox.
///
/// Enqueueing only writes to the local store and never waits on the network.
pub struct Outbox<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S> Clone for Outbox<S> {
    fn clone(&self) -> Self {
        Outbox {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<S: CommandStore> Outbox<S> {
    pub fn new(store: Arc<S>) -> Self {
        Outbox {
            store,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Persist a new `PENDING` command and return its id.
    pub fn enqueue(
        &self,
        workspace_id: impl Into<WorkspaceId>,
        command_type: impl Into<String>,
        payload: Value,
        idempotency_key: impl Into<IdempotencyKey>,
    ) -> Result<CommandId, StoreError> {
        let command = OutboxCommand::new(
            workspace_id,
            command_type,
            payload,
            idempotency_key,
            self.clock.now(),
        );
        debug!(
            id = %command.id,
            workspace = %command.workspace_id,
            command_type = %command.command_type,
            "enqueue command"
        );
        self.store.enqueue(command)
    }

    /// Enqueue a typed payload; the command type comes from its variant.
    pub fn enqueue_typed<P: CommandPayload>(
        &self,
        workspace_id: impl Into<WorkspaceId>,
        payload: &P,
        idempotency_key: impl Into<IdempotencyKey>,
    ) -> Result<CommandId, StoreError> {
        let (command_type, payload) = split_payload(payload)?;
        self.enqueue(workspace_id, command_type, payload, idempotency_key)
    }

    pub fn pending_count(&self, workspace_id: &WorkspaceId) -> Result<usize, StoreError> {
        self.store.count(workspace_id)
    }
}
