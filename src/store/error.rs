use crate::codec::CorruptRecord;
use crate::command::{CommandId, CommandStatus, IdempotencyKey, Transition, WorkspaceId};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A non-`DONE` command in the workspace already carries this key.
    #[error("idempotency key {idempotency_key} is already queued in workspace {workspace_id}")]
    DuplicateIdempotencyKey {
        workspace_id: WorkspaceId,
        idempotency_key: IdempotencyKey,
    },
    #[error("outbox command {0} not found")]
    NotFound(CommandId),
    #[error("outbox command {id} cannot apply {transition:?} from {from}")]
    InvalidTransition {
        id: CommandId,
        from: CommandStatus,
        transition: Transition,
    },
    #[error(transparent)]
    Corrupt(#[from] CorruptRecord),
    #[error("command store lock poisoned during {0}")]
    Poisoned(&'static str),
    #[error("command store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("command store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
