mod command;
mod payload;
mod status;

pub use command::{CommandId, IdempotencyKey, OutboxCommand, WorkspaceId};
pub use payload::CommandPayload;
pub(crate) use payload::{join_payload, split_payload};
pub use status::{CommandStatus, Transition};
