//! Durable, per-workspace table of outbox commands.
//!
//! - `CommandStore` - the storage contract the engine drains against
//! - `InMemoryCommandStore` - process-lifetime store, for tests and ephemeral use
//! - `FileCommandStore` - JSON-lines file, rewritten atomically on every mutation
//!
//! Records are kept in their encoded form and decoded on read, so a corrupt
//! record is reported on its own without blocking the rest of the queue.

mod error;
mod file;
mod in_memory;
mod store;
mod table;

pub use error::StoreError;
pub use file::FileCommandStore;
pub use in_memory::InMemoryCommandStore;
pub use store::{BlockedHead, CommandStore, PendingBatch};
