//! Per-workspace mutual exclusion for drain passes.
//!
//! The lock is advisory: it only keeps two drains of the same workspace from
//! processing commands at the same time. Acquire it through
//! [`SyncLockGuard`] so it is released on every exit path.

mod error;
mod guard;
mod in_memory;
mod sync_lock;

pub use error::LockError;
pub use guard::SyncLockGuard;
pub use in_memory::InMemorySyncLock;
pub use sync_lock::SyncLock;
