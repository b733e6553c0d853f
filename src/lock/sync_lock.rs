use super::LockError;
use crate::command::WorkspaceId;

/// Mutual exclusion keyed by workspace.
///
/// [`InMemorySyncLock`](super::InMemorySyncLock) covers a single process. An
/// implementation backed by a shared store should hold each workspace under an
/// expiring lease owned by the lock instance, so a crashed process cannot keep
/// a workspace locked forever and a stale holder cannot release someone
/// else's hold.
pub trait SyncLock: Send + Sync {
    /// Mark the workspace as held if it is free.
    ///
    /// Returns `Ok(true)` if acquired, `Ok(false)` (with no side effects) if
    /// already held. Must be a single check-and-set.
    fn acquire(&self, workspace_id: &WorkspaceId) -> Result<bool, LockError>;

    /// Clear the hold. Releasing a workspace that is not held is a no-op.
    fn release(&self, workspace_id: &WorkspaceId) -> Result<(), LockError>;
}

impl<L: SyncLock + ?Sized> SyncLock for std::sync::Arc<L> {
    fn acquire(&self, workspace_id: &WorkspaceId) -> Result<bool, LockError> {
        (**self).acquire(workspace_id)
    }

    fn release(&self, workspace_id: &WorkspaceId) -> Result<(), LockError> {
        (**self).release(workspace_id)
    }
}
