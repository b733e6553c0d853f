use tracing::warn;

use super::{LockError, SyncLock};
use crate::command::WorkspaceId;

/// Scoped hold on a workspace. Dropping the guard releases the hold, which
/// covers early returns, `?`, panics and cancelled futures alike.
pub struct SyncLockGuard<'a, L: SyncLock + ?Sized> {
    lock: &'a L,
    workspace_id: WorkspaceId,
}

impl<'a, L: SyncLock + ?Sized> SyncLockGuard<'a, L> {
    /// Acquire `workspace_id`, or return `Ok(None)` if it is already held.
    pub fn try_acquire(lock: &'a L, workspace_id: &WorkspaceId) -> Result<Option<Self>, LockError> {
        if lock.acquire(workspace_id)? {
            Ok(Some(SyncLockGuard {
                lock,
                workspace_id: workspace_id.clone(),
            }))
        } else {
            Ok(None)
        }
    }

    pub fn workspace_id(&self) -> &WorkspaceId {
        &self.workspace_id
    }
}

impl<L: SyncLock + ?Sized> Drop for SyncLockGuard<'_, L> {
    fn drop(&mut self) {
        if let Err(err) = self.lock.release(&self.workspace_id) {
            warn!(workspace = %self.workspace_id, %err, "failed to release sync lock");
        }
    }
}
