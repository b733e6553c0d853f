use std::collections::HashSet;
use std::sync::Mutex;

use super::{LockError, SyncLock};
use crate::command::WorkspaceId;

/// In-process sync lock backed by a `Mutex<HashSet<WorkspaceId>>`.
///
/// Holds live for the lifetime of the process; a restart clears them.
#[derive(Default)]
pub struct InMemorySyncLock {
    held: Mutex<HashSet<WorkspaceId>>,
}

impl InMemorySyncLock {
    pub fn new() -> Self {
        InMemorySyncLock {
            held: Mutex::new(HashSet::new()),
        }
    }

    pub fn is_held(&self, workspace_id: &WorkspaceId) -> Result<bool, LockError> {
        let held = self
            .held
            .lock()
            .map_err(|e| LockError::Poisoned(e.to_string()))?;
        Ok(held.contains(workspace_id))
    }
}

impl SyncLock for InMemorySyncLock {
    fn acquire(&self, workspace_id: &WorkspaceId) -> Result<bool, LockError> {
        let mut held = self
            .held
            .lock()
            .map_err(|e| LockError::Poisoned(e.to_string()))?;
        if held.contains(workspace_id) {
            Ok(false)
        } else {
            held.insert(workspace_id.clone());
            Ok(true)
        }
    }

    fn release(&self, workspace_id: &WorkspaceId) -> Result<(), LockError> {
        let mut held = self
            .held
            .lock()
            .map_err(|e| LockError::Poisoned(e.to_string()))?;
        held.remove(workspace_id);
        Ok(())
    }
}
