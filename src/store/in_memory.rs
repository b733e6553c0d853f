use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use super::table::CommandTable;
use super::{CommandStore, PendingBatch, StoreError};
use crate::command::{CommandId, OutboxCommand, WorkspaceId};

/// Process-lifetime command store.
///
/// Cloning creates another handle to the same table.
#[derive(Clone, Default)]
pub struct InMemoryCommandStore {
    table: Arc<RwLock<CommandTable>>,
}

impl InMemoryCommandStore {
    pub fn new() -> Self {
        InMemoryCommandStore {
            table: Arc::new(RwLock::new(CommandTable::new())),
        }
    }

    /// Keep at most `limit` rejected commands, dropping the oldest.
    pub fn with_archive_limit(self, limit: usize) -> Self {
        if let Ok(mut table) = self.table.write() {
            table.set_archive_limit(limit);
        }
        self
    }

    fn read<T>(&self, op: impl FnOnce(&CommandTable) -> T) -> Result<T, StoreError> {
        let table = self
            .table
            .read()
            .map_err(|_| StoreError::Poisoned("read"))?;
        Ok(op(&table))
    }

    fn write<T>(
        &self,
        op: impl FnOnce(&mut CommandTable) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut table = self
            .table
            .write()
            .map_err(|_| StoreError::Poisoned("write"))?;
        op(&mut table)
    }

    #[cfg(test)]
    pub(crate) fn with_table<T>(&self, op: impl FnOnce(&mut CommandTable) -> T) -> T {
        op(&mut self.table.write().unwrap())
    }
}

impl CommandStore for InMemoryCommandStore {
    fn initialize(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn enqueue(&self, command: OutboxCommand) -> Result<CommandId, StoreError> {
        self.write(|table| table.insert(command))
    }

    fn list_pending(
        &self,
        workspace_id: &WorkspaceId,
        now: DateTime<Utc>,
    ) -> Result<PendingBatch, StoreError> {
        self.read(|table| table.list_pending(workspace_id, now))
    }

    fn mark_in_flight(&self, id: CommandId) -> Result<OutboxCommand, StoreError> {
        self.write(|table| table.mark_in_flight(id))
    }

    fn mark_done(&self, id: CommandId) -> Result<(), StoreError> {
        self.write(|table| table.mark_done(id))
    }

    fn mark_failed(
        &self,
        id: CommandId,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<OutboxCommand, StoreError> {
        self.write(|table| table.mark_failed(id, error, next_attempt_at))
    }

    fn mark_rejected(&self, id: CommandId, error: &str) -> Result<(), StoreError> {
        self.write(|table| table.mark_rejected(id, error))
    }

    fn count(&self, workspace_id: &WorkspaceId) -> Result<usize, StoreError> {
        self.read(|table| table.count(workspace_id))
    }

    fn get(&self, id: CommandId) -> Result<Option<OutboxCommand>, StoreError> {
        self.read(|table| table.get(id))?
    }

    fn recover_in_flight(&self, workspace_id: &WorkspaceId) -> Result<usize, StoreError> {
        self.write(|table| table.recover_in_flight(workspace_id))
    }

    fn workspaces(&self) -> Result<Vec<WorkspaceId>, StoreError> {
        self.read(|table| table.workspaces())
    }

    fn rejected(&self, workspace_id: &WorkspaceId) -> Result<Vec<OutboxCommand>, StoreError> {
        self.read(|table| table.rejected(workspace_id))
    }
}
