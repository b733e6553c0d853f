use std::collections::{BTreeSet, HashMap, VecDeque};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::store::{BlockedHead, PendingBatch};
use super::StoreError;
use crate::codec::{self, StoredCommand};
use crate::command::{CommandId, CommandStatus, OutboxCommand, Transition, WorkspaceId};

/// A queued record and its enqueue sequence number.
#[derive(Debug, Clone)]
pub(crate) struct Row {
    pub seq: u64,
    pub record: StoredCommand,
}

/// The outbox table shared by every store implementation.
///
/// Rows are keyed by command id, with a secondary index on
/// `(workspace_id, idempotency_key)` covering every queued command.
/// Completed commands are removed; permanently rejected ones move to
/// `archive`, which keeps at most `archive_limit` of the newest entries.
#[derive(Debug, Clone)]
pub(crate) struct CommandTable {
    rows: HashMap<String, Row>,
    keys: HashMap<(String, String), String>,
    archive: VecDeque<StoredCommand>,
    archive_limit: usize,
    next_seq: u64,
}

impl Default for CommandTable {
    fn default() -> Self {
        CommandTable {
            rows: HashMap::new(),
            keys: HashMap::new(),
            archive: VecDeque::new(),
            archive_limit: DEFAULT_ARCHIVE_LIMIT,
            next_seq: 0,
        }
    }
}

/// Rejected commands kept for inspection unless a store says otherwise.
pub(crate) const DEFAULT_ARCHIVE_LIMIT: usize = 1_000;

impl CommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_archive_limit(&mut self, limit: usize) {
        self.archive_limit = limit;
        self.trim_archive();
    }

    pub fn insert(&mut self, mut command: OutboxCommand) -> Result<CommandId, StoreError> {
        let key = (
            command.workspace_id.as_str().to_string(),
            command.idempotency_key.as_str().to_string(),
        );
        if self.keys.contains_key(&key) {
            return Err(StoreError::DuplicateIdempotencyKey {
                workspace_id: command.workspace_id,
                idempotency_key: command.idempotency_key,
            });
        }

        command.status = CommandStatus::Pending;
        command.attempt_count = 0;
        command.last_error = None;
        command.next_attempt_at = None;

        let id = command.id;
        let record = codec::encode(&command);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.keys.insert(key, record.id.clone());
        self.rows.insert(record.id.clone(), Row { seq, record });
        Ok(id)
    }

    /// Put back a row loaded from durable storage.
    pub fn restore(&mut self, seq: u64, record: StoredCommand) {
        self.next_seq = self.next_seq.max(seq.saturating_add(1));
        self.keys.insert(
            (record.workspace_id.clone(), record.idempotency_key.clone()),
            record.id.clone(),
        );
        self.rows.insert(record.id.clone(), Row { seq, record });
    }

    pub fn restore_archived(&mut self, record: StoredCommand) {
        self.archive.push_back(record);
        self.trim_archive();
    }

    /// Queued rows in enqueue order.
    pub fn rows(&self) -> Vec<&Row> {
        let mut rows: Vec<&Row> = self.rows.values().collect();
        rows.sort_by_key(|row| row.seq);
        rows
    }

    pub fn archive(&self) -> impl Iterator<Item = &StoredCommand> {
        self.archive.iter()
    }

    pub fn list_pending(&self, workspace_id: &WorkspaceId, now: DateTime<Utc>) -> PendingBatch {
        let mut queued = Vec::new();
        let mut corrupt = Vec::new();

        for row in self.workspace_rows(workspace_id) {
            match codec::decode(&row.record) {
                Ok(command) => queued.push((row.seq, command)),
                Err(err) => corrupt.push((row.seq, err)),
            }
        }

        queued.sort_by(|(seq_a, a), (seq_b, b)| {
            a.created_at.cmp(&b.created_at).then(seq_a.cmp(seq_b))
        });
        corrupt.sort_by_key(|(seq, _)| *seq);

        let mut batch = PendingBatch::default();
        for (_, command) in queued {
            if command.status.is_eligible(command.next_attempt_at, now) {
                batch.commands.push(command);
            } else if batch.blocked.is_none() {
                batch.blocked = Some(BlockedHead {
                    id: command.id,
                    status: command.status,
                    next_attempt_at: command.next_attempt_at,
                    eligible_before: batch.commands.len(),
                });
            }
        }
        batch.corrupt = corrupt.into_iter().map(|(_, err)| err).collect();
        batch
    }

    pub fn mark_in_flight(&mut self, id: CommandId) -> Result<OutboxCommand, StoreError> {
        let mut command = self.decode_row(id)?;
        if command.status == CommandStatus::Failed {
            apply(&mut command, Transition::BackoffElapsed)?;
        }
        apply(&mut command, Transition::Pick)?;
        command.attempt_count = command.attempt_count.saturating_add(1);
        self.replace(&command);
        Ok(command)
    }

    pub fn mark_done(&mut self, id: CommandId) -> Result<(), StoreError> {
        let mut command = self.decode_row(id)?;
        apply(&mut command, Transition::Accept)?;
        self.remove(id);
        Ok(())
    }

    pub fn mark_failed(
        &mut self,
        id: CommandId,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<OutboxCommand, StoreError> {
        let mut command = self.decode_row(id)?;
        apply(&mut command, Transition::RejectRetryable)?;
        command.last_error = Some(error.to_string());
        command.next_attempt_at = Some(next_attempt_at);
        self.replace(&command);
        Ok(command)
    }

    pub fn mark_rejected(&mut self, id: CommandId, error: &str) -> Result<(), StoreError> {
        let mut command = self.decode_row(id)?;
        apply(&mut command, Transition::RejectPermanent)?;
        command.last_error = Some(error.to_string());
        command.next_attempt_at = None;
        self.remove(id);
        self.archive.push_back(codec::encode(&command));
        self.trim_archive();
        Ok(())
    }

    pub fn count(&self, workspace_id: &WorkspaceId) -> usize {
        self.workspace_rows(workspace_id).count()
    }

    pub fn get(&self, id: CommandId) -> Result<Option<OutboxCommand>, StoreError> {
        let key = id.to_string();
        if let Some(row) = self.rows.get(&key) {
            return Ok(Some(codec::decode(&row.record)?));
        }
        match self.archive.iter().find(|record| record.id == key) {
            Some(record) => Ok(Some(codec::decode(record)?)),
            None => Ok(None),
        }
    }

    pub fn recover_in_flight(&mut self, workspace_id: &WorkspaceId) -> Result<usize, StoreError> {
        let mut stranded = Vec::new();
        for row in self.workspace_rows(workspace_id) {
            if let Ok(command) = codec::decode(&row.record) {
                if command.is_in_flight() {
                    stranded.push(command);
                }
            }
        }

        for command in stranded.iter_mut() {
            apply(command, Transition::Recover)?;
            self.replace(command);
        }
        Ok(stranded.len())
    }

    pub fn workspaces(&self) -> Vec<WorkspaceId> {
        let ids: BTreeSet<&str> = self
            .rows
            .values()
            .map(|row| row.record.workspace_id.as_str())
            .collect();
        ids.into_iter().map(WorkspaceId::new).collect()
    }

    pub fn rejected(&self, workspace_id: &WorkspaceId) -> Vec<OutboxCommand> {
        self.archive
            .iter()
            .filter(|record| record.workspace_id == workspace_id.as_str())
            .filter_map(|record| match codec::decode(record) {
                Ok(command) => Some(command),
                Err(err) => {
                    warn!(%err, "skipping corrupt archived command");
                    None
                }
            })
            .collect()
    }

    fn workspace_rows<'a>(&'a self, workspace_id: &'a WorkspaceId) -> impl Iterator<Item = &'a Row> {
        self.rows
            .values()
            .filter(move |row| row.record.workspace_id == workspace_id.as_str())
    }

    fn decode_row(&self, id: CommandId) -> Result<OutboxCommand, StoreError> {
        let row = self
            .rows
            .get(&id.to_string())
            .ok_or(StoreError::NotFound(id))?;
        Ok(codec::decode(&row.record)?)
    }

    fn replace(&mut self, command: &OutboxCommand) {
        if let Some(row) = self.rows.get_mut(&command.id.to_string()) {
            row.record = codec::encode(command);
        }
    }

    fn trim_archive(&mut self) {
        let excess = self.archive.len().saturating_sub(self.archive_limit);
        if excess > 0 {
            self.archive.drain(..excess);
            debug!(dropped = excess, limit = self.archive_limit, "rejected archive trimmed");
        }
    }

    fn remove(&mut self, id: CommandId) {
        if let Some(row) = self.rows.remove(&id.to_string()) {
            self.keys
                .remove(&(row.record.workspace_id, row.record.idempotency_key));
        }
    }
}

fn apply(command: &mut OutboxCommand, transition: Transition) -> Result<(), StoreError> {
    match command.status.apply(transition) {
        Some(next) => {
            command.status = next;
            Ok(())
        }
        None => Err(StoreError::InvalidTransition {
            id: command.id,
            from: command.status,
            transition,
        }),
    }
}
