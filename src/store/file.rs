use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use super::table::{CommandTable, DEFAULT_ARCHIVE_LIMIT};
use super::{CommandStore, PendingBatch, StoreError};
use crate::codec::StoredCommand;
use crate::command::{CommandId, OutboxCommand, WorkspaceId};

/// One line of the outbox file.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileLine {
    seq: u64,
    #[serde(default)]
    archived: bool,
    record: StoredCommand,
}

struct FileState {
    table: CommandTable,
    /// Lines that could not be parsed at load time, kept verbatim.
    unreadable: Vec<String>,
}

/// Command store persisted as a JSON-lines file.
///
/// Every mutation is applied to a copy of the table, written to a temporary
/// file, synced, and renamed over the original before it becomes visible, so
/// a crash leaves either the old or the new table on disk.
///
/// Rejected commands are archived in the same file; only the newest
/// [`archive_limit`](Self::with_archive_limit) of them are kept.
pub struct FileCommandStore {
    path: PathBuf,
    archive_limit: usize,
    state: Mutex<FileState>,
}

impl FileCommandStore {
    /// A store over `path` that has not been loaded yet; call
    /// [`initialize`](CommandStore::initialize) before use.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileCommandStore {
            path: path.into(),
            archive_limit: DEFAULT_ARCHIVE_LIMIT,
            state: Mutex::new(FileState {
                table: CommandTable::new(),
                unreadable: Vec::new(),
            }),
        }
    }

    /// Open (creating if needed) the outbox file at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self::new(path);
        store.initialize()?;
        Ok(store)
    }

    pub fn with_archive_limit(mut self, limit: usize) -> Self {
        self.archive_limit = limit;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn load(&self) -> Result<FileState, StoreError> {
        let file = File::open(&self.path)?;
        let mut table = CommandTable::new();
        table.set_archive_limit(self.archive_limit);
        let mut unreadable = Vec::new();

        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<FileLine>(&line) {
                Ok(FileLine {
                    archived: true,
                    record,
                    ..
                }) => table.restore_archived(record),
                Ok(FileLine { seq, record, .. }) => table.restore(seq, record),
                Err(err) => {
                    error!(path = %self.path.display(), line = index + 1, %err, "unreadable outbox line");
                    unreadable.push(line);
                }
            }
        }

        Ok(FileState { table, unreadable })
    }

    fn persist(&self, state: &FileState) -> Result<(), StoreError> {
        let temp = self.temp_path();
        {
            let file = File::create(&temp)?;
            let mut writer = BufWriter::new(file);
            for row in state.table.rows() {
                let line = FileLine {
                    seq: row.seq,
                    archived: false,
                    record: row.record.clone(),
                };
                serde_json::to_writer(&mut writer, &line)?;
                writer.write_all(b"\n")?;
            }
            for record in state.table.archive() {
                let line = FileLine {
                    seq: 0,
                    archived: true,
                    record: record.clone(),
                };
                serde_json::to_writer(&mut writer, &line)?;
                writer.write_all(b"\n")?;
            }
            for line in &state.unreadable {
                writer.write_all(line.as_bytes())?;
                writer.write_all(b"\n")?;
            }
            let file = writer.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
        }
        fs::rename(&temp, &self.path)?;
        sync_parent(&self.path)?;
        Ok(())
    }

    fn read<T>(&self, op: impl FnOnce(&CommandTable) -> T) -> Result<T, StoreError> {
        let state = self
            .state
            .lock()
            .map_err(|_| StoreError::Poisoned("read"))?;
        Ok(op(&state.table))
    }

    fn mutate<T>(
        &self,
        op: impl FnOnce(&mut CommandTable) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| StoreError::Poisoned("write"))?;
        let mut next = FileState {
            table: state.table.clone(),
            unreadable: state.unreadable.clone(),
        };
        let value = op(&mut next.table)?;
        self.persist(&next)?;
        *state = next;
        Ok(value)
    }
}

/// Make a completed rename durable.
#[cfg(unix)]
fn sync_parent(path: &Path) -> Result<(), StoreError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    File::open(parent)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

impl CommandStore for FileCommandStore {
    fn initialize(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let loaded = self.load()?;
        let mut state = self
            .state
            .lock()
            .map_err(|_| StoreError::Poisoned("initialize"))?;
        info!(
            path = %self.path.display(),
            queued = loaded.table.rows().len(),
            unreadable = loaded.unreadable.len(),
            "outbox file loaded"
        );
        *state = loaded;
        Ok(())
    }

    fn enqueue(&self, command: OutboxCommand) -> Result<CommandId, StoreError> {
        let id = self.mutate(|table| table.insert(command))?;
        debug!(%id, "command persisted");
        Ok(id)
    }

    fn list_pending(
        &self,
        workspace_id: &WorkspaceId,
        now: DateTime<Utc>,
    ) -> Result<PendingBatch, StoreError> {
        self.read(|table| table.list_pending(workspace_id, now))
    }

    fn mark_in_flight(&self, id: CommandId) -> Result<OutboxCommand, StoreError> {
        self.mutate(|table| table.mark_in_flight(id))
    }

    fn mark_done(&self, id: CommandId) -> Result<(), StoreError> {
        self.mutate(|table| table.mark_done(id))
    }

    fn mark_failed(
        &self,
        id: CommandId,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<OutboxCommand, StoreError> {
        self.mutate(|table| table.mark_failed(id, error, next_attempt_at))
    }

    fn mark_rejected(&self, id: CommandId, error: &str) -> Result<(), StoreError> {
        self.mutate(|table| table.mark_rejected(id, error))
    }

    fn count(&self, workspace_id: &WorkspaceId) -> Result<usize, StoreError> {
        self.read(|table| table.count(workspace_id))
    }

    fn get(&self, id: CommandId) -> Result<Option<OutboxCommand>, StoreError> {
        self.read(|table| table.get(id))?
    }

    fn recover_in_flight(&self, workspace_id: &WorkspaceId) -> Result<usize, StoreError> {
        self.mutate(|table| table.recover_in_flight(workspace_id))
    }

    fn workspaces(&self) -> Result<Vec<WorkspaceId>, StoreError> {
        self.read(|table| table.workspaces())
    }

    fn rejected(&self, workspace_id: &WorkspaceId) -> Result<Vec<OutboxCommand>, StoreError> {
        self.read(|table| table.rejected(workspace_id))
    }
}
