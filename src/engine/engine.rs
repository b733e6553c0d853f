use std::sync::Arc;

use tracing::{debug, instrument, warn};

use super::{BackoffPolicy, Clock, SyncObserver, SystemClock, TracingObserver};
use crate::codec::to_request;
use crate::command::{CommandId, CommandStatus, OutboxCommand, WorkspaceId};
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::lock::{SyncLock, SyncLockGuard};
use crate::outbox::Outbox;
use crate::remote::{DeliveryError, RemoteEndpoint};
use crate::store::{BlockedHead, CommandStore, StoreError};

/// How a drain pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Another drain holds the workspace. Nothing was attempted.
    LockUnavailable,
    /// No command was eligible.
    Empty,
    /// Every eligible command (up to the batch cap) was settled.
    Drained,
    /// The command failed retryably; nothing behind it was attempted.
    HardStopped(CommandId),
    /// Stopped in front of an older command that is still backing off.
    Blocked(CommandId),
}

/// Summary of one drain pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainResult {
    pub outcome: DrainOutcome,
    pub delivered: usize,
    pub rejected: usize,
    /// Eligible commands left for a later pass without being attempted.
    pub deferred: usize,
    pub corrupt: usize,
}

impl DrainResult {
    fn new(outcome: DrainOutcome) -> Self {
        DrainResult {
            outcome,
            delivered: 0,
            rejected: 0,
            deferred: 0,
            corrupt: 0,
        }
    }
}

enum Settled {
    Delivered,
    Rejected,
    Deferred,
    Vanished,
}

/// Drains workspace queues through a remote endpoint.
///
/// A drain holds the workspace's [`SyncLock`] for its whole duration and
/// delivers commands one at a time, oldest first. A retryable failure stops
/// the pass; a non-retryable one is archived and the pass continues.
pub struct SyncEngine<S, L, R> {
    store: Arc<S>,
    lock: L,
    remote: R,
    backoff: BackoffPolicy,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn SyncObserver>,
    max_batch: Option<usize>,
}

impl<S, L, R> SyncEngine<S, L, R>
where
    S: CommandStore,
    L: SyncLock,
    R: RemoteEndpoint,
{
    pub fn new(store: Arc<S>, lock: L, remote: R) -> Self {
        SyncEngine {
            store,
            lock,
            remote,
            backoff: BackoffPolicy::default(),
            clock: Arc::new(SystemClock),
            observer: Arc::new(TracingObserver),
            max_batch: None,
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Cap the number of commands settled in one pass.
    pub fn with_max_batch(mut self, max_batch: usize) -> Self {
        self.max_batch = Some(max_batch.max(1));
        self
    }

    pub fn with_config(mut self, config: &SyncConfig) -> Self {
        self.backoff = config.backoff();
        self.max_batch = config.max_batch.map(|n| n.max(1));
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn lock(&self) -> &L {
        &self.lock
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn backoff(&self) -> BackoffPolicy {
        self.backoff
    }

    /// Enqueue handle sharing this engine's store and clock.
    pub fn outbox(&self) -> Outbox<S> {
        Outbox::new(Arc::clone(&self.store)).with_clock(Arc::clone(&self.clock))
    }

    /// Run one drain pass for `workspace_id`.
    ///
    /// Returns [`DrainOutcome::LockUnavailable`] immediately if another pass
    /// holds the workspace. The lock is released on every exit path.
    #[instrument(skip(self, workspace_id), fields(workspace = %workspace_id))]
    pub async fn drain(&self, workspace_id: &WorkspaceId) -> Result<DrainResult, SyncError> {
        let result = match SyncLockGuard::try_acquire(&self.lock, workspace_id)? {
            Some(_guard) => self.drain_locked(workspace_id).await?,
            None => {
                debug!("drain already in progress");
                DrainResult::new(DrainOutcome::LockUnavailable)
            }
        };
        self.observer.drain_finished(workspace_id, &result);
        Ok(result)
    }

    /// Drain every workspace with queued commands, one after another.
    pub async fn drain_all(&self) -> Result<Vec<(WorkspaceId, DrainResult)>, SyncError> {
        let mut results = Vec::new();
        for workspace_id in self.store.workspaces()? {
            let result = self.drain(&workspace_id).await?;
            results.push((workspace_id, result));
        }
        Ok(results)
    }

    /// Requeue commands left `IN_FLIGHT` by an interrupted process.
    ///
    /// Their delivery outcome is unknown; they are sent again with the same
    /// idempotency key. Workspaces currently being drained are skipped.
    pub fn recover(&self) -> Result<usize, SyncError> {
        let mut recovered = 0;
        for workspace_id in self.store.workspaces()? {
            match SyncLockGuard::try_acquire(&self.lock, &workspace_id)? {
                Some(_guard) => {
                    let n = self.store.recover_in_flight(&workspace_id)?;
                    if n > 0 {
                        warn!(workspace = %workspace_id, recovered = n, "requeued in-flight commands");
                    }
                    recovered += n;
                }
                None => debug!(workspace = %workspace_id, "drain in progress, recovery skipped"),
            }
        }
        Ok(recovered)
    }

    async fn drain_locked(&self, workspace_id: &WorkspaceId) -> Result<DrainResult, SyncError> {
        let now = self.clock.now();
        let mut batch = self.store.list_pending(workspace_id, now)?;

        // Holding the lock, an in-flight head can only be left over from an
        // interrupted pass.
        if let Some(BlockedHead {
            status: CommandStatus::InFlight,
            ..
        }) = batch.blocked
        {
            let recovered = self.store.recover_in_flight(workspace_id)?;
            warn!(recovered, "requeued commands left in flight by an interrupted drain");
            batch = self.store.list_pending(workspace_id, now)?;
        }

        let mut result = DrainResult::new(DrainOutcome::Drained);
        result.corrupt = batch.corrupt.len();
        for record in &batch.corrupt {
            self.observer.corrupt_record(workspace_id, record);
        }

        let deliverable = batch.deliverable();
        if deliverable.is_empty() {
            result.outcome = match batch.blocked {
                Some(head) => DrainOutcome::Blocked(head.id),
                None => DrainOutcome::Empty,
            };
            return Ok(result);
        }

        let limit = self.max_batch.unwrap_or(usize::MAX).min(deliverable.len());
        for (index, command) in deliverable[..limit].iter().enumerate() {
            match self.settle(command).await? {
                Settled::Delivered => result.delivered += 1,
                Settled::Rejected => result.rejected += 1,
                Settled::Vanished => {}
                Settled::Deferred => {
                    result.deferred = deliverable.len() - index - 1;
                    result.outcome = DrainOutcome::HardStopped(command.id);
                    return Ok(result);
                }
            }
        }

        result.deferred = deliverable.len() - limit;
        if result.deferred == 0 {
            if let Some(head) = batch.blocked {
                result.outcome = DrainOutcome::Blocked(head.id);
            }
        }
        Ok(result)
    }

    async fn settle(&self, queued: &OutboxCommand) -> Result<Settled, SyncError> {
        let command = match self.store.mark_in_flight(queued.id) {
            Ok(command) => command,
            Err(StoreError::NotFound(id)) => {
                debug!(%id, "command gone before delivery");
                return Ok(Settled::Vanished);
            }
            Err(err) => return Err(err.into()),
        };

        let request = to_request(&command);
        match self.remote.deliver(&request).await {
            Ok(()) => {
                tolerate_missing(self.store.mark_done(command.id))?;
                self.observer.command_delivered(&command);
                Ok(Settled::Delivered)
            }
            Err(DeliveryError::Retryable(reason)) => {
                let next_attempt_at = self
                    .backoff
                    .next_attempt_at(command.attempt_count, self.clock.now());
                if let Some(failed) =
                    tolerate_missing(self.store.mark_failed(command.id, &reason, next_attempt_at))?
                {
                    self.observer.retry_scheduled(&failed, &reason);
                }
                Ok(Settled::Deferred)
            }
            Err(DeliveryError::NonRetryable(reason)) => {
                tolerate_missing(self.store.mark_rejected(command.id, &reason))?;
                self.observer.command_rejected(&command, &reason);
                Ok(Settled::Rejected)
            }
        }
    }
}

/// `NotFound` on a status transition is a benign race; log it and move on.
fn tolerate_missing<T>(result: Result<T, StoreError>) -> Result<Option<T>, StoreError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(StoreError::NotFound(id)) => {
            warn!(%id, "command disappeared during delivery");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}
