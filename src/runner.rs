//! Background task that turns connectivity changes, timer ticks and manual
//! requests into drain passes.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::command::WorkspaceId;
use crate::config::SyncConfig;
use crate::engine::{DrainOutcome, DrainResult, SyncEngine};
use crate::error::SyncError;
use crate::lock::SyncLock;
use crate::network::{NetworkMonitor, NetworkStatus, Subscription};
use crate::remote::RemoteEndpoint;
use crate::store::CommandStore;

/// A manual "sync now" request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncTrigger {
    All,
    Workspace(WorkspaceId),
}

/// Statistics from the runner.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunnerStats {
    pub drains: usize,
    pub delivered: usize,
    pub rejected: usize,
    pub hard_stops: usize,
    pub skipped: usize,
    pub errors: usize,
    pub recovered: usize,
    pub polls: usize,
}

impl RunnerStats {
    fn record(&mut self, joined: Result<(WorkspaceId, Result<DrainResult, SyncError>), JoinError>) {
        match joined {
            Ok((_, Ok(result))) => {
                self.drains += 1;
                self.delivered += result.delivered;
                self.rejected += result.rejected;
                match result.outcome {
                    DrainOutcome::HardStopped(_) => self.hard_stops += 1,
                    DrainOutcome::LockUnavailable => self.skipped += 1,
                    _ => {}
                }
            }
            Ok((workspace_id, Err(err))) => {
                error!(workspace = %workspace_id, %err, "drain failed");
                self.errors += 1;
            }
            Err(err) => {
                error!(%err, "drain task panicked");
                self.errors += 1;
            }
        }
    }
}

enum Wake {
    /// The monitor reported a transition to `ONLINE`.
    Online,
    Manual(SyncTrigger),
}

type DrainSet = JoinSet<(WorkspaceId, Result<DrainResult, SyncError>)>;

/// Runs drains in the background until stopped.
///
/// On start it requeues commands an earlier process left in flight. After
/// that it drains every workspace when the monitor goes `ONLINE`, re-probes
/// on every poll tick (draining if the network stayed up), and serves
/// [`SyncTrigger`]s from [`sync_now`](Self::sync_now). Each workspace drains
/// in its own task; overlapping requests for one workspace are absorbed by
/// its sync lock.
pub struct SyncRunner {
    wake_tx: mpsc::UnboundedSender<Wake>,
    stop_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<RunnerStats>>,
    _subscription: Subscription,
}

impl SyncRunner {
    /// Must be called from within a tokio runtime.
    ///
    /// Only the poll interval is read from `config`. Backoff and batch size
    /// belong to the engine ([`SyncEngine::with_config`]) and the probe
    /// timeout to the monitor ([`NetworkMonitor::with_config`]).
    pub fn spawn<S, L, R>(
        engine: Arc<SyncEngine<S, L, R>>,
        monitor: Arc<NetworkMonitor>,
        config: &SyncConfig,
    ) -> Self
    where
        S: CommandStore + 'static,
        L: SyncLock + 'static,
        R: RemoteEndpoint + 'static,
    {
        let (wake_tx, wake_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = oneshot::channel();

        let online_tx = wake_tx.clone();
        let subscription = monitor.subscribe(move |status| {
            if status.is_online() {
                let _ = online_tx.send(Wake::Online);
            }
        });

        let poll_interval = config.poll_interval();
        let handle = tokio::spawn(run(engine, monitor, wake_rx, stop_rx, poll_interval));

        SyncRunner {
            wake_tx,
            stop_tx: Some(stop_tx),
            handle: Some(handle),
            _subscription: subscription,
        }
    }

    /// Request a drain. It runs only if a fresh probe reports `ONLINE`.
    ///
    /// Returns `false` once the runner has stopped.
    pub fn sync_now(&self, trigger: SyncTrigger) -> bool {
        self.wake_tx.send(Wake::Manual(trigger)).is_ok()
    }

    /// Stop the runner, wait for in-progress drains and return the stats.
    pub async fn stop(mut self) -> RunnerStats {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        match self.handle.take() {
            Some(handle) => handle.await.unwrap_or_else(|err| {
                error!(%err, "sync runner panicked");
                RunnerStats::default()
            }),
            None => RunnerStats::default(),
        }
    }
}

impl Drop for SyncRunner {
    fn drop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
    }
}

async fn run<S, L, R>(
    engine: Arc<SyncEngine<S, L, R>>,
    monitor: Arc<NetworkMonitor>,
    mut wake_rx: mpsc::UnboundedReceiver<Wake>,
    mut stop_rx: oneshot::Receiver<()>,
    poll_interval: std::time::Duration,
) -> RunnerStats
where
    S: CommandStore + 'static,
    L: SyncLock + 'static,
    R: RemoteEndpoint + 'static,
{
    let mut stats = RunnerStats::default();
    match engine.recover() {
        Ok(recovered) => stats.recovered = recovered,
        Err(err) => {
            error!(%err, "recovery failed");
            stats.errors += 1;
        }
    }

    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut drains = DrainSet::new();
    info!(poll_interval_ms = poll_interval.as_millis() as u64, "sync runner started");

    loop {
        tokio::select! {
            _ = &mut stop_rx => break,
            Some(wake) = wake_rx.recv() => match wake {
                Wake::Online => spawn_all(&engine, &mut drains, &mut stats),
                Wake::Manual(trigger) => {
                    let Some(status) = probe_or_stop(&monitor, &mut stop_rx).await else {
                        break;
                    };
                    if !status.is_online() {
                        debug!(?trigger, "offline, sync request ignored");
                    } else if let SyncTrigger::Workspace(workspace_id) = trigger {
                        spawn_drain(&engine, &mut drains, workspace_id);
                    } else {
                        spawn_all(&engine, &mut drains, &mut stats);
                    }
                }
            },
            _ = ticker.tick() => {
                stats.polls += 1;
                let was_online = monitor.last_known().is_online();
                let Some(status) = probe_or_stop(&monitor, &mut stop_rx).await else {
                    break;
                };
                // A transition to ONLINE is announced through the subscription.
                if status.is_online() && was_online {
                    spawn_all(&engine, &mut drains, &mut stats);
                }
            }
            Some(joined) = drains.join_next() => stats.record(joined),
        }
    }

    while let Some(joined) = drains.join_next().await {
        stats.record(joined);
    }
    info!(drains = stats.drains, delivered = stats.delivered, "sync runner stopped");
    stats
}

/// Probe connectivity, giving up as soon as the runner is asked to stop.
async fn probe_or_stop(
    monitor: &NetworkMonitor,
    stop_rx: &mut oneshot::Receiver<()>,
) -> Option<NetworkStatus> {
    tokio::select! {
        _ = stop_rx => None,
        status = monitor.current() => Some(status),
    }
}

fn spawn_all<S, L, R>(
    engine: &Arc<SyncEngine<S, L, R>>,
    drains: &mut DrainSet,
    stats: &mut RunnerStats,
) where
    S: CommandStore + 'static,
    L: SyncLock + 'static,
    R: RemoteEndpoint + 'static,
{
    match engine.store().workspaces() {
        Ok(workspaces) => {
            for workspace_id in workspaces {
                spawn_drain(engine, drains, workspace_id);
            }
        }
        Err(err) => {
            warn!(%err, "could not list workspaces");
            stats.errors += 1;
        }
    }
}

fn spawn_drain<S, L, R>(
    engine: &Arc<SyncEngine<S, L, R>>,
    drains: &mut DrainSet,
    workspace_id: WorkspaceId,
) where
    S: CommandStore + 'static,
    L: SyncLock + 'static,
    R: RemoteEndpoint + 'static,
{
    let engine = Arc::clone(engine);
    drains.spawn(async move {
        let result = engine.drain(&workspace_id).await;
        (workspace_id, result)
    });
}
