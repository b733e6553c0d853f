use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tracing::{debug, info};

use super::{ConnectivityProbe, NetworkStatus};
use crate::config::SyncConfig;

type Listener = Arc<dyn Fn(NetworkStatus) + Send + Sync>;

struct State {
    last: NetworkStatus,
    listeners: Vec<(u64, Listener)>,
    next_id: u64,
}

struct Shared {
    state: Mutex<State>,
    /// Held while a transition is recorded and dispatched, so every listener
    /// sees transitions in the order they happened.
    dispatch: Mutex<()>,
}

/// Observes connectivity and notifies subscribers of status transitions.
///
/// The monitor starts out `OFFLINE` unless told otherwise, so the first
/// successful probe is reported as a transition to `ONLINE`.
pub struct NetworkMonitor {
    probe: Box<dyn ConnectivityProbe>,
    timeout: Duration,
    shared: Arc<Shared>,
}

impl NetworkMonitor {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

    pub fn new(probe: impl ConnectivityProbe + 'static) -> Self {
        NetworkMonitor {
            probe: Box::new(probe),
            timeout: Self::DEFAULT_TIMEOUT,
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    last: NetworkStatus::Offline,
                    listeners: Vec::new(),
                    next_id: 0,
                }),
                dispatch: Mutex::new(()),
            }),
        }
    }

    /// Upper bound on a single probe. A probe that takes longer counts as `OFFLINE`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Apply the probe timeout from `config`.
    pub fn with_config(self, config: &SyncConfig) -> Self {
        self.with_timeout(config.probe_timeout())
    }

    pub fn with_initial_status(self, status: NetworkStatus) -> Self {
        lock(&self.shared.state).last = status;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Probe connectivity now, recording (and announcing) any change.
    pub async fn current(&self) -> NetworkStatus {
        let status = match tokio::time::timeout(self.timeout, self.probe.probe()).await {
            Ok(status) => status,
            Err(_) => {
                debug!(timeout_ms = self.timeout.as_millis() as u64, "connectivity probe timed out");
                NetworkStatus::Offline
            }
        };
        self.report(status);
        status
    }

    /// The status seen by the most recent probe or report.
    pub fn last_known(&self) -> NetworkStatus {
        lock(&self.shared.state).last
    }

    /// Record an observed status. Listeners run only if it differs from the
    /// last one; returns whether it did.
    ///
    /// Listeners are called on the reporting thread and must not call
    /// `report` or `current` themselves.
    pub fn report(&self, status: NetworkStatus) -> bool {
        let _dispatch = lock(&self.shared.dispatch);
        let listeners: Vec<Listener> = {
            let mut state = lock(&self.shared.state);
            if state.last == status {
                return false;
            }
            state.last = status;
            state
                .listeners
                .iter()
                .map(|(_, listener)| Arc::clone(listener))
                .collect()
        };

        info!(%status, subscribers = listeners.len(), "network status changed");
        for listener in listeners {
            listener(status);
        }
        true
    }

    /// Register a listener for status transitions. The listener stays
    /// registered until the returned [`Subscription`] is dropped.
    pub fn subscribe(&self, listener: impl Fn(NetworkStatus) + Send + Sync + 'static) -> Subscription {
        let mut state = lock(&self.shared.state);
        let id = state.next_id;
        state.next_id += 1;
        state.listeners.push((id, Arc::new(listener)));
        Subscription {
            id,
            shared: Arc::downgrade(&self.shared),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.shared.state).listeners.len()
    }
}

/// Handle returned by [`NetworkMonitor::subscribe`].
#[must_use = "dropping a Subscription unsubscribes its listener"]
pub struct Subscription {
    id: u64,
    shared: Weak<Shared>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            lock(&shared.state)
                .listeners
                .retain(|(id, _)| *id != self.id);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
