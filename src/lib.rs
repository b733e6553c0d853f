//! Local-first command outbox.
//!
//! Business actions are enqueued into a durable per-workspace queue that
//! works fully offline. A [`SyncEngine`] later drains each queue against a
//! [`RemoteEndpoint`], oldest first, under a per-workspace [`SyncLock`],
//! backing off on transient failures. Every command carries an idempotency
//! key that stays fixed across attempts, so replays after a crash apply once.

mod codec;
mod command;
mod config;
mod engine;
mod error;
mod lock;
mod network;
mod outbox;
mod remote;
mod runner;
mod store;

pub use codec::{
    decode, encode, format_timestamp, parse_timestamp, to_request, CorruptRecord,
    DeliveryRequest, StoredCommand,
};
pub use command::{
    CommandId, CommandPayload, CommandStatus, IdempotencyKey, OutboxCommand, Transition,
    WorkspaceId,
};
pub use config::SyncConfig;
pub use engine::{
    BackoffPolicy, Clock, DrainOutcome, DrainResult, ManualClock, SyncEngine, SyncObserver,
    SystemClock, TracingObserver,
};
pub use error::SyncError;
pub use lock::{InMemorySyncLock, LockError, SyncLock, SyncLockGuard};
#[cfg(feature = "http")]
pub use network::HttpProbe;
pub use network::{ConnectivityProbe, ManualProbe, NetworkMonitor, NetworkStatus, Subscription};
pub use outbox::Outbox;
#[cfg(feature = "http")]
pub use remote::{HttpEndpoint, IDEMPOTENCY_KEY_HEADER};
pub use remote::{DeliveryError, IdempotencyLedger, LedgerOutcome, RemoteEndpoint};
pub use runner::{RunnerStats, SyncRunner, SyncTrigger};
pub use store::{
    BlockedHead, CommandStore, FileCommandStore, InMemoryCommandStore, PendingBatch, StoreError,
};
