//! The sync engine: drains each workspace's queue in order, under its
//! workspace lock, with exponential backoff on retryable failures.

mod backoff;
mod clock;
mod engine;
mod observer;

pub use backoff::BackoffPolicy;
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{DrainOutcome, DrainResult, SyncEngine};
pub use observer::{SyncObserver, TracingObserver};
