use crate::lock::LockError;
use crate::store::StoreError;

/// Faults that abort a drain pass or a recovery run.
///
/// Delivery failures are not errors at this level; they are settled into the
/// store and reported in the [`DrainResult`](crate::DrainResult).
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Lock(#[from] LockError),
}
