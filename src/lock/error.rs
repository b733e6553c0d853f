/// Error type for sync lock operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LockError {
    /// The underlying lock primitive was poisoned (e.g. a thread panicked while holding it).
    #[error("sync lock poisoned: {0}")]
    Poisoned(String),
    /// A shared lock backend (database row, cache key, ...) could not be reached.
    #[error("sync lock backend error: {0}")]
    Backend(String),
}
