use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use super::DeliveryError;

/// Result of submitting a key to an [`IdempotencyLedger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerOutcome<T> {
    pub result: Result<T, DeliveryError>,
    /// `true` if the effect did not run because the key was seen before.
    pub replayed: bool,
}

/// Records the first final outcome per idempotency key and replays it for
/// every later submission of that key.
///
/// Retryable failures applied nothing and are not recorded, so the next
/// submission runs the effect again. Submissions are serialised, which makes
/// check-and-apply atomic for concurrent duplicates.
pub struct IdempotencyLedger<T> {
    outcomes: Mutex<HashMap<String, Result<T, DeliveryError>>>,
}

impl<T> Default for IdempotencyLedger<T> {
    fn default() -> Self {
        IdempotencyLedger {
            outcomes: Mutex::new(HashMap::new()),
        }
    }
}

impl<T: Clone> IdempotencyLedger<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `effect` unless `key` already has a recorded outcome.
    pub fn apply<F>(&self, key: &str, effect: F) -> LedgerOutcome<T>
    where
        F: FnOnce() -> Result<T, DeliveryError>,
    {
        let mut outcomes = self
            .outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(original) = outcomes.get(key) {
            return LedgerOutcome {
                result: original.clone(),
                replayed: true,
            };
        }

        let result = effect();
        if !matches!(result, Err(DeliveryError::Retryable(_))) {
            outcomes.insert(key.to_string(), result.clone());
        }
        LedgerOutcome {
            result,
            replayed: false,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
