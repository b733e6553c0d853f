//! The outward boundary: where commands are finally applied.
//!
//! A remote endpoint must apply each idempotency key at most once and answer
//! repeats with the original outcome. [`IdempotencyLedger`] implements that
//! bookkeeping for endpoint authors.

mod endpoint;
mod ledger;

#[cfg(feature = "http")]
mod http;

pub use endpoint::{DeliveryError, RemoteEndpoint};
#[cfg(feature = "http")]
pub use http::{HttpEndpoint, IDEMPOTENCY_KEY_HEADER};
pub use ledger::{IdempotencyLedger, LedgerOutcome};
