//! Connectivity observation.
//!
//! A [`ConnectivityProbe`] answers "are we online right now?"; the
//! [`NetworkMonitor`] bounds each probe with a timeout, remembers the last
//! answer, and notifies subscribers only when the answer changes.

mod monitor;
mod probe;
mod status;

#[cfg(feature = "http")]
mod http;

#[cfg(feature = "http")]
pub use http::HttpProbe;
pub use monitor::{NetworkMonitor, Subscription};
pub use probe::{ConnectivityProbe, ManualProbe};
pub use status::NetworkStatus;
