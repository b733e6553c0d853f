use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use super::NetworkStatus;

/// One connectivity check. May take as long as it likes; the monitor bounds it.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn probe(&self) -> NetworkStatus;
}

/// A probe whose answer is set from outside, for hosts where the platform
/// pushes connectivity changes instead of being asked.
#[derive(Debug)]
pub struct ManualProbe {
    online: AtomicBool,
}

impl ManualProbe {
    pub fn new(status: NetworkStatus) -> Self {
        ManualProbe {
            online: AtomicBool::new(status.is_online()),
        }
    }

    pub fn set(&self, status: NetworkStatus) {
        self.online.store(status.is_online(), Ordering::SeqCst);
    }
}

#[async_trait]
impl ConnectivityProbe for ManualProbe {
    async fn probe(&self) -> NetworkStatus {
        if self.online.load(Ordering::SeqCst) {
            NetworkStatus::Online
        } else {
            NetworkStatus::Offline
        }
    }
}

#[async_trait]
impl<P: ConnectivityProbe + ?Sized> ConnectivityProbe for std::sync::Arc<P> {
    async fn probe(&self) -> NetworkStatus {
        (**self).probe().await
    }
}
