use async_trait::async_trait;
use tracing::debug;

use super::{ConnectivityProbe, NetworkStatus};

/// Probes connectivity with a `GET` against a health URL.
///
/// Any HTTP response, whatever its status, means the network path works.
#[derive(Clone, Debug)]
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpProbe {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), url)
    }

    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        HttpProbe {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl ConnectivityProbe for HttpProbe {
    async fn probe(&self) -> NetworkStatus {
        match self.client.get(&self.url).send().await {
            Ok(_) => NetworkStatus::Online,
            Err(err) => {
                debug!(url = %self.url, %err, "connectivity probe failed");
                NetworkStatus::Offline
            }
        }
    }
}
