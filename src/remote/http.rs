//! HTTP delivery. Requires the `http` feature.
//!
//! Each command is `POST`ed to `{base_url}/{type}` with the [`DeliveryRequest`]
//! as JSON body and the idempotency key repeated in the `Idempotency-Key`
//! header.
//!
//! | Response                      | Outcome       |
//! |-------------------------------|---------------|
//! | 2xx                           | applied       |
//! | 408, 425, 429, 5xx            | retryable     |
//! | any other status              | non-retryable |
//! | connect/timeout/body failure  | retryable     |

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

use super::{DeliveryError, RemoteEndpoint};
use crate::codec::DeliveryRequest;

pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

#[derive(Clone, Debug)]
pub struct HttpEndpoint {
    client: reqwest::Client,
    base_url: String,
}

impl HttpEndpoint {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        HttpEndpoint {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url_for(&self, request: &DeliveryRequest) -> String {
        format!("{}/{}", self.base_url, request.command_type)
    }
}

fn classify(status: StatusCode, body: String) -> Result<(), DeliveryError> {
    if status.is_success() {
        return Ok(());
    }
    let reason = if body.is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, body)
    };
    match status {
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_EARLY | StatusCode::TOO_MANY_REQUESTS => {
            Err(DeliveryError::Retryable(reason))
        }
        s if s.is_server_error() => Err(DeliveryError::Retryable(reason)),
        _ => Err(DeliveryError::NonRetryable(reason)),
    }
}

#[async_trait]
impl RemoteEndpoint for HttpEndpoint {
    async fn deliver(&self, request: &DeliveryRequest) -> Result<(), DeliveryError> {
        let url = self.url_for(request);
        let response = self
            .client
            .post(&url)
            .header(IDEMPOTENCY_KEY_HEADER, &request.idempotency_key)
            .json(request)
            .send()
            .await
            .map_err(|e| DeliveryError::Retryable(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        debug!(%url, status = status.as_u16(), "delivery response");
        classify(status, body)
    }
}
