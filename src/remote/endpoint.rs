use async_trait::async_trait;

use crate::codec::DeliveryRequest;

/// Why a delivery did not apply.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// Transient fault; nothing was applied and the same request may be sent again.
    #[error("retryable delivery failure: {0}")]
    Retryable(String),
    /// Validation or business-rule refusal; resending will not help.
    #[error("delivery rejected: {0}")]
    NonRetryable(String),
}

impl DeliveryError {
    pub fn retryable(reason: impl Into<String>) -> Self {
        DeliveryError::Retryable(reason.into())
    }

    pub fn non_retryable(reason: impl Into<String>) -> Self {
        DeliveryError::NonRetryable(reason.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, DeliveryError::Retryable(_))
    }

    pub fn reason(&self) -> &str {
        match self {
            DeliveryError::Retryable(reason) | DeliveryError::NonRetryable(reason) => reason,
        }
    }
}

/// The system of record that finally applies commands.
///
/// `Ok(())` means the command's effect is durably applied exactly once,
/// however many times its idempotency key has been submitted.
#[async_trait]
pub trait RemoteEndpoint: Send + Sync {
    async fn deliver(&self, request: &DeliveryRequest) -> Result<(), DeliveryError>;
}

#[async_trait]
impl<E: RemoteEndpoint + ?Sized> RemoteEndpoint for std::sync::Arc<E> {
    async fn deliver(&self, request: &DeliveryRequest) -> Result<(), DeliveryError> {
        (**self).deliver(request).await
    }
}
