use async_trait::async_trait;
#[cfg(test)]
use mockall::{automock, predicate::*};
use thiserror::Error;

use crate::domain::entities::{Document, RootDocument};
use crate::domain::value_objects::DeviceId;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("Upstream transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Upstream returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Upstream response could not be decoded: {0}")]
    Codec(String),
}

impl UpstreamError {
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// Transport failures, 408, 429 and 5xx are retried; other client errors are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            UpstreamError::Transport(_) => true,
            UpstreamError::Status { status, .. } => matches!(*status, 408 | 429 | 500..=599),
            UpstreamError::Codec(_) => false,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            UpstreamError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// What the mutator receives: the device, its old and new metadata, and the
/// document the mutator is asked to reconcile.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub device_id: DeviceId,
    pub transaction_id: String,
    pub old_root: Option<RootDocument>,
    pub new_root: RootDocument,
    pub document: Document,
    pub factory_reset: bool,
}

/// Port for the optional upstream mutator.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait UpstreamMutator: Send + Sync {
    /// `Ok(None)` means the mutator has no content for the device.
    async fn mutate(&self, request: &UpstreamRequest) -> Result<Option<Document>, UpstreamError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(UpstreamError::status(503, "busy").is_retryable());
        assert!(UpstreamError::status(500, "boom").is_retryable());
        assert!(UpstreamError::status(429, "slow down").is_retryable());
        assert!(UpstreamError::status(408, "timeout").is_retryable());
        assert!(!UpstreamError::status(400, "bad").is_retryable());
        assert!(!UpstreamError::status(403, "forbidden").is_retryable());
        assert!(!UpstreamError::status(404, "gone").is_retryable());
        assert!(!UpstreamError::Codec("x".into()).is_retryable());
    }

    #[test]
    fn test_status_code() {
        assert_eq!(UpstreamError::status(502, "x").status_code(), Some(502));
        assert_eq!(UpstreamError::Codec("x".into()).status_code(), None);
    }
}
