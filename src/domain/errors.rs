use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("Invalid device id: {0}")]
    InvalidDeviceId(String),

    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    #[error("Invalid capability token: {0}")]
    InvalidCapabilityToken(String),

    #[error("Malformed multipart body: {0}")]
    MalformedMultipart(String),

    #[error("Invalid sub-document name: {0}")]
    InvalidSubDocumentName(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Invalid deployment state: {0}")]
    InvalidDeploymentState(String),
}

impl DomainError {
    /// Parse errors come from malformed wire input rather than bad field values.
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            DomainError::InvalidCapabilityToken(_) | DomainError::MalformedMultipart(_)
        )
    }
}
