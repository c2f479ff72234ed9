//! Error types returned by the use cases.

use thiserror::Error;

use crate::application::ports::{DatabaseError, UpstreamError};
use crate::domain::errors::DomainError;

/// Errors of the config fetch (reconciliation) path.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid request: {0}")]
    Domain(#[from] DomainError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),
}

/// Errors of device report ingestion.
#[derive(Debug, Error)]
pub enum ApplyEventError {
    #[error("Invalid event: {0}")]
    Domain(#[from] DomainError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Errors of sub-document, document and reference management.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Invalid request: {0}")]
    Domain(#[from] DomainError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl DocumentError {
    /// Storage "not found" becomes `NotFound`; anything else stays a database error.
    pub fn from_lookup(err: DatabaseError, what: impl Into<String>) -> Self {
        if err.is_not_found() {
            DocumentError::NotFound(what.into())
        } else {
            DocumentError::Database(err)
        }
    }
}
