use async_trait::async_trait;
#[cfg(test)]
use mockall::{automock, predicate::*};
use thiserror::Error;

use crate::domain::entities::{Document, RefSubDocument, RootDocument, SubDocument};
use crate::domain::value_objects::{DeploymentState, DeviceId};

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DatabaseError {
    /// "No such device / sub-document" as opposed to a storage failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DatabaseError::NotFound(_))
            || matches!(self, DatabaseError::Database(sqlx::Error::RowNotFound))
    }
}

/// Port for document persistence.
///
/// Sub-document writes are partial: fields left `None` keep their stored value.
/// Implementations bound their own query concurrency; callers may issue many
/// requests at once.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Whole document of a device, root metadata included. `NotFound` when the device is unknown.
    async fn get_document(&self, device_id: &DeviceId) -> Result<Document, DatabaseError>;

    async fn get_sub_document(
        &self,
        device_id: &DeviceId,
        name: &str,
    ) -> Result<SubDocument, DatabaseError>;

    /// Upsert a sub-document. `prev_state` is the state the caller observed
    /// before the write and is only used for deployment bookkeeping.
    async fn set_sub_document(
        &self,
        device_id: &DeviceId,
        name: &str,
        sub_document: &SubDocument,
        prev_state: Option<DeploymentState>,
    ) -> Result<(), DatabaseError>;

    async fn delete_sub_document(&self, device_id: &DeviceId, name: &str)
        -> Result<(), DatabaseError>;

    /// Remove every sub-document and the root document of a device.
    async fn delete_document(&self, device_id: &DeviceId) -> Result<(), DatabaseError>;

    async fn get_root_document(&self, device_id: &DeviceId) -> Result<RootDocument, DatabaseError>;

    async fn set_root_document(
        &self,
        device_id: &DeviceId,
        root: &RootDocument,
    ) -> Result<(), DatabaseError>;

    async fn set_root_document_version(
        &self,
        device_id: &DeviceId,
        version: &str,
    ) -> Result<(), DatabaseError>;

    async fn set_root_document_bitmap(
        &self,
        device_id: &DeviceId,
        bitmap: i64,
    ) -> Result<(), DatabaseError>;

    async fn get_ref_sub_document(&self, ref_id: &str) -> Result<RefSubDocument, DatabaseError>;

    async fn set_ref_sub_document(
        &self,
        ref_id: &str,
        document: &RefSubDocument,
    ) -> Result<(), DatabaseError>;

    async fn delete_ref_sub_document(&self, ref_id: &str) -> Result<(), DatabaseError>;

    /// Cheap reachability probe for readiness checks.
    async fn ping(&self) -> Result<(), DatabaseError>;
}
