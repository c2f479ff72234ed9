use std::sync::Arc;

use tracing::info;

use super::post_sub_document::refresh_root_version;
use crate::application::dto::{DocumentStatusDto, RootDocumentDto};
use crate::application::errors::DocumentError;
use crate::application::ports::DatabaseClient;
use crate::domain::entities::SubDocument;
use crate::domain::value_objects::{DeviceId, SubDocumentName};

/// Use case: read and remove stored documents outside the device protocol.
pub struct DocumentsUseCase {
    db: Arc<dyn DatabaseClient>,
}

impl DocumentsUseCase {
    pub fn new(db: Arc<dyn DatabaseClient>) -> Self {
        Self { db }
    }

    pub async fn get_sub_document(
        &self,
        device_id: &DeviceId,
        name: &str,
    ) -> Result<SubDocument, DocumentError> {
        let name = SubDocumentName::new(name)?;
        let sub_document = self
            .db
            .get_sub_document(device_id, name.as_str())
            .await
            .map_err(|e| DocumentError::from_lookup(e, format!("sub-document {}", name)))?;

        if sub_document.payload.is_none() {
            return Err(DocumentError::NotFound(format!("sub-document {}", name)));
        }
        Ok(sub_document)
    }

    /// Delete one sub-document and refresh the root version.
    pub async fn delete_sub_document(
        &self,
        device_id: &DeviceId,
        name: &str,
    ) -> Result<String, DocumentError> {
        let name = SubDocumentName::new(name)?;
        self.db
            .delete_sub_document(device_id, name.as_str())
            .await
            .map_err(|e| DocumentError::from_lookup(e, format!("sub-document {}", name)))?;

        let root_version = refresh_root_version(self.db.as_ref(), device_id).await?;
        info!(
            device_id = %device_id,
            namespace = %name,
            root_version = %root_version,
            "Sub-document deleted"
        );
        Ok(root_version)
    }

    pub async fn get_document_status(
        &self,
        device_id: &DeviceId,
    ) -> Result<DocumentStatusDto, DocumentError> {
        let document = self
            .db
            .get_document(device_id)
            .await
            .map_err(|e| DocumentError::from_lookup(e, format!("device {}", device_id)))?;
        Ok(DocumentStatusDto::new(device_id, &document))
    }

    pub async fn delete_document(&self, device_id: &DeviceId) -> Result<(), DocumentError> {
        self.db
            .delete_document(device_id)
            .await
            .map_err(|e| DocumentError::from_lookup(e, format!("device {}", device_id)))?;
        info!(device_id = %device_id, "Document deleted");
        Ok(())
    }

    pub async fn get_root_document(
        &self,
        device_id: &DeviceId,
    ) -> Result<RootDocumentDto, DocumentError> {
        let root = self
            .db
            .get_root_document(device_id)
            .await
            .map_err(|e| DocumentError::from_lookup(e, format!("root document {}", device_id)))?;
        Ok(RootDocumentDto::from(&root))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{DatabaseError, MockDatabaseClient};
    use crate::domain::entities::{Document, RootDocument};
    use crate::domain::value_objects::DeploymentState;

    fn device() -> DeviceId {
        DeviceId::parse("5c7d7d76cd04").unwrap()
    }

    #[tokio::test]
    async fn test_get_sub_document() {
        let mut db = MockDatabaseClient::new();
        db.expect_get_sub_document()
            .withf(|_, name| name == "lan")
            .returning(|_, _| Ok(SubDocument::new(&b"payload"[..], "7")));

        let sub = DocumentsUseCase::new(Arc::new(db))
            .get_sub_document(&device(), "lan")
            .await
            .unwrap();
        assert_eq!(sub.version(), Some("7"));
    }

    #[tokio::test]
    async fn test_get_sub_document_without_payload_is_not_found() {
        let mut db = MockDatabaseClient::new();
        db.expect_get_sub_document().returning(|_, _| {
            Ok(SubDocument::state_update(DeploymentState::Deployed, 1))
        });

        let err = DocumentsUseCase::new(Arc::new(db))
            .get_sub_document(&device(), "lan")
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_invalid_name_is_rejected() {
        let db = MockDatabaseClient::new();
        let err = DocumentsUseCase::new(Arc::new(db))
            .get_sub_document(&device(), "../etc")
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentError::Domain(_)));
    }

    #[tokio::test]
    async fn test_delete_sub_document_refreshes_root() {
        let mut remaining = Document::new();
        remaining.insert("wan", SubDocument::new(&b"w"[..], "2"));
        let expected = remaining.compute_root_version();

        let mut db = MockDatabaseClient::new();
        db.expect_delete_sub_document()
            .withf(|_, name| name == "lan")
            .times(1)
            .returning(|_, _| Ok(()));
        db.expect_get_document()
            .returning(move |_| Ok(remaining.clone()));
        let check = expected.clone();
        db.expect_set_root_document_version()
            .withf(move |_, version| version == check)
            .times(1)
            .returning(|_, _| Ok(()));

        let root_version = DocumentsUseCase::new(Arc::new(db))
            .delete_sub_document(&device(), "lan")
            .await
            .unwrap();
        assert_eq!(root_version, expected);
    }

    #[tokio::test]
    async fn test_delete_last_sub_document_resets_root_to_zero() {
        let mut db = MockDatabaseClient::new();
        db.expect_delete_sub_document().returning(|_, _| Ok(()));
        db.expect_get_document()
            .returning(|_| Err(DatabaseError::NotFound("device".into())));
        db.expect_set_root_document_version()
            .withf(|_, version| version == "0")
            .times(1)
            .returning(|_, _| Ok(()));

        let root_version = DocumentsUseCase::new(Arc::new(db))
            .delete_sub_document(&device(), "lan")
            .await
            .unwrap();
        assert_eq!(root_version, "0");
    }

    #[tokio::test]
    async fn test_document_status_of_unknown_device() {
        let mut db = MockDatabaseClient::new();
        db.expect_get_document()
            .returning(|_| Err(DatabaseError::NotFound("device".into())));

        let err = DocumentsUseCase::new(Arc::new(db))
            .get_document_status(&device())
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_document_status_lists_sub_documents() {
        let mut doc = Document::new();
        doc.insert(
            "lan",
            SubDocument::posted(&b"abc"[..], "1", 5).with_state(DeploymentState::InDeployment),
        );
        let doc = doc.with_root(RootDocument::new(3, "fw", "", "", "").with_version("99"));

        let mut db = MockDatabaseClient::new();
        db.expect_get_document().returning(move |_| Ok(doc.clone()));

        let status = DocumentsUseCase::new(Arc::new(db))
            .get_document_status(&device())
            .await
            .unwrap();

        assert_eq!(status.device_id, "5C7D7D76CD04");
        assert_eq!(status.root.as_ref().map(|r| r.version.as_str()), Some("99"));
        assert_eq!(status.sub_documents.len(), 1);
        assert_eq!(status.sub_documents[0].state, Some(DeploymentState::InDeployment));
        assert_eq!(status.sub_documents[0].payload_size, 3);
    }

    #[tokio::test]
    async fn test_storage_failure_is_not_a_not_found() {
        let mut db = MockDatabaseClient::new();
        db.expect_get_root_document()
            .returning(|_| Err(DatabaseError::Internal("boom".into())));

        let err = DocumentsUseCase::new(Arc::new(db))
            .get_root_document(&device())
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentError::Database(_)));
    }
}
