use std::sync::Arc;

use bytes::Bytes;
use tracing::info;

use crate::application::dto::RefDocumentResponse;
use crate::application::errors::DocumentError;
use crate::application::ports::DatabaseClient;
use crate::domain::entities::RefSubDocument;
use crate::domain::errors::DomainError;
use crate::domain::value_objects::SubDocumentName;

/// Use case: shared payloads addressed by reference id instead of device.
pub struct ReferenceDocumentsUseCase {
    db: Arc<dyn DatabaseClient>,
}

impl ReferenceDocumentsUseCase {
    pub fn new(db: Arc<dyn DatabaseClient>) -> Self {
        Self { db }
    }

    pub async fn get(&self, ref_id: &str) -> Result<RefSubDocument, DocumentError> {
        let ref_id = SubDocumentName::new(ref_id)?;
        self.db
            .get_ref_sub_document(ref_id.as_str())
            .await
            .map_err(|e| DocumentError::from_lookup(e, format!("reference {}", ref_id)))
    }

    pub async fn put(
        &self,
        ref_id: &str,
        payload: Bytes,
        version: Option<String>,
    ) -> Result<RefDocumentResponse, DocumentError> {
        let ref_id = SubDocumentName::new(ref_id)?;
        if payload.is_empty() {
            return Err(DomainError::InvalidPayload("empty payload".to_string()).into());
        }

        let document = RefSubDocument::new(payload, version);
        self.db
            .set_ref_sub_document(ref_id.as_str(), &document)
            .await?;

        info!(ref_id = %ref_id, version = document.version(), "Reference document stored");
        Ok(RefDocumentResponse {
            ref_id: ref_id.to_string(),
            version: document.version().to_string(),
        })
    }

    pub async fn delete(&self, ref_id: &str) -> Result<(), DocumentError> {
        let ref_id = SubDocumentName::new(ref_id)?;
        self.db
            .delete_ref_sub_document(ref_id.as_str())
            .await
            .map_err(|e| DocumentError::from_lookup(e, format!("reference {}", ref_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{DatabaseError, MockDatabaseClient};
    use crate::domain::root_version::payload_version;

    #[tokio::test]
    async fn test_put_derives_version_from_payload() {
        let mut db = MockDatabaseClient::new();
        db.expect_set_ref_sub_document()
            .withf(|ref_id, doc| ref_id == "shared-wifi" && doc.version() == payload_version(b"abc"))
            .times(1)
            .returning(|_, _| Ok(()));

        let response = ReferenceDocumentsUseCase::new(Arc::new(db))
            .put("shared-wifi", Bytes::from_static(b"abc"), None)
            .await
            .unwrap();
        assert_eq!(response.version, payload_version(b"abc"));
    }

    #[tokio::test]
    async fn test_get_unknown_reference() {
        let mut db = MockDatabaseClient::new();
        db.expect_get_ref_sub_document()
            .returning(|_| Err(DatabaseError::NotFound("ref".into())));

        let err = ReferenceDocumentsUseCase::new(Arc::new(db))
            .get("missing")
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_empty_payload_is_rejected() {
        let db = MockDatabaseClient::new();
        let err = ReferenceDocumentsUseCase::new(Arc::new(db))
            .put("shared", Bytes::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentError::Domain(DomainError::InvalidPayload(_))));
    }
}
