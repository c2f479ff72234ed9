use std::collections::BTreeMap;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::application::ports::{DatabaseClient, DatabaseError};
use crate::domain::entities::{Document, RefSubDocument, RootDocument, SubDocument};
use crate::domain::value_objects::{DeploymentState, DeviceId};

#[derive(Debug, Clone, Default)]
struct DeviceEntry {
    root: Option<RootDocument>,
    sub_documents: BTreeMap<String, SubDocument>,
}

impl DeviceEntry {
    fn is_empty(&self) -> bool {
        self.root.is_none() && self.sub_documents.is_empty()
    }
}

/// Process-local document store for development and tests.
///
/// Each device lives behind one map shard lock, which gives the same
/// per-key last-write-wins behavior as the row upserts of the Postgres store.
#[derive(Default)]
pub struct InMemoryDatabaseClient {
    devices: DashMap<DeviceId, DeviceEntry>,
    references: DashMap<String, RefSubDocument>,
}

impl InMemoryDatabaseClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }
}

fn device_not_found(device_id: &DeviceId) -> DatabaseError {
    DatabaseError::NotFound(format!("device {}", device_id))
}

#[async_trait]
impl DatabaseClient for InMemoryDatabaseClient {
    async fn get_document(&self, device_id: &DeviceId) -> Result<Document, DatabaseError> {
        let entry = self
            .devices
            .get(device_id)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| device_not_found(device_id))?;

        let mut document: Document = entry
            .sub_documents
            .iter()
            .map(|(name, sub)| (name.clone(), sub.clone()))
            .collect();
        document.set_root(entry.root.clone());
        Ok(document)
    }

    async fn get_sub_document(
        &self,
        device_id: &DeviceId,
        name: &str,
    ) -> Result<SubDocument, DatabaseError> {
        self.devices
            .get(device_id)
            .and_then(|e| e.sub_documents.get(name).cloned())
            .ok_or_else(|| {
                DatabaseError::NotFound(format!("sub-document {} of {}", name, device_id))
            })
    }

    async fn set_sub_document(
        &self,
        device_id: &DeviceId,
        name: &str,
        sub_document: &SubDocument,
        _prev_state: Option<DeploymentState>,
    ) -> Result<(), DatabaseError> {
        let mut entry = self.devices.entry(device_id.clone()).or_default();
        entry
            .sub_documents
            .entry(name.to_string())
            .or_default()
            .apply(sub_document);
        Ok(())
    }

    async fn delete_sub_document(
        &self,
        device_id: &DeviceId,
        name: &str,
    ) -> Result<(), DatabaseError> {
        self.devices
            .get_mut(device_id)
            .and_then(|mut e| e.sub_documents.remove(name))
            .map(|_| ())
            .ok_or_else(|| {
                DatabaseError::NotFound(format!("sub-document {} of {}", name, device_id))
            })
    }

    async fn delete_document(&self, device_id: &DeviceId) -> Result<(), DatabaseError> {
        self.devices
            .remove(device_id)
            .filter(|(_, e)| !e.is_empty())
            .map(|_| ())
            .ok_or_else(|| device_not_found(device_id))
    }

    async fn get_root_document(&self, device_id: &DeviceId) -> Result<RootDocument, DatabaseError> {
        self.devices
            .get(device_id)
            .and_then(|e| e.root.clone())
            .ok_or_else(|| DatabaseError::NotFound(format!("root document {}", device_id)))
    }

    async fn set_root_document(
        &self,
        device_id: &DeviceId,
        root: &RootDocument,
    ) -> Result<(), DatabaseError> {
        self.devices.entry(device_id.clone()).or_default().root = Some(root.clone());
        Ok(())
    }

    async fn set_root_document_version(
        &self,
        device_id: &DeviceId,
        version: &str,
    ) -> Result<(), DatabaseError> {
        let mut entry = self.devices.entry(device_id.clone()).or_default();
        entry.root.get_or_insert_with(RootDocument::default).version = version.to_string();
        Ok(())
    }

    async fn set_root_document_bitmap(
        &self,
        device_id: &DeviceId,
        bitmap: i64,
    ) -> Result<(), DatabaseError> {
        let mut entry = self.devices.entry(device_id.clone()).or_default();
        entry.root.get_or_insert_with(RootDocument::default).bitmap = bitmap;
        Ok(())
    }

    async fn get_ref_sub_document(&self, ref_id: &str) -> Result<RefSubDocument, DatabaseError> {
        self.references
            .get(ref_id)
            .map(|r| r.value().clone())
            .ok_or_else(|| DatabaseError::NotFound(format!("reference {}", ref_id)))
    }

    async fn set_ref_sub_document(
        &self,
        ref_id: &str,
        document: &RefSubDocument,
    ) -> Result<(), DatabaseError> {
        self.references.insert(ref_id.to_string(), document.clone());
        Ok(())
    }

    async fn delete_ref_sub_document(&self, ref_id: &str) -> Result<(), DatabaseError> {
        self.references
            .remove(ref_id)
            .map(|_| ())
            .ok_or_else(|| DatabaseError::NotFound(format!("reference {}", ref_id)))
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> DeviceId {
        DeviceId::parse("5c7d7d76cd04").unwrap()
    }

    #[tokio::test]
    async fn test_unknown_device_is_not_found() {
        let db = InMemoryDatabaseClient::new();
        let err = db.get_document(&device()).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(db.delete_document(&device()).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_partial_write_keeps_payload() {
        let db = InMemoryDatabaseClient::new();
        let id = device();
        db.set_sub_document(&id, "lan", &SubDocument::posted(&b"abc"[..], "1", 1), None)
            .await
            .unwrap();
        db.set_sub_document(
            &id,
            "lan",
            &SubDocument::state_update(DeploymentState::InDeployment, 2),
            Some(DeploymentState::PendingDownload),
        )
        .await
        .unwrap();

        let sub = db.get_sub_document(&id, "lan").await.unwrap();
        assert_eq!(sub.payload().map(|p| p.as_ref()), Some(&b"abc"[..]));
        assert_eq!(sub.state, Some(DeploymentState::InDeployment));
        assert_eq!(sub.updated_time, Some(2));
    }

    #[tokio::test]
    async fn test_root_version_without_metadata() {
        let db = InMemoryDatabaseClient::new();
        let id = device();
        db.set_root_document_version(&id, "123").await.unwrap();
        db.set_root_document_bitmap(&id, 7).await.unwrap();

        let root = db.get_root_document(&id).await.unwrap();
        assert_eq!(root.version, "123");
        assert_eq!(root.bitmap, 7);

        let doc = db.get_document(&id).await.unwrap();
        assert!(doc.is_empty());
        assert_eq!(doc.root_version(), "123");
    }

    #[tokio::test]
    async fn test_delete_document_removes_everything() {
        let db = InMemoryDatabaseClient::new();
        let id = device();
        db.set_sub_document(&id, "lan", &SubDocument::new(&b"a"[..], "1"), None)
            .await
            .unwrap();
        db.set_root_document(&id, &RootDocument::default().with_version("9"))
            .await
            .unwrap();

        db.delete_document(&id).await.unwrap();
        assert!(db.get_document(&id).await.unwrap_err().is_not_found());
        assert_eq!(db.device_count(), 0);
    }

    #[tokio::test]
    async fn test_reference_documents() {
        let db = InMemoryDatabaseClient::new();
        db.set_ref_sub_document("shared", &RefSubDocument::new(&b"x"[..], Some("1".into())))
            .await
            .unwrap();
        assert_eq!(db.get_ref_sub_document("shared").await.unwrap().version(), "1");
        db.delete_ref_sub_document("shared").await.unwrap();
        assert!(db.get_ref_sub_document("shared").await.unwrap_err().is_not_found());
    }
}
