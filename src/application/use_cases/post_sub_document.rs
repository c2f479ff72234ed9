use std::sync::Arc;

use bytes::Bytes;
use tracing::info;

use super::now_ms;
use crate::application::dto::{PostSubDocumentRequest, PostSubDocumentResponse};
use crate::application::errors::DocumentError;
use crate::application::ports::DatabaseClient;
use crate::domain::codec::MSGPACK_CONTENT_TYPE;
use crate::domain::entities::SubDocument;
use crate::domain::errors::DomainError;
use crate::domain::root_version::payload_version;
use crate::domain::value_objects::{DeviceId, SubDocumentName};

/// Use case: store new content for one sub-document of a device.
///
/// The sub-document re-enters `PendingDownload` and the device's root version
/// is recomputed so the next fetch misses the fast path.
pub struct PostSubDocumentUseCase {
    db: Arc<dyn DatabaseClient>,
}

impl PostSubDocumentUseCase {
    pub fn new(db: Arc<dyn DatabaseClient>) -> Self {
        Self { db }
    }

    pub async fn execute(
        &self,
        request: PostSubDocumentRequest,
    ) -> Result<PostSubDocumentResponse, DocumentError> {
        let name = SubDocumentName::new(&request.name)?;
        validate_content_type(request.content_type.as_deref())?;
        validate_payload(&request.payload)?;

        let version = request
            .version
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| payload_version(&request.payload));

        let prev_state = match self.db.get_sub_document(&request.device_id, name.as_str()).await {
            Ok(existing) => existing.state,
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e.into()),
        };

        let sub_document = SubDocument::posted(request.payload, version.as_str(), now_ms())
            .with_expiry(request.expiry);
        self.db
            .set_sub_document(&request.device_id, name.as_str(), &sub_document, prev_state)
            .await?;

        let root_version = refresh_root_version(self.db.as_ref(), &request.device_id).await?;

        info!(
            device_id = %request.device_id,
            namespace = %name,
            version = %version,
            root_version = %root_version,
            "Sub-document stored"
        );

        Ok(PostSubDocumentResponse {
            device_id: request.device_id.to_string(),
            name: name.to_string(),
            version,
            root_version,
        })
    }
}

/// Recompute and persist the root version after a content change.
pub(crate) async fn refresh_root_version(
    db: &dyn DatabaseClient,
    device_id: &DeviceId,
) -> Result<String, DocumentError> {
    let document = match db.get_document(device_id).await {
        Ok(document) => document,
        Err(e) if e.is_not_found() => Default::default(),
        Err(e) => return Err(e.into()),
    };
    let root_version = document.compute_root_version();
    db.set_root_document_version(device_id, &root_version)
        .await?;
    Ok(root_version)
}

fn validate_content_type(content_type: Option<&str>) -> Result<(), DomainError> {
    let media_type = content_type
        .and_then(|ct| ct.split(';').next())
        .map(str::trim)
        .unwrap_or_default();

    if media_type.eq_ignore_ascii_case(MSGPACK_CONTENT_TYPE) {
        Ok(())
    } else {
        Err(DomainError::InvalidPayload(format!(
            "content type must be {}, got {:?}",
            MSGPACK_CONTENT_TYPE, media_type
        )))
    }
}

fn validate_payload(payload: &Bytes) -> Result<(), DomainError> {
    if payload.is_empty() {
        return Err(DomainError::InvalidPayload("empty payload".to_string()));
    }
    rmp_serde::from_slice::<serde::de::IgnoredAny>(payload)
        .map(|_| ())
        .map_err(|e| DomainError::InvalidPayload(format!("not msgpack: {}", e)))
}
