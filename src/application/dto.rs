use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::codec::{frame_http_response, multipart_content_type};
use crate::domain::entities::{
    Document, RootDocument, SubDocument, VersionMap, ROOT_VERSION_KEY,
};
use crate::domain::value_objects::{DeploymentState, DeviceId};

/// User agent of the read-only fleet diagnostic client.
pub const DIAGNOSTIC_USER_AGENT: &str = "mget";

const FACTORY_RESET: &str = "NONE";
const FACTORY_RESET_REBOOT: &str = "NONE-REBOOT";

/// A device config fetch, as extracted from the HTTP request.
#[derive(Debug, Clone)]
pub struct ConfigRequest {
    pub device_id: DeviceId,
    pub supported_docs: Option<String>,
    pub firmware_version: String,
    pub model_name: String,
    pub partner_id: String,
    pub schema_version: String,
    pub if_none_match: Option<String>,
    pub group_ids: Option<String>,
    pub user_agent: Option<String>,
    pub query_params: Option<String>,
    pub transaction_id: Option<String>,
}

impl ConfigRequest {
    pub fn new(device_id: DeviceId) -> Self {
        Self {
            device_id,
            supported_docs: None,
            firmware_version: String::new(),
            model_name: String::new(),
            partner_id: String::new(),
            schema_version: String::new(),
            if_none_match: None,
            group_ids: None,
            user_agent: None,
            query_params: None,
            transaction_id: None,
        }
    }

    pub fn is_diagnostic(&self) -> bool {
        self.user_agent
            .as_deref()
            .is_some_and(|ua| ua.trim() == DIAGNOSTIC_USER_AGENT)
    }

    pub fn cache_validator(&self) -> CacheValidator {
        CacheValidator::parse(self.if_none_match.as_deref(), self.group_ids.as_deref())
    }

    /// Metadata the device reports about itself in this request.
    pub fn root_document(&self, bitmap: i64, root_token: Option<&str>) -> RootDocument {
        RootDocument::new(
            bitmap,
            self.firmware_version.trim(),
            self.model_name.trim(),
            self.partner_id.trim(),
            self.schema_version.trim(),
        )
        .with_version(root_token.unwrap_or_default())
        .with_query_params(self.query_params.clone().unwrap_or_default())
    }
}

/// Parsed `If-None-Match` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheValidator {
    /// `NONE` / `NONE-REBOOT`: the device lost its configuration.
    FactoryReset { reboot: bool },
    /// What the device already has, `root` included when sent.
    Versions(VersionMap),
}

impl CacheValidator {
    /// With `group_ids` the header is a positional list aligned with them;
    /// otherwise entries are `name=version`, and a single bare token is the
    /// root version.
    pub fn parse(if_none_match: Option<&str>, group_ids: Option<&str>) -> Self {
        let raw = if_none_match.map(str::trim).unwrap_or_default();
        match raw {
            FACTORY_RESET => return CacheValidator::FactoryReset { reboot: false },
            FACTORY_RESET_REBOOT => return CacheValidator::FactoryReset { reboot: true },
            "" => return CacheValidator::Versions(VersionMap::new()),
            _ => {}
        }

        let entries: Vec<&str> = raw.split(',').map(clean_token).collect();
        let mut versions = VersionMap::new();

        match group_ids.map(str::trim).filter(|g| !g.is_empty()) {
            Some(groups) => {
                for (name, version) in groups.split(',').map(clean_token).zip(entries) {
                    if !name.is_empty() && !version.is_empty() {
                        versions.insert(name.to_string(), version.to_string());
                    }
                }
            }
            None => {
                if let [single] = entries.as_slice() {
                    if !single.contains('=') {
                        versions.insert(ROOT_VERSION_KEY.to_string(), single.to_string());
                        return CacheValidator::Versions(versions);
                    }
                }
                for entry in entries {
                    if let Some((name, version)) = entry.split_once('=') {
                        let (name, version) = (clean_token(name), clean_token(version));
                        if !name.is_empty() && !version.is_empty() {
                            versions.insert(name.to_string(), version.to_string());
                        }
                    }
                }
            }
        }

        CacheValidator::Versions(versions)
    }

    pub fn root_token(&self) -> Option<&str> {
        match self {
            CacheValidator::Versions(versions) => {
                versions.get(ROOT_VERSION_KEY).map(String::as_str)
            }
            CacheValidator::FactoryReset { .. } => None,
        }
    }
}

fn clean_token(token: &str) -> &str {
    token.trim().trim_matches('"')
}

/// Body and cache validator delivered to a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredDocument {
    pub etag: String,
    pub body: Bytes,
    pub names: Vec<String>,
}

/// Result of a config fetch; the API layer turns it into a status code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Content(DeliveredDocument),
    NotModified,
    NotFound,
}

impl FetchOutcome {
    pub fn status_code(&self) -> u16 {
        match self {
            FetchOutcome::Content(_) => 200,
            FetchOutcome::NotModified => 304,
            FetchOutcome::NotFound => 404,
        }
    }

    /// The outcome as a complete HTTP/1.1 response, for transports that relay
    /// device responses as opaque bytes.
    pub fn to_http_frame(&self, now: DateTime<Utc>) -> Vec<u8> {
        match self {
            FetchOutcome::Content(delivered) => {
                let headers = vec![
                    ("Content-Type".to_string(), multipart_content_type()),
                    ("Etag".to_string(), delivered.etag.clone()),
                ];
                frame_http_response(200, &headers, &delivered.body, now)
            }
            other => frame_http_response(other.status_code(), &[], b"", now),
        }
    }
}

/// Content POSTed for one sub-document.
#[derive(Debug, Clone)]
pub struct PostSubDocumentRequest {
    pub device_id: DeviceId,
    pub name: String,
    pub content_type: Option<String>,
    pub payload: Bytes,
    pub version: Option<String>,
    pub expiry: Option<i64>,
}

/// Result of storing a sub-document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PostSubDocumentResponse {
    pub device_id: String,
    pub name: String,
    pub version: String,
    pub root_version: String,
}

/// Result of storing a reference document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RefDocumentResponse {
    pub ref_id: String,
    pub version: String,
}

/// JSON view of one sub-document (payload omitted).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SubDocumentStatusDto {
    pub name: String,
    pub version: Option<String>,
    pub state: Option<DeploymentState>,
    pub updated_time: Option<i64>,
    pub error_code: Option<i32>,
    pub error_details: Option<String>,
    pub expiry: Option<i64>,
    pub payload_size: usize,
}

impl SubDocumentStatusDto {
    pub fn new(name: &str, sub: &SubDocument) -> Self {
        Self {
            name: name.to_string(),
            version: sub.version.clone(),
            state: sub.state,
            updated_time: sub.updated_time,
            error_code: sub.error_code,
            error_details: sub.error_details.clone(),
            expiry: sub.expiry(),
            payload_size: sub.payload.as_ref().map(Bytes::len).unwrap_or_default(),
        }
    }
}

/// JSON view of root metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RootDocumentDto {
    pub bitmap: i64,
    pub firmware_version: String,
    pub model_name: String,
    pub partner_id: String,
    pub schema_version: String,
    pub version: String,
    pub query_params: String,
}

impl From<&RootDocument> for RootDocumentDto {
    fn from(root: &RootDocument) -> Self {
        Self {
            bitmap: root.bitmap,
            firmware_version: root.firmware_version.clone(),
            model_name: root.model_name.clone(),
            partner_id: root.partner_id.clone(),
            schema_version: root.schema_version.clone(),
            version: root.version.clone(),
            query_params: root.query_params.clone(),
        }
    }
}

/// JSON view of a whole device document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DocumentStatusDto {
    pub device_id: String,
    pub root: Option<RootDocumentDto>,
    pub sub_documents: Vec<SubDocumentStatusDto>,
}

impl DocumentStatusDto {
    pub fn new(device_id: &DeviceId, document: &Document) -> Self {
        Self {
            device_id: device_id.to_string(),
            root: document.root().map(RootDocumentDto::from),
            sub_documents: document
                .iter()
                .map(|(name, sub)| SubDocumentStatusDto::new(name, sub))
                .collect(),
        }
    }
}

/// Acknowledgement returned for an ingested device report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EventAckDto {
    pub device_id: String,
    pub event: String,
    pub updated: Vec<String>,
}
