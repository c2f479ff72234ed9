use axum::{
    body::Body,
    extract::{Path, Query, RawQuery, State},
    http::{header, HeaderMap, StatusCode},
    response::Response,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use super::{header_value, parse_device_id};
use crate::api::errors::ApiError;
use crate::application::dto::{ConfigRequest, FetchOutcome};
use crate::application::use_cases::FetchDocumentUseCase;
use crate::domain::codec::multipart_content_type;
use crate::infrastructure::upstream::HEADER_TRANSACTION_ID;

pub const HEADER_SUPPORTED_DOCS: &str = "x-system-supported-docs";
pub const HEADER_FIRMWARE_VERSION: &str = "x-system-firmware-version";
pub const HEADER_MODEL_NAME: &str = "x-system-model-name";
pub const HEADER_PARTNER_ID: &str = "x-system-partner-id";
pub const HEADER_SCHEMA_VERSION: &str = "x-system-schema-version";

#[derive(Debug, Default, Deserialize)]
pub struct ConfigQuery {
    group_id: Option<String>,
}

/// Build the reconciliation input from the device's request.
pub fn config_request(
    mac: &str,
    headers: &HeaderMap,
    group_id: Option<String>,
    raw_query: Option<String>,
) -> Result<ConfigRequest, ApiError> {
    let device_id = parse_device_id(mac).map_err(ApiError::bare)?;

    let mut request = ConfigRequest::new(device_id);
    request.supported_docs = header_value(headers, HEADER_SUPPORTED_DOCS);
    request.firmware_version = header_value(headers, HEADER_FIRMWARE_VERSION).unwrap_or_default();
    request.model_name = header_value(headers, HEADER_MODEL_NAME).unwrap_or_default();
    request.partner_id = header_value(headers, HEADER_PARTNER_ID).unwrap_or_default();
    request.schema_version = header_value(headers, HEADER_SCHEMA_VERSION).unwrap_or_default();
    request.if_none_match = header_value(headers, header::IF_NONE_MATCH.as_str());
    request.user_agent = header_value(headers, header::USER_AGENT.as_str());
    request.transaction_id = header_value(headers, HEADER_TRANSACTION_ID);
    request.group_ids = group_id.filter(|g| !g.trim().is_empty());
    request.query_params = raw_query.filter(|q| !q.is_empty());
    Ok(request)
}

/// GET /api/v1/device/{mac}/config
/// Device config fetch. Errors carry the status code only.
#[utoipa::path(
    get,
    path = "/api/v1/device/{mac}/config",
    tag = "device",
    params(
        ("mac" = String, Path, description = "Device MAC address, 12 hex characters"),
        ("group_id" = Option<String>, Query, description = "Group ids aligned with a positional If-None-Match list")
    ),
    responses(
        (status = 200, description = "multipart/mixed bundle of sub-documents, Etag is the root version"),
        (status = 304, description = "Device is up to date"),
        (status = 400, description = "Malformed MAC or capability header"),
        (status = 404, description = "Nothing stored for this device"),
        (status = 500, description = "Storage or upstream failure")
    )
)]
pub async fn config_handler(
    State(use_case): State<Arc<FetchDocumentUseCase>>,
    Path(mac): Path<String>,
    Query(query): Query<ConfigQuery>,
    RawQuery(raw_query): RawQuery,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let request = config_request(&mac, &headers, query.group_id, raw_query)?;
    let outcome = use_case.execute(&request).await?;

    let response = match outcome {
        FetchOutcome::Content(delivered) => {
            debug!(
                device_id = %request.device_id,
                etag = %delivered.etag,
                subdocs = ?delivered.names,
                "Delivering config"
            );
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, multipart_content_type())
                .header(header::ETAG, delivered.etag)
                .header(header::CONTENT_LENGTH, delivered.body.len().to_string())
                .body(Body::from(delivered.body))
        }
        FetchOutcome::NotModified => Response::builder()
            .status(StatusCode::NOT_MODIFIED)
            .body(Body::empty()),
        FetchOutcome::NotFound => Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Body::empty()),
    };

    response.map_err(|e| {
        ApiError::internal_error(format!("Failed to build response: {}", e)).bare()
    })
}
