use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{Json, Response},
};
use std::sync::Arc;

use super::{
    header_value, parse_device_id, HEADER_EXPIRY, HEADER_ROOT_VERSION, HEADER_SUBDOCUMENT_STATE,
    HEADER_SUBDOCUMENT_VERSION,
};
use crate::api::errors::ApiError;
use crate::application::dto::{
    DocumentStatusDto, PostSubDocumentRequest, PostSubDocumentResponse, RootDocumentDto,
};
use crate::application::use_cases::{DocumentsUseCase, PostSubDocumentUseCase};
use crate::domain::codec::MSGPACK_CONTENT_TYPE;

fn parse_expiry(headers: &HeaderMap) -> Result<Option<i64>, ApiError> {
    header_value(headers, HEADER_EXPIRY)
        .map(|v| {
            v.parse::<i64>()
                .map_err(|_| ApiError::bad_request(format!("Invalid {} header: {}", HEADER_EXPIRY, v)))
        })
        .transpose()
}

/// POST /api/v1/device/{mac}/document/{subdoc}
/// Store msgpack content for one sub-document
#[utoipa::path(
    post,
    path = "/api/v1/device/{mac}/document/{subdoc}",
    tag = "documents",
    params(
        ("mac" = String, Path, description = "Device MAC address"),
        ("subdoc" = String, Path, description = "Sub-document name"),
        ("X-Subdocument-Version" = Option<String>, Header, description = "Explicit version; defaults to the payload hash"),
        ("X-Expiry" = Option<i64>, Header, description = "Expiry in epoch milliseconds")
    ),
    request_body(content = Vec<u8>, content_type = "application/msgpack", description = "Msgpack payload"),
    responses(
        (status = 200, description = "Sub-document stored", body = PostSubDocumentResponse),
        (status = 400, description = "Bad name, content type or payload"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn post_sub_document_handler(
    State(use_case): State<Arc<PostSubDocumentUseCase>>,
    Path((mac, subdoc)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<PostSubDocumentResponse>, ApiError> {
    let request = PostSubDocumentRequest {
        device_id: parse_device_id(&mac)?,
        name: subdoc,
        content_type: header_value(&headers, header::CONTENT_TYPE.as_str()),
        payload: body,
        version: header_value(&headers, HEADER_SUBDOCUMENT_VERSION),
        expiry: parse_expiry(&headers)?,
    };

    let response = use_case.execute(request).await?;
    Ok(Json(response))
}

/// GET /api/v1/device/{mac}/document/{subdoc}
/// Raw payload of one sub-document
#[utoipa::path(
    get,
    path = "/api/v1/device/{mac}/document/{subdoc}",
    tag = "documents",
    params(
        ("mac" = String, Path, description = "Device MAC address"),
        ("subdoc" = String, Path, description = "Sub-document name")
    ),
    responses(
        (status = 200, description = "msgpack payload; Etag and X-Subdocument-State headers set"),
        (status = 404, description = "Sub-document not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn get_sub_document_handler(
    State(use_case): State<Arc<DocumentsUseCase>>,
    Path((mac, subdoc)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let device_id = parse_device_id(&mac)?;
    let sub_document = use_case.get_sub_document(&device_id, &subdoc).await?;

    let payload = sub_document.payload().cloned().unwrap_or_default();
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, MSGPACK_CONTENT_TYPE)
        .header(header::CONTENT_LENGTH, payload.len().to_string());
    if let Some(version) = sub_document.version() {
        builder = builder.header(header::ETAG, version);
    }
    if let Some(state) = sub_document.state {
        builder = builder.header(HEADER_SUBDOCUMENT_STATE, state.to_string());
    }

    builder
        .body(Body::from(payload))
        .map_err(|e| ApiError::internal_error(format!("Failed to build response: {}", e)))
}

/// DELETE /api/v1/device/{mac}/document/{subdoc}
#[utoipa::path(
    delete,
    path = "/api/v1/device/{mac}/document/{subdoc}",
    tag = "documents",
    params(
        ("mac" = String, Path, description = "Device MAC address"),
        ("subdoc" = String, Path, description = "Sub-document name")
    ),
    responses(
        (status = 204, description = "Deleted; X-Root-Version carries the new root version"),
        (status = 404, description = "Sub-document not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn delete_sub_document_handler(
    State(use_case): State<Arc<DocumentsUseCase>>,
    Path((mac, subdoc)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let device_id = parse_device_id(&mac)?;
    let root_version = use_case.delete_sub_document(&device_id, &subdoc).await?;

    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header(HEADER_ROOT_VERSION, root_version)
        .body(Body::empty())
        .map_err(|e| ApiError::internal_error(format!("Failed to build response: {}", e)))
}

/// GET /api/v1/device/{mac}/document
/// Status view of every stored sub-document
#[utoipa::path(
    get,
    path = "/api/v1/device/{mac}/document",
    tag = "documents",
    params(("mac" = String, Path, description = "Device MAC address")),
    responses(
        (status = 200, description = "Document status", body = DocumentStatusDto),
        (status = 404, description = "Device not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn get_document_handler(
    State(use_case): State<Arc<DocumentsUseCase>>,
    Path(mac): Path<String>,
) -> Result<Json<DocumentStatusDto>, ApiError> {
    let device_id = parse_device_id(&mac)?;
    Ok(Json(use_case.get_document_status(&device_id).await?))
}

/// DELETE /api/v1/device/{mac}/document
#[utoipa::path(
    delete,
    path = "/api/v1/device/{mac}/document",
    tag = "documents",
    params(("mac" = String, Path, description = "Device MAC address")),
    responses(
        (status = 204, description = "Document deleted"),
        (status = 404, description = "Device not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn delete_document_handler(
    State(use_case): State<Arc<DocumentsUseCase>>,
    Path(mac): Path<String>,
) -> Result<StatusCode, ApiError> {
    let device_id = parse_device_id(&mac)?;
    use_case.delete_document(&device_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/device/{mac}/rootdocument
#[utoipa::path(
    get,
    path = "/api/v1/device/{mac}/rootdocument",
    tag = "documents",
    params(("mac" = String, Path, description = "Device MAC address")),
    responses(
        (status = 200, description = "Root metadata", body = RootDocumentDto),
        (status = 404, description = "No root document"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn get_root_document_handler(
    State(use_case): State<Arc<DocumentsUseCase>>,
    Path(mac): Path<String>,
) -> Result<Json<RootDocumentDto>, ApiError> {
    let device_id = parse_device_id(&mac)?;
    Ok(Json(use_case.get_root_document(&device_id).await?))
}
