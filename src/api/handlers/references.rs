use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{Json, Response},
};
use std::sync::Arc;

use super::{header_value, HEADER_SUBDOCUMENT_VERSION};
use crate::api::errors::ApiError;
use crate::application::dto::RefDocumentResponse;
use crate::application::use_cases::ReferenceDocumentsUseCase;
use crate::domain::codec::MSGPACK_CONTENT_TYPE;

/// POST /api/v1/reference/{ref_id}/document
#[utoipa::path(
    post,
    path = "/api/v1/reference/{ref_id}/document",
    tag = "references",
    params(
        ("ref_id" = String, Path, description = "Reference document id"),
        ("X-Subdocument-Version" = Option<String>, Header, description = "Explicit version; defaults to the payload hash")
    ),
    request_body(content = Vec<u8>, content_type = "application/msgpack", description = "Msgpack payload"),
    responses(
        (status = 200, description = "Reference document stored", body = RefDocumentResponse),
        (status = 400, description = "Bad id or empty payload"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn post_reference_handler(
    State(use_case): State<Arc<ReferenceDocumentsUseCase>>,
    Path(ref_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<RefDocumentResponse>, ApiError> {
    let version = header_value(&headers, HEADER_SUBDOCUMENT_VERSION);
    Ok(Json(use_case.put(&ref_id, body, version).await?))
}

/// GET /api/v1/reference/{ref_id}/document
#[utoipa::path(
    get,
    path = "/api/v1/reference/{ref_id}/document",
    tag = "references",
    params(("ref_id" = String, Path, description = "Reference document id")),
    responses(
        (status = 200, description = "Payload bytes with Etag"),
        (status = 404, description = "Reference document not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn get_reference_handler(
    State(use_case): State<Arc<ReferenceDocumentsUseCase>>,
    Path(ref_id): Path<String>,
) -> Result<Response, ApiError> {
    let document = use_case.get(&ref_id).await?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, MSGPACK_CONTENT_TYPE)
        .header(header::ETAG, document.version())
        .body(Body::from(document.payload().clone()))
        .map_err(|e| ApiError::internal_error(format!("Failed to build response: {}", e)))
}

/// DELETE /api/v1/reference/{ref_id}/document
#[utoipa::path(
    delete,
    path = "/api/v1/reference/{ref_id}/document",
    tag = "references",
    params(("ref_id" = String, Path, description = "Reference document id")),
    responses(
        (status = 204, description = "Reference document deleted"),
        (status = 404, description = "Reference document not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn delete_reference_handler(
    State(use_case): State<Arc<ReferenceDocumentsUseCase>>,
    Path(ref_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    use_case.delete(&ref_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
