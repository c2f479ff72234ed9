use axum::{body::Bytes, extract::State, response::Json};
use std::sync::Arc;
use tracing::warn;

use crate::api::errors::ApiError;
use crate::application::dto::EventAckDto;
use crate::application::use_cases::ApplyEventUseCase;
use crate::domain::events::EventMessage;

/// POST /api/v1/events
/// Ingest a device report (rootdoc, config-version or subdoc report)
#[utoipa::path(
    post,
    path = "/api/v1/events",
    tag = "events",
    request_body(content = Vec<u8>, content_type = "application/json", description = "Device report"),
    responses(
        (status = 200, description = "Report applied", body = EventAckDto),
        (status = 400, description = "Malformed report"),
        (status = 404, description = "Report names an unknown sub-document"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn event_handler(
    State(use_case): State<Arc<ApplyEventUseCase>>,
    body: Bytes,
) -> Result<Json<EventAckDto>, ApiError> {
    // Parsed by hand so bad JSON is a 400 like any other malformed report.
    let message: EventMessage = serde_json::from_slice(&body).map_err(|e| {
        warn!(error = %e, "Unparseable event body");
        ApiError::bad_request(format!("Malformed event: {}", e))
    })?;

    let applied = use_case.execute(&message).await?;
    Ok(Json(EventAckDto {
        device_id: applied.device_id,
        event: applied.event.to_string(),
        updated: applied.updated,
    }))
}
