use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, warn};

use crate::application::errors::{ApplyEventError, DocumentError, FetchError};
use crate::application::ports::DatabaseError;

/// API error response
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    /// Device-facing responses carry the status code only.
    bare: bool,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            bare: false,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Drop the JSON body.
    pub fn bare(mut self) -> Self {
        self.bare = true;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.bare {
            return self.status.into_response();
        }

        let body = Json(json!({
            "error": self.message,
        }));

        (self.status, body).into_response()
    }
}

// Storage failures are logged in full and reported without detail.
fn database_error(err: DatabaseError) -> ApiError {
    error!(error = %err, "Database error");
    ApiError::internal_error("Internal storage error")
}

// Convert use case errors to API errors

impl From<FetchError> for ApiError {
    fn from(err: FetchError) -> Self {
        let api_error = match err {
            FetchError::Domain(e) => {
                warn!(error = %e, "Rejected config request");
                ApiError::bad_request(e.to_string())
            }
            FetchError::Database(e) => database_error(e),
            FetchError::Upstream(e) => {
                error!(error = %e, status = ?e.status_code(), "Upstream mutator failed");
                ApiError::internal_error("Upstream error")
            }
        };
        api_error.bare()
    }
}

impl From<ApplyEventError> for ApiError {
    fn from(err: ApplyEventError) -> Self {
        match err {
            ApplyEventError::Domain(e) => ApiError::bad_request(e.to_string()),
            ApplyEventError::NotFound(what) => ApiError::not_found(format!("{} not found", what)),
            ApplyEventError::Database(e) => database_error(e),
        }
    }
}

impl From<DocumentError> for ApiError {
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::Domain(e) => ApiError::bad_request(e.to_string()),
            DocumentError::NotFound(what) => ApiError::not_found(format!("{} not found", what)),
            DocumentError::Database(e) => database_error(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::UpstreamError;
    use crate::domain::errors::DomainError;

    #[test]
    fn test_fetch_errors_are_bare() {
        let err: ApiError = FetchError::from(UpstreamError::status(502, "bad gateway")).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.bare);

        let err: ApiError =
            FetchError::from(DomainError::InvalidCapabilityToken("abc".into())).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_document_error_mapping() {
        let err: ApiError = DocumentError::NotFound("sub-document lan".into()).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.message(), "sub-document lan not found");

        let err: ApiError = DocumentError::from(DomainError::InvalidPayload("empty".into())).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err: ApiError = DocumentError::from(DatabaseError::Internal("pool".into())).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.message().contains("pool"));
    }

    #[test]
    fn test_event_error_mapping() {
        let err: ApiError =
            ApplyEventError::from(DomainError::MalformedEvent("no shape".into())).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err: ApiError = ApplyEventError::NotFound("sub-document wan".into()).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_bare_response_has_no_body() {
        let response = ApiError::not_found("device").bare().into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().get("content-type").is_none());
    }
}
