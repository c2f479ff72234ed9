use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::warn;

/// Size limit error response
#[derive(Serialize)]
struct SizeLimitErrorResponse {
    error: String,
    code: String,
    max_allowed: String,
}

/// Parse Content-Length header value
fn parse_content_length(headers: &axum::http::HeaderMap) -> Option<u64> {
    headers
        .get("content-length")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
}

fn size_limit_error(max_bytes: usize) -> Response {
    let error_response = SizeLimitErrorResponse {
        error: "Request body too large".to_string(),
        code: "SIZE_LIMIT_EXCEEDED".to_string(),
        max_allowed: format!("{} bytes", max_bytes),
    };

    (StatusCode::PAYLOAD_TOO_LARGE, axum::Json(error_response)).into_response()
}

/// Reject requests whose declared Content-Length exceeds the limit before
/// the body is read. Undeclared (chunked) bodies are bounded by the
/// body-limit layer on the router.
pub async fn content_length_guard(
    State(max_bytes): State<usize>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(length) = parse_content_length(request.headers()) {
        if length > max_bytes as u64 {
            warn!(
                uri = %request.uri(),
                content_length = length,
                max_bytes,
                "Rejected oversized request"
            );
            return size_limit_error(max_bytes);
        }
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, middleware::from_fn_with_state, routing::post, Router};
    use tower::ServiceExt;

    fn app(max_bytes: usize) -> Router {
        Router::new()
            .route("/upload", post(|| async { StatusCode::OK }))
            .layer(from_fn_with_state(max_bytes, content_length_guard))
    }

    #[tokio::test]
    async fn test_declared_length_over_limit_is_rejected() {
        let request = Request::builder()
            .method("POST")
            .uri("/upload")
            .header("content-length", "11")
            .body(Body::from("hello world"))
            .unwrap();

        let response = app(10).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_declared_length_within_limit_passes() {
        let request = Request::builder()
            .method("POST")
            .uri("/upload")
            .header("content-length", "5")
            .body(Body::from("hello"))
            .unwrap();

        let response = app(10).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_parse_content_length() {
        let mut headers = axum::http::HeaderMap::new();
        assert_eq!(parse_content_length(&headers), None);
        headers.insert("content-length", "42".parse().unwrap());
        assert_eq!(parse_content_length(&headers), Some(42));
    }
}
