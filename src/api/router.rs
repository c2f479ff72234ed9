use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;

use crate::api::handlers::{
    config_handler, delete_document_handler, delete_reference_handler,
    delete_sub_document_handler, event_handler, get_document_handler, get_reference_handler,
    get_root_document_handler, get_sub_document_handler, health_handler, post_reference_handler,
    post_sub_document_handler, readiness_handler,
};
use crate::api::middleware::{metrics, size_limits};
use crate::api::openapi::swagger_ui;
use crate::application::ports::DatabaseClient;
use crate::application::use_cases::{
    ApplyEventUseCase, DocumentsUseCase, FetchDocumentUseCase, PostSubDocumentUseCase,
    ReferenceDocumentsUseCase,
};

/// Application state container
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseClient>,
    pub fetch_use_case: Arc<FetchDocumentUseCase>,
    pub apply_event_use_case: Arc<ApplyEventUseCase>,
    pub post_sub_document_use_case: Arc<PostSubDocumentUseCase>,
    pub documents_use_case: Arc<DocumentsUseCase>,
    pub reference_use_case: Arc<ReferenceDocumentsUseCase>,
    pub max_body_bytes: usize,
}

/// Create router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let fetch_state = Arc::clone(&state.fetch_use_case);
    let event_state = Arc::clone(&state.apply_event_use_case);
    let post_state = Arc::clone(&state.post_sub_document_use_case);
    let documents_state = Arc::clone(&state.documents_use_case);
    let reference_state = Arc::clone(&state.reference_use_case);

    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/health/ready",
            get(readiness_handler).with_state(Arc::clone(&state.db)),
        )
        // Device protocol
        .route(
            "/api/v1/device/{mac}/config",
            get(config_handler).with_state(fetch_state),
        )
        .route("/api/v1/events", post(event_handler).with_state(event_state))
        // Sub-document management
        .route(
            "/api/v1/device/{mac}/document/{subdoc}",
            post(post_sub_document_handler).with_state(post_state),
        )
        .route(
            "/api/v1/device/{mac}/document/{subdoc}",
            get(get_sub_document_handler)
                .delete(delete_sub_document_handler)
                .with_state(Arc::clone(&documents_state)),
        )
        .route(
            "/api/v1/device/{mac}/document",
            get(get_document_handler)
                .delete(delete_document_handler)
                .with_state(Arc::clone(&documents_state)),
        )
        .route(
            "/api/v1/device/{mac}/rootdocument",
            get(get_root_document_handler).with_state(documents_state),
        )
        // Reference documents
        .route(
            "/api/v1/reference/{ref_id}/document",
            post(post_reference_handler)
                .get(get_reference_handler)
                .with_state(Arc::clone(&reference_state)),
        )
        .route(
            "/api/v1/reference/{ref_id}/document",
            delete(delete_reference_handler).with_state(reference_state),
        )
        .merge(swagger_ui())
        // Body limits: declared length first, then the streamed body
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(state.max_body_bytes))
        .layer(axum_middleware::from_fn_with_state(
            state.max_body_bytes,
            size_limits::content_length_guard,
        ))
        .layer(axum_middleware::from_fn(metrics::metrics_middleware))
}
