use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::handlers::health::{HealthResponse, ReadinessResponse};
use crate::application::dto::{
    DocumentStatusDto, EventAckDto, PostSubDocumentResponse, RefDocumentResponse,
    RootDocumentDto, SubDocumentStatusDto,
};
use crate::domain::value_objects::DeploymentState;

/// OpenAPI specification for the config sync API
#[derive(OpenApi)]
#[openapi(
    info(
        title = "CPE Config Sync API",
        version = "1.0.0",
        description = "Configuration synchronization for customer-premises devices"
    ),
    servers(
        (url = "http://localhost:9000", description = "Local development server")
    ),
    paths(
        crate::api::handlers::health::health_handler,
        crate::api::handlers::health::readiness_handler,
        crate::api::handlers::config::config_handler,
        crate::api::handlers::events::event_handler,
        crate::api::handlers::documents::post_sub_document_handler,
        crate::api::handlers::documents::get_sub_document_handler,
        crate::api::handlers::documents::delete_sub_document_handler,
        crate::api::handlers::documents::get_document_handler,
        crate::api::handlers::documents::delete_document_handler,
        crate::api::handlers::documents::get_root_document_handler,
        crate::api::handlers::references::post_reference_handler,
        crate::api::handlers::references::get_reference_handler,
        crate::api::handlers::references::delete_reference_handler,
    ),
    components(
        schemas(
            HealthResponse,
            ReadinessResponse,
            DeploymentState,
            SubDocumentStatusDto,
            RootDocumentDto,
            DocumentStatusDto,
            PostSubDocumentResponse,
            RefDocumentResponse,
            EventAckDto,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "device", description = "Device config fetch"),
        (name = "events", description = "Device deployment reports"),
        (name = "documents", description = "Sub-document management"),
        (name = "references", description = "Shared reference documents")
    )
)]
pub struct ApiDoc;

/// Create the Swagger UI route
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())
}
