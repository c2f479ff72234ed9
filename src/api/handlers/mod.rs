pub mod config;
pub mod documents;
pub mod events;
pub mod health;
pub mod references;


pub use config::config_handler;
pub use documents::{
    delete_document_handler, delete_sub_document_handler, get_document_handler,
    get_root_document_handler, get_sub_document_handler, post_sub_document_handler,
};
pub use events::event_handler;
pub use health::{health_handler, readiness_handler};
pub use references::{
    delete_reference_handler, get_reference_handler, post_reference_handler,
};

use axum::http::HeaderMap;

use crate::api::errors::ApiError;
use crate::domain::value_objects::DeviceId;

pub const HEADER_SUBDOCUMENT_VERSION: &str = "x-subdocument-version";
pub const HEADER_SUBDOCUMENT_STATE: &str = "x-subdocument-state";
pub const HEADER_EXPIRY: &str = "x-expiry";
pub const HEADER_ROOT_VERSION: &str = "x-root-version";

/// Trimmed header value; absent, empty and non-UTF-8 values are `None`.
pub(crate) fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub(crate) fn parse_device_id(mac: &str) -> Result<DeviceId, ApiError> {
    DeviceId::parse(mac).map_err(|e| ApiError::bad_request(e.to_string()))
}
