mod apply_event;
mod documents;
mod fetch_document;
mod post_sub_document;
mod reference_documents;

pub use apply_event::{AppliedEvent, ApplyEventUseCase};
pub use documents::DocumentsUseCase;
pub use fetch_document::FetchDocumentUseCase;
pub use post_sub_document::PostSubDocumentUseCase;
pub use reference_documents::ReferenceDocumentsUseCase;

/// Wall clock in epoch milliseconds, the unit of `updated_time` and `expiry`.
pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
