use std::sync::Arc;

use futures_util::future::try_join_all;
use tracing::{debug, info, warn};

use super::now_ms;
use crate::application::errors::ApplyEventError;
use crate::application::ports::{DatabaseClient, DatabaseError};
use crate::domain::entities::{Document, SubDocument};
use crate::domain::events::{EventKind, EventMessage};
use crate::domain::value_objects::{DeploymentState, DeviceId};

/// Status a device reports for a root fetch that returned nothing new.
const ROOT_NOT_MODIFIED: i32 = 304;

/// What an ingested report changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedEvent {
    pub device_id: String,
    pub event: &'static str,
    pub updated: Vec<String>,
}

/// Use case: advance sub-document deployment state from a device report.
///
/// Reports may arrive late or twice; every write is last-write-wins on the
/// state fields, so re-applying a report is harmless.
pub struct ApplyEventUseCase {
    db: Arc<dyn DatabaseClient>,
    check_device_id: bool,
}

impl ApplyEventUseCase {
    pub fn new(db: Arc<dyn DatabaseClient>, check_device_id: bool) -> Self {
        Self {
            db,
            check_device_id,
        }
    }

    pub async fn execute(&self, message: &EventMessage) -> Result<AppliedEvent, ApplyEventError> {
        let raw_device_id = message.validate(self.check_device_id)?;
        let device_id = DeviceId::parse(&raw_device_id)?;
        let event = message.event_name();

        let mut applied = AppliedEvent {
            device_id: device_id.to_string(),
            event,
            updated: Vec::new(),
        };

        if message.is_max_retry_reached() {
            warn!(
                device_id = %device_id,
                namespace = message.namespace.as_deref().unwrap_or_default(),
                event,
                "Device gave up retrying"
            );
            return Ok(applied);
        }

        applied.updated = match message.kind() {
            Some(EventKind::SubDocReport) => self.apply_subdoc_report(&device_id, message).await?,
            Some(EventKind::RootDocReport) => self.apply_rootdoc_report(&device_id, message).await?,
            Some(EventKind::ConfigVersionReport) => {
                info!(
                    device_id = %device_id,
                    reports = message.reports.as_ref().map(Vec::len).unwrap_or_default(),
                    "Config version report"
                );
                Vec::new()
            }
            // validate() rejects messages without a shape
            None => Vec::new(),
        };

        Ok(applied)
    }

    async fn apply_subdoc_report(
        &self,
        device_id: &DeviceId,
        message: &EventMessage,
    ) -> Result<Vec<String>, ApplyEventError> {
        let name = message.namespace.clone().unwrap_or_default();

        let current = self
            .db
            .get_sub_document(device_id, &name)
            .await
            .map_err(|e| not_found_or(e, &name))?;

        let now = now_ms();
        let update = if message.is_success() {
            SubDocument::deployed(now)
        } else {
            SubDocument::failed(now, message.error_code, message.error_details.clone())
        };
        log_transition(device_id, &name, current.state, &update, message);

        self.db
            .set_sub_document(device_id, &name, &update, current.state)
            .await?;

        Ok(vec![name])
    }

    /// A 304 confirms every sub-document still in deployment.
    async fn apply_rootdoc_report(
        &self,
        device_id: &DeviceId,
        message: &EventMessage,
    ) -> Result<Vec<String>, ApplyEventError> {
        let status = message.http_status_code.unwrap_or_default();
        if status != ROOT_NOT_MODIFIED {
            info!(device_id = %device_id, http_status_code = status, "Root document report");
            return Ok(Vec::new());
        }

        let document = match self.db.get_document(device_id).await {
            Ok(document) => document,
            Err(e) if e.is_not_found() => Document::new(),
            Err(e) => return Err(e.into()),
        };

        let names = document.names_in_state(DeploymentState::InDeployment);
        let update = SubDocument::deployed(now_ms());
        let writes = names.iter().map(|name| {
            let update = &update;
            async move {
                self.db
                    .set_sub_document(
                        device_id,
                        name,
                        update,
                        Some(DeploymentState::InDeployment),
                    )
                    .await
            }
        });
        try_join_all(writes).await?;

        info!(
            device_id = %device_id,
            confirmed = names.len(),
            "Root document report confirmed deployment"
        );
        Ok(names)
    }
}

fn not_found_or(err: DatabaseError, name: &str) -> ApplyEventError {
    if err.is_not_found() {
        ApplyEventError::NotFound(format!("sub-document {}", name))
    } else {
        ApplyEventError::Database(err)
    }
}

fn log_transition(
    device_id: &DeviceId,
    name: &str,
    from: Option<DeploymentState>,
    update: &SubDocument,
    message: &EventMessage,
) {
    let Some(to) = update.state else {
        return;
    };

    match from {
        Some(from) if from == to => {
            debug!(device_id = %device_id, namespace = name, state = %to, "Duplicate report");
        }
        Some(from) if !from.can_transition_to(to) => {
            warn!(
                device_id = %device_id,
                namespace = name,
                from = %from,
                to = %to,
                "Unexpected deployment transition"
            );
        }
        _ => {
            info!(
                device_id = %device_id,
                namespace = name,
                from = from.map(|s| s.to_string()).unwrap_or_default(),
                to = %to,
                error_code = message.error_code.unwrap_or_default(),
                transaction_uuid = message.transaction_uuid.as_deref().unwrap_or_default(),
                "Deployment state changed"
            );
        }
    }
}
