//! Device acknowledgement reports.

use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;
use crate::domain::value_objects::DeviceId;

/// `error_details` value a device sends once it stops retrying.
pub const MAX_RETRY_REACHED: &str = "max_retry_reached";

pub const APPLICATION_STATUS_SUCCESS: &str = "success";

/// Wire shape of an asynchronous device report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_status_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reports: Option<Vec<serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_agent: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    RootDocReport,
    ConfigVersionReport,
    SubDocReport,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::RootDocReport => "rootdoc-report",
            EventKind::ConfigVersionReport => "config-version-report",
            EventKind::SubDocReport => "subdoc-report",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl EventMessage {
    /// Validate the report and return the device id.
    ///
    /// With `check_device_id` the id must be `mac:` plus 12 hex characters and
    /// is returned upper-cased without the prefix.
    pub fn validate(&self, check_device_id: bool) -> Result<String, DomainError> {
        let device_id = if check_device_id {
            let raw = self.device_id.as_deref().unwrap_or_default();
            DeviceId::parse_prefixed(raw)
                .map_err(|_| DomainError::MalformedEvent(format!("invalid device_id {:?}", raw)))?
                .to_string()
        } else {
            self.device_id.clone().unwrap_or_default()
        };

        self.kind()
            .map(|_| device_id)
            .ok_or_else(|| DomainError::MalformedEvent("no recognizable report shape".to_string()))
    }

    /// Shape of the report, checked as rootdoc, then config-version, then subdoc.
    pub fn kind(&self) -> Option<EventKind> {
        if self.http_status_code.is_some() {
            Some(EventKind::RootDocReport)
        } else if self.has_reports() {
            Some(EventKind::ConfigVersionReport)
        } else if self.is_subdoc_shaped() {
            Some(EventKind::SubDocReport)
        } else {
            None
        }
    }

    /// Name used for logs and metrics. Config-version reports take precedence.
    pub fn event_name(&self) -> &'static str {
        if self.has_reports() {
            EventKind::ConfigVersionReport.as_str()
        } else if self.http_status_code.is_some() {
            EventKind::RootDocReport.as_str()
        } else if self.is_subdoc_shaped() {
            EventKind::SubDocReport.as_str()
        } else {
            "unknown"
        }
    }

    /// Terminal "gave up retrying" report: observed only, never applied.
    pub fn is_max_retry_reached(&self) -> bool {
        self.error_details.as_deref() == Some(MAX_RETRY_REACHED)
    }

    pub fn is_success(&self) -> bool {
        self.application_status.as_deref() == Some(APPLICATION_STATUS_SUCCESS)
    }

    fn has_reports(&self) -> bool {
        self.reports.as_ref().is_some_and(|r| !r.is_empty())
    }

    fn is_subdoc_shaped(&self) -> bool {
        self.namespace.as_deref().is_some_and(|n| !n.is_empty())
            && self.application_status.as_deref().is_some_and(|s| !s.is_empty())
    }
}
