use bytes::Bytes;

use crate::domain::value_objects::DeploymentState;

/// Stored `expiry` meaning "never expires". Unlike `None` it overwrites an
/// earlier expiry on a partial write.
pub const NO_EXPIRY: i64 = 0;

/// One named feature configuration of a device.
///
/// Every field is optional: `None` means "not set", which is different from a
/// zero value. Storage applies a sub-document as a partial write, so an update
/// carrying only `state` leaves payload and version untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubDocument {
    pub payload: Option<Bytes>,
    pub version: Option<String>,
    pub state: Option<DeploymentState>,
    pub updated_time: Option<i64>,
    pub error_code: Option<i32>,
    pub error_details: Option<String>,
    pub expiry: Option<i64>,
}

impl SubDocument {
    /// Content without any lifecycle information.
    pub fn new(payload: impl Into<Bytes>, version: impl Into<String>) -> Self {
        Self {
            payload: Some(payload.into()),
            version: Some(version.into()),
            ..Default::default()
        }
    }

    /// Freshly posted content: re-enters `PendingDownload` with cleared errors
    /// and no expiry.
    pub fn posted(payload: impl Into<Bytes>, version: impl Into<String>, now_ms: i64) -> Self {
        Self {
            state: Some(DeploymentState::PendingDownload),
            updated_time: Some(now_ms),
            error_code: Some(0),
            error_details: Some(String::new()),
            expiry: Some(NO_EXPIRY),
            ..Self::new(payload, version)
        }
    }

    /// Partial write that only moves the deployment state.
    pub fn state_update(state: DeploymentState, now_ms: i64) -> Self {
        Self {
            state: Some(state),
            updated_time: Some(now_ms),
            ..Default::default()
        }
    }

    /// Partial write for a confirmed deployment: error fields are cleared.
    pub fn deployed(now_ms: i64) -> Self {
        Self {
            error_code: Some(0),
            error_details: Some(String::new()),
            ..Self::state_update(DeploymentState::Deployed, now_ms)
        }
    }

    /// Partial write for a failed deployment.
    pub fn failed(now_ms: i64, error_code: Option<i32>, error_details: Option<String>) -> Self {
        Self {
            error_code: Some(error_code.unwrap_or_default()),
            error_details: Some(error_details.unwrap_or_default()),
            ..Self::state_update(DeploymentState::Failure, now_ms)
        }
    }

    pub fn with_state(mut self, state: DeploymentState) -> Self {
        self.state = Some(state);
        self
    }

    /// Set or clear the expiry. Clearing stores [`NO_EXPIRY`] so the write
    /// replaces whatever was stored before.
    pub fn with_expiry(mut self, expiry: Option<i64>) -> Self {
        self.expiry = Some(expiry.unwrap_or(NO_EXPIRY));
        self
    }

    /// Apply a partial write: every field set in `update` overwrites this one.
    pub fn apply(&mut self, update: &SubDocument) {
        if update.payload.is_some() {
            self.payload = update.payload.clone();
        }
        if update.version.is_some() {
            self.version = update.version.clone();
        }
        if update.state.is_some() {
            self.state = update.state;
        }
        if update.updated_time.is_some() {
            self.updated_time = update.updated_time;
        }
        if update.error_code.is_some() {
            self.error_code = update.error_code;
        }
        if update.error_details.is_some() {
            self.error_details = update.error_details.clone();
        }
        if update.expiry.is_some() {
            self.expiry = update.expiry;
        }
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn payload(&self) -> Option<&Bytes> {
        self.payload.as_ref()
    }

    /// Effective expiry in epoch milliseconds, `None` when the content never expires.
    pub fn expiry(&self) -> Option<i64> {
        self.expiry.filter(|expiry| *expiry != NO_EXPIRY)
    }

    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.expiry().is_some_and(|expiry| expiry <= now_ms)
    }

    /// Error fields are considered cleared when unset or zero/empty.
    pub fn has_error(&self) -> bool {
        self.error_code.unwrap_or_default() != 0
            || self.error_details.as_deref().is_some_and(|d| !d.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_posted_enters_pending_download() {
        let sub = SubDocument::posted(&b"abc"[..], "12345", 1000);
        assert_eq!(sub.state, Some(DeploymentState::PendingDownload));
        assert_eq!(sub.version(), Some("12345"));
        assert_eq!(sub.updated_time, Some(1000));
        assert!(!sub.has_error());
    }

    #[test]
    fn test_state_update_is_partial() {
        let mut stored = SubDocument::posted(&b"abc"[..], "1", 1000);
        stored.apply(&SubDocument::state_update(DeploymentState::InDeployment, 2000));

        assert_eq!(stored.payload().map(|p| p.as_ref()), Some(&b"abc"[..]));
        assert_eq!(stored.version(), Some("1"));
        assert_eq!(stored.state, Some(DeploymentState::InDeployment));
        assert_eq!(stored.updated_time, Some(2000));
    }

    #[test]
    fn test_failed_then_deployed_clears_errors() {
        let mut stored = SubDocument::posted(&b"abc"[..], "1", 1000);
        stored.apply(&SubDocument::failed(
            2000,
            Some(204),
            Some("failed_retrying".to_string()),
        ));
        assert_eq!(stored.state, Some(DeploymentState::Failure));
        assert!(stored.has_error());

        stored.apply(&SubDocument::deployed(3000));
        assert_eq!(stored.state, Some(DeploymentState::Deployed));
        assert_eq!(stored.error_code, Some(0));
        assert_eq!(stored.error_details.as_deref(), Some(""));
        assert!(!stored.has_error());
    }

    #[test]
    fn test_unset_differs_from_zero() {
        let sub = SubDocument::new(&b"x"[..], "1");
        assert_eq!(sub.error_code, None);
        assert_eq!(sub.state, None);
    }

    #[test]
    fn test_expiry() {
        let sub = SubDocument::new(&b"x"[..], "1").with_expiry(Some(500));
        assert!(sub.is_expired(500));
        assert!(sub.is_expired(600));
        assert!(!sub.is_expired(499));
        assert!(!SubDocument::new(&b"x"[..], "1").is_expired(i64::MAX));
    }

    #[test]
    fn test_repost_clears_expiry() {
        let mut stored = SubDocument::posted(&b"old"[..], "1", 1000).with_expiry(Some(1));
        assert!(stored.is_expired(2000));

        stored.apply(&SubDocument::posted(&b"new"[..], "2", 3000));
        assert_eq!(stored.expiry(), None);
        assert!(!stored.is_expired(i64::MAX));

        stored.apply(&SubDocument::state_update(DeploymentState::InDeployment, 4000));
        assert_eq!(stored.expiry(), None);
    }
}
