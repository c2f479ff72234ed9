use serde::{Deserialize, Serialize};

/// Outcome of comparing stored device metadata with what the device reports now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RootChange {
    Equals,
    VersionOnlyChanged,
    MetaChanged,
    Missing,
}

impl std::fmt::Display for RootChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RootChange::Equals => write!(f, "equals"),
            RootChange::VersionOnlyChanged => write!(f, "version_only_changed"),
            RootChange::MetaChanged => write!(f, "meta_changed"),
            RootChange::Missing => write!(f, "missing"),
        }
    }
}

/// Per-device metadata. Empty strings and a zero bitmap mean "not provided".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootDocument {
    pub bitmap: i64,
    pub firmware_version: String,
    pub model_name: String,
    pub partner_id: String,
    pub schema_version: String,
    pub version: String,
    pub query_params: String,
}

impl RootDocument {
    pub fn new(
        bitmap: i64,
        firmware_version: impl Into<String>,
        model_name: impl Into<String>,
        partner_id: impl Into<String>,
        schema_version: impl Into<String>,
    ) -> Self {
        Self {
            bitmap,
            firmware_version: firmware_version.into(),
            model_name: model_name.into(),
            partner_id: partner_id.into(),
            schema_version: schema_version.into(),
            ..Default::default()
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_query_params(mut self, query_params: impl Into<String>) -> Self {
        self.query_params = query_params.into();
        self
    }

    /// A device with an empty root version has never been synchronized.
    pub fn is_synchronized(&self) -> bool {
        !self.version.is_empty()
    }

    /// Classify `incoming` against this stored document.
    ///
    /// Metadata differences win over version differences; an empty incoming
    /// field is never a difference.
    pub fn compare(&self, incoming: &RootDocument) -> RootChange {
        if self.meta_differs(incoming) {
            return RootChange::MetaChanged;
        }
        if changed(&self.version, &incoming.version) {
            return RootChange::VersionOnlyChanged;
        }
        if self.version.is_empty() {
            return RootChange::Missing;
        }
        RootChange::Equals
    }

    fn meta_differs(&self, incoming: &RootDocument) -> bool {
        (incoming.bitmap != 0 && incoming.bitmap != self.bitmap)
            || changed(&self.firmware_version, &incoming.firmware_version)
            || changed(&self.model_name, &incoming.model_name)
            || changed(&self.partner_id, &incoming.partner_id)
            || changed(&self.schema_version, &incoming.schema_version)
    }

    /// Field-level merge: non-empty incoming values overwrite, empty ones keep the stored value.
    pub fn merge(&mut self, incoming: &RootDocument) {
        if incoming.bitmap != 0 {
            self.bitmap = incoming.bitmap;
        }
        merge_field(&mut self.firmware_version, &incoming.firmware_version);
        merge_field(&mut self.model_name, &incoming.model_name);
        merge_field(&mut self.partner_id, &incoming.partner_id);
        merge_field(&mut self.schema_version, &incoming.schema_version);
        merge_field(&mut self.version, &incoming.version);
        merge_field(&mut self.query_params, &incoming.query_params);
    }
}

fn changed(stored: &str, incoming: &str) -> bool {
    !incoming.is_empty() && incoming != stored
}

fn merge_field(target: &mut String, incoming: &str) {
    if !incoming.is_empty() {
        *target = incoming.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored() -> RootDocument {
        RootDocument::new(15, "fw-1", "TG4482", "comcast", "33554433-1.3,33554434-1.3")
            .with_version("123")
    }

    #[test]
    fn test_compare_equals() {
        let incoming = stored();
        assert_eq!(stored().compare(&incoming), RootChange::Equals);
    }

    #[test]
    fn test_compare_meta_changed_wins_over_version() {
        let mut incoming = stored().with_version("999");
        incoming.firmware_version = "fw-2".to_string();
        assert_eq!(stored().compare(&incoming), RootChange::MetaChanged);

        let mut incoming = stored();
        incoming.bitmap = 3;
        assert_eq!(stored().compare(&incoming), RootChange::MetaChanged);
    }

    #[test]
    fn test_compare_version_only() {
        let incoming = stored().with_version("999");
        assert_eq!(stored().compare(&incoming), RootChange::VersionOnlyChanged);
    }

    #[test]
    fn test_compare_missing_when_stored_version_empty() {
        let mut old = stored();
        old.version.clear();
        let mut incoming = stored();
        incoming.version.clear();
        assert_eq!(old.compare(&incoming), RootChange::Missing);
    }

    #[test]
    fn test_empty_incoming_fields_are_not_changes() {
        let incoming = RootDocument::default();
        assert_eq!(stored().compare(&incoming), RootChange::Equals);
    }

    #[test]
    fn test_merge_preserves_on_empty() {
        let mut doc = stored();
        let incoming = RootDocument::new(0, "fw-2", "", "", "");
        doc.merge(&incoming);

        assert_eq!(doc.firmware_version, "fw-2");
        assert_eq!(doc.model_name, "TG4482");
        assert_eq!(doc.bitmap, 15);
        assert_eq!(doc.version, "123");
    }

    #[test]
    fn test_is_synchronized() {
        assert!(stored().is_synchronized());
        assert!(!RootDocument::default().is_synchronized());
    }
}
