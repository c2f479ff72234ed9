use bytes::Bytes;

use crate::domain::root_version::payload_version;

/// Shared payload referenced by an opaque id instead of device + feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefSubDocument {
    payload: Bytes,
    version: String,
}

impl RefSubDocument {
    /// When no version is given it is derived from the payload hash.
    pub fn new(payload: impl Into<Bytes>, version: Option<String>) -> Self {
        let payload = payload.into();
        let version = version
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| payload_version(&payload));
        Self { payload, version }
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_defaults_to_payload_hash() {
        let doc = RefSubDocument::new(&b"shared"[..], None);
        assert_eq!(doc.version(), payload_version(b"shared"));

        let doc = RefSubDocument::new(&b"shared"[..], Some(String::new()));
        assert_eq!(doc.version(), payload_version(b"shared"));
    }

    #[test]
    fn test_explicit_version_is_kept() {
        let doc = RefSubDocument::new(&b"shared"[..], Some("v7".to_string()));
        assert_eq!(doc.version(), "v7");
        assert_eq!(doc.payload().as_ref(), b"shared");
    }
}
