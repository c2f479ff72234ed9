use serde::{Deserialize, Serialize};

use crate::domain::entities::ROOT_VERSION_KEY;
use crate::domain::errors::DomainError;

/// Validated sub-document (feature) name, e.g. "lan", "privatessid".
///
/// Also used for reference document ids. `root` is reserved for the
/// whole-bundle version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubDocumentName(String);

impl SubDocumentName {
    const MAX_LENGTH: usize = 64;

    pub fn new(value: &str) -> Result<Self, DomainError> {
        if value.is_empty() {
            return Err(DomainError::InvalidSubDocumentName(
                "name cannot be empty".to_string(),
            ));
        }

        if value.len() > Self::MAX_LENGTH {
            return Err(DomainError::InvalidSubDocumentName(format!(
                "name too long: {} > {}",
                value.len(),
                Self::MAX_LENGTH
            )));
        }

        if !value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
        {
            return Err(DomainError::InvalidSubDocumentName(format!(
                "{:?} must be lowercase alphanumeric with underscores/hyphens",
                value
            )));
        }

        if value == ROOT_VERSION_KEY {
            return Err(DomainError::InvalidSubDocumentName(
                "\"root\" is reserved".to_string(),
            ));
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SubDocumentName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SubDocumentName {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for SubDocumentName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
