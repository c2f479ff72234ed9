use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;

static MAC_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:mac:)?([0-9a-fA-F]{12})$").expect("Invalid MAC regex"));

/// Validated device identifier: 12 upper-case hex characters (a MAC address).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(String);

impl DeviceId {
    /// Accepts either the bare 12 hex characters or the `mac:` prefixed form.
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        let value = value.trim();
        MAC_REGEX
            .captures(value)
            .and_then(|caps| caps.get(1))
            .map(|m| Self(m.as_str().to_ascii_uppercase()))
            .ok_or_else(|| DomainError::InvalidDeviceId(value.to_string()))
    }

    /// Strict form used by event reports: `mac:` followed by 12 hex characters.
    pub fn parse_prefixed(value: &str) -> Result<Self, DomainError> {
        if !value.starts_with("mac:") {
            return Err(DomainError::InvalidDeviceId(value.to_string()));
        }
        Self::parse(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for DeviceId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
