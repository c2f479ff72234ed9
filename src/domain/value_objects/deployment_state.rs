use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::errors::DomainError;

/// Sub-document deployment lifecycle states.
///
/// The numeric values are persisted and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentState {
    /// Device confirmed the current content
    Deployed = 1,
    /// New content stored, not yet delivered
    PendingDownload = 2,
    /// Content delivered, waiting for the device report
    InDeployment = 3,
    /// Device reported a failure applying the content
    Failure = 4,
}

impl DeploymentState {
    /// Check if transition is part of the regular lifecycle.
    ///
    /// Reports that arrive out of order are still applied by the caller;
    /// this only tells whether the move was expected.
    pub fn can_transition_to(&self, target: DeploymentState) -> bool {
        matches!(
            (self, target),
            (_, DeploymentState::PendingDownload)
                | (DeploymentState::PendingDownload, DeploymentState::InDeployment)
                | (DeploymentState::InDeployment, DeploymentState::Deployed)
                | (DeploymentState::InDeployment, DeploymentState::Failure)
        )
    }

    pub fn as_i32(&self) -> i32 {
        *self as i32
    }

    pub fn from_i32(value: i32) -> Result<Self, DomainError> {
        match value {
            1 => Ok(DeploymentState::Deployed),
            2 => Ok(DeploymentState::PendingDownload),
            3 => Ok(DeploymentState::InDeployment),
            4 => Ok(DeploymentState::Failure),
            other => Err(DomainError::InvalidDeploymentState(other.to_string())),
        }
    }
}

impl TryFrom<i32> for DeploymentState {
    type Error = DomainError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::from_i32(value)
    }
}

impl std::fmt::Display for DeploymentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeploymentState::Deployed => write!(f, "deployed"),
            DeploymentState::PendingDownload => write!(f, "pending_download"),
            DeploymentState::InDeployment => write!(f, "in_deployment"),
            DeploymentState::Failure => write!(f, "failure"),
        }
    }
}

impl std::str::FromStr for DeploymentState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deployed" => Ok(DeploymentState::Deployed),
            "pending_download" => Ok(DeploymentState::PendingDownload),
            "in_deployment" => Ok(DeploymentState::InDeployment),
            "failure" => Ok(DeploymentState::Failure),
            _ => Err(DomainError::InvalidDeploymentState(s.to_string())),
        }
    }
}
