//! Deployment records and their history wire shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Schema version written to (and required of) history records.
pub const HISTORY_SCHEMA_VERSION: u32 = 2;

/// Lifecycle status of a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeploymentStatus {
    /// Accepted; the provisioning workflow has been dispatched.
    Started,
    /// The workflow is converging on the target state.
    #[serde(rename = "In Progress")]
    InProgress,
    /// A post-acceptance step failed; the reason is recorded alongside.
    Failed,
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Started => "Started",
            Self::InProgress => "In Progress",
            Self::Failed => "Failed",
        };
        write!(f, "{s}")
    }
}

/// The accepted deployment, as returned to the caller and carried through
/// the provisioning workflow.
///
/// Created by the orchestrator once validation passes. The status is
/// mutated exclusively by the workflow failure handler; records are never
/// deleted by this crate (retention is external).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    /// Deployment identifier (the originating command id).
    pub id: String,
    /// Target environment name.
    pub environment_name: String,
    /// The environment's type name, from infrastructure configuration.
    pub environment_type_name: String,
    /// Service being deployed.
    pub service_name: String,
    /// Version being deployed.
    pub service_version: String,
    /// Requested slice colour, or empty when the mode takes no slice.
    pub service_slice: String,
    /// Canonical role name derived by the naming convention (slice-aware).
    pub server_role: String,
    /// The role name as requested.
    pub server_role_name: String,
    /// Owning cluster, from infrastructure configuration.
    pub cluster_name: String,
    /// Name of the AWS account that owns the environment.
    pub account_name: String,
    /// User who requested the deployment.
    pub username: String,
    /// Current lifecycle status.
    pub status: DeploymentStatus,
}

/// One row of the cross-account deployment history table.
///
/// The wire shape keeps the store's PascalCase attribute names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeploymentHistoryRecord {
    /// Deployment identifier.
    #[serde(rename = "DeploymentID")]
    pub deployment_id: String,
    /// Environment the deployment targeted.
    pub environment_name: String,
    /// Service that was deployed.
    pub service_name: String,
    /// Role the service was deployed to.
    pub server_role_name: String,
    /// Status at the time of the last history write.
    pub status: DeploymentStatus,
    /// When the deployment started.
    pub start_timestamp: DateTime<Utc>,
    /// When the deployment finished, if it has.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_timestamp: Option<DateTime<Utc>>,
    /// History record schema version; current writers emit
    /// [`HISTORY_SCHEMA_VERSION`].
    pub schema_version: u32,
}

impl DeploymentHistoryRecord {
    /// The timestamp the trailing-window filter compares against: the end
    /// timestamp when present, the start timestamp otherwise.
    #[must_use]
    pub fn effective_timestamp(&self) -> DateTime<Utc> {
        self.end_timestamp.unwrap_or(self.start_timestamp)
    }
}
