//! Deployment status logging seam.
//!
//! Acceptance records a synchronous "Started" status; everything after that
//! is observed only through this channel. `started` is fallible because a
//! failure to record acceptance fails the request; the post-acceptance
//! notifications are best-effort and never fail their caller.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::error::Result;
use crate::record::{DeploymentRecord, DeploymentStatus};

/// Identifies the deployment a status update applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRef {
    /// The deployment's id.
    pub deployment_id: String,
    /// The account the deployment runs in.
    pub account_name: String,
}

/// A status transition with its reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStatus {
    /// The status being recorded.
    pub name: DeploymentStatus,
    /// Why the status changed (sanitized for failures).
    pub reason: String,
}

/// Sink for deployment lifecycle events.
#[async_trait]
pub trait DeploymentLogger: Send + Sync {
    /// Records acceptance of a deployment.
    ///
    /// # Errors
    ///
    /// Returns an error when the record cannot be written; acceptance fails
    /// with it.
    async fn started(&self, record: &DeploymentRecord) -> Result<()>;

    /// Records workflow progress. Best-effort.
    async fn in_progress(&self, deployment_id: &str, account_name: &str, message: &str);

    /// Records a status transition. Best-effort.
    async fn update_status(&self, status: &StatusRef, new_status: &NewStatus);
}

/// Logger that emits lifecycle events through `tracing`.
///
/// The production default when no dedicated sink is wired in.
#[derive(Debug, Default, Clone)]
pub struct TracingDeploymentLogger;

#[async_trait]
impl DeploymentLogger for TracingDeploymentLogger {
    async fn started(&self, record: &DeploymentRecord) -> Result<()> {
        tracing::info!(
            target: "deployment",
            deployment_id = %record.id,
            environment = %record.environment_name,
            service = %record.service_name,
            version = %record.service_version,
            account = %record.account_name,
            "deployment started"
        );
        Ok(())
    }

    async fn in_progress(&self, deployment_id: &str, account_name: &str, message: &str) {
        tracing::info!(
            target: "deployment",
            deployment_id = deployment_id,
            account = account_name,
            message = message,
            "deployment in progress"
        );
    }

    async fn update_status(&self, status: &StatusRef, new_status: &NewStatus) {
        tracing::warn!(
            target: "deployment",
            deployment_id = %status.deployment_id,
            account = %status.account_name,
            status = %new_status.name,
            reason = %new_status.reason,
            "deployment status updated"
        );
    }
}

/// One event captured by [`InMemoryDeploymentLogger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoggedEvent {
    /// A `started` record.
    Started(DeploymentRecord),
    /// An `in_progress` notification.
    InProgress {
        /// The deployment's id.
        deployment_id: String,
        /// The account the deployment runs in.
        account_name: String,
        /// The progress message.
        message: String,
    },
    /// An `update_status` notification.
    StatusUpdate {
        /// The deployment the update applies to.
        status: StatusRef,
        /// The recorded transition.
        new_status: NewStatus,
    },
}

/// Deployment logger that captures events for assertions.
#[derive(Debug, Default)]
pub struct InMemoryDeploymentLogger {
    events: Mutex<Vec<LoggedEvent>>,
}

impl InMemoryDeploymentLogger {
    /// Creates an empty logger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all captured events.
    #[must_use]
    pub fn events(&self) -> Vec<LoggedEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Returns the captured status updates.
    #[must_use]
    pub fn status_updates(&self) -> Vec<(StatusRef, NewStatus)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                LoggedEvent::StatusUpdate { status, new_status } => Some((status, new_status)),
                _ => None,
            })
            .collect()
    }

    /// Returns the records passed to `started`.
    #[must_use]
    pub fn started_records(&self) -> Vec<DeploymentRecord> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                LoggedEvent::Started(record) => Some(record),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: LoggedEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[async_trait]
impl DeploymentLogger for InMemoryDeploymentLogger {
    async fn started(&self, record: &DeploymentRecord) -> Result<()> {
        self.push(LoggedEvent::Started(record.clone()));
        Ok(())
    }

    async fn in_progress(&self, deployment_id: &str, account_name: &str, message: &str) {
        self.push(LoggedEvent::InProgress {
            deployment_id: deployment_id.to_string(),
            account_name: account_name.to_string(),
            message: message.to_string(),
        });
    }

    async fn update_status(&self, status: &StatusRef, new_status: &NewStatus) {
        self.push(LoggedEvent::StatusUpdate {
            status: status.clone(),
            new_status: new_status.clone(),
        });
    }
}
