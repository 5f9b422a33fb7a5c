//! The detached provisioning workflow and its command bus seam.
//!
//! After acceptance, provisioning runs as three independent commands sent to
//! the external command bus: provide infrastructure, stage the package, push
//! the deployment. The workflow is decoupled from the caller — acceptance
//! latency must not be coupled to infrastructure convergence time — but its
//! failures are never silently dropped: any step error is caught, sanitized,
//! and recorded as a `Failed` status through the deployment logger.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use crate::command::SourcePackage;
use crate::error::{Error, Result};
use crate::logger::{DeploymentLogger, NewStatus, StatusRef};
use crate::providers::PackageDestination;
use crate::record::{DeploymentRecord, DeploymentStatus};

/// Progress message recorded once every workflow step has been dispatched.
pub const WAITING_FOR_NODES: &str = "Waiting for nodes to perform service deployment...";

/// A command envelope dispatched to the external bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name")]
pub enum WorkflowCommand {
    /// Provision the infrastructure the deployment lands on.
    ProvideInfrastructure {
        /// Account the infrastructure belongs to.
        #[serde(rename = "accountName")]
        account_name: String,
        /// The accepted deployment.
        deployment: DeploymentRecord,
    },
    /// Stage the source package at its destination.
    PreparePackage {
        /// Account the destination lives in.
        #[serde(rename = "accountName")]
        account_name: String,
        /// Where to stage the package.
        destination: PackageDestination,
        /// What to stage.
        source: SourcePackage,
    },
    /// Push the staged deployment to its nodes.
    PushDeployment {
        /// Account the deployment runs in.
        #[serde(rename = "accountName")]
        account_name: String,
        /// The accepted deployment.
        deployment: DeploymentRecord,
        /// The staged package location.
        #[serde(rename = "s3Path")]
        s3_path: PackageDestination,
    },
}

impl WorkflowCommand {
    /// Returns the command's wire name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ProvideInfrastructure { .. } => "ProvideInfrastructure",
            Self::PreparePackage { .. } => "PreparePackage",
            Self::PushDeployment { .. } => "PushDeployment",
        }
    }
}

/// Transport for workflow commands.
///
/// The bus itself (routing, retries, handler dispatch) is an external
/// collaborator; the workflow only needs `send`.
#[async_trait]
pub trait CommandBus: Send + Sync {
    /// Sends one command.
    ///
    /// # Errors
    ///
    /// Returns an error when the command cannot be dispatched or its handler
    /// reports failure.
    async fn send(&self, command: WorkflowCommand) -> Result<()>;
}

/// Command bus that records sends for assertions and can fail on demand.
#[derive(Debug, Default)]
pub struct InMemoryCommandBus {
    sent: Mutex<Vec<WorkflowCommand>>,
    fail_on: Mutex<Option<String>>,
}

impl InMemoryCommandBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails any subsequent send of the command named `name`.
    pub fn fail_on(&self, name: impl Into<String>) {
        if let Ok(mut fail_on) = self.fail_on.lock() {
            *fail_on = Some(name.into());
        }
    }

    /// Returns a copy of every command sent so far.
    #[must_use]
    pub fn sent(&self) -> Vec<WorkflowCommand> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }

    /// Returns the wire names of every command sent so far, in order.
    #[must_use]
    pub fn sent_names(&self) -> Vec<&'static str> {
        self.sent().iter().map(WorkflowCommand::name).collect()
    }
}

#[async_trait]
impl CommandBus for InMemoryCommandBus {
    async fn send(&self, command: WorkflowCommand) -> Result<()> {
        let should_fail = self
            .fail_on
            .lock()
            .is_ok_and(|fail_on| fail_on.as_deref() == Some(command.name()));
        if should_fail {
            return Err(Error::provider(format!(
                "injected failure sending {}",
                command.name()
            )));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(command);
        }
        Ok(())
    }
}

/// Serializes an error to the form recorded in a `Failed` status.
///
/// Structured errors serialize to their JSON form; if that itself fails,
/// the string form is used.
#[must_use]
pub fn sanitize_error(error: &Error) -> String {
    let detail = serde_json::json!({
        "error": error.kind(),
        "message": error.to_string(),
    });
    serde_json::to_string(&detail).unwrap_or_else(|_| error.to_string())
}

/// The three-step provisioning workflow dispatched after acceptance.
///
/// Run via [`run`](Self::run) inside a spawned task: all failure paths are
/// handled internally so the task can never drop an error unobserved.
pub struct DetachedWorkflow {
    bus: Arc<dyn CommandBus>,
    logger: Arc<dyn DeploymentLogger>,
    deployment: DeploymentRecord,
    destination: PackageDestination,
    source: SourcePackage,
}

impl DetachedWorkflow {
    /// Creates the workflow for one accepted deployment.
    #[must_use]
    pub fn new(
        bus: Arc<dyn CommandBus>,
        logger: Arc<dyn DeploymentLogger>,
        deployment: DeploymentRecord,
        destination: PackageDestination,
        source: SourcePackage,
    ) -> Self {
        Self {
            bus,
            logger,
            deployment,
            destination,
            source,
        }
    }

    /// Runs the workflow, recording any failure as a `Failed` status.
    ///
    /// Never returns an error: the caller has already been answered, so the
    /// logger is the only remaining observer.
    pub async fn run(self) {
        if let Err(error) = self.execute().await {
            tracing::warn!(
                deployment_id = %self.deployment.id,
                error = %error,
                "detached deployment workflow failed"
            );
            self.logger
                .update_status(
                    &StatusRef {
                        deployment_id: self.deployment.id.clone(),
                        account_name: self.deployment.account_name.clone(),
                    },
                    &NewStatus {
                        name: DeploymentStatus::Failed,
                        reason: sanitize_error(&error),
                    },
                )
                .await;
        }
    }

    async fn execute(&self) -> Result<()> {
        let account_name = self.deployment.account_name.clone();

        self.bus
            .send(WorkflowCommand::ProvideInfrastructure {
                account_name: account_name.clone(),
                deployment: self.deployment.clone(),
            })
            .await?;

        self.bus
            .send(WorkflowCommand::PreparePackage {
                account_name: account_name.clone(),
                destination: self.destination.clone(),
                source: self.source.clone(),
            })
            .await?;

        self.bus
            .send(WorkflowCommand::PushDeployment {
                account_name,
                deployment: self.deployment.clone(),
                s3_path: self.destination.clone(),
            })
            .await?;

        self.logger
            .in_progress(
                &self.deployment.id,
                &self.deployment.account_name,
                WAITING_FOR_NODES,
            )
            .await;
        Ok(())
    }
}
