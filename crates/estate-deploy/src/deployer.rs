//! Deployment orchestration: acceptance, then detached provisioning.
//!
//! The acceptance phase is an explicit ordered sequence of fallible steps;
//! any rejection stops the sequence and fails the caller's request. After
//! acceptance the provisioning workflow is spawned as a tracked background
//! task: the caller gets the accepted record immediately, and workflow
//! failures reach the deployment logger instead of the caller.

use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::Instrument;

use estate_core::observability::deploy_span;

use crate::command::{DeployCommand, DeployOutcome, DeploymentMode, SliceName, SourcePackage};
use crate::error::{Error, Result};
use crate::logger::DeploymentLogger;
use crate::providers::{
    EnvironmentLookup, InfrastructureConfigProvider, PackageLocator, PackagePathProvider,
    RoleNamingConvention,
};
use crate::record::{DeploymentRecord, DeploymentStatus};
use crate::validator::DeploymentValidator;
use crate::workflow::{CommandBus, DetachedWorkflow};

/// Accepts deploy commands and dispatches their provisioning workflows.
pub struct Deployer {
    environments: Arc<dyn EnvironmentLookup>,
    infrastructure: Arc<dyn InfrastructureConfigProvider>,
    naming: Arc<dyn RoleNamingConvention>,
    packages: Arc<dyn PackageLocator>,
    package_paths: Arc<dyn PackagePathProvider>,
    validator: Arc<DeploymentValidator>,
    logger: Arc<dyn DeploymentLogger>,
    bus: Arc<dyn CommandBus>,
    detached: Mutex<Vec<JoinHandle<()>>>,
}

impl Deployer {
    /// Creates an orchestrator over the given collaborators.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        environments: Arc<dyn EnvironmentLookup>,
        infrastructure: Arc<dyn InfrastructureConfigProvider>,
        naming: Arc<dyn RoleNamingConvention>,
        packages: Arc<dyn PackageLocator>,
        package_paths: Arc<dyn PackagePathProvider>,
        validator: Arc<DeploymentValidator>,
        logger: Arc<dyn DeploymentLogger>,
        bus: Arc<dyn CommandBus>,
    ) -> Self {
        Self {
            environments,
            infrastructure,
            naming,
            packages,
            package_paths,
            validator,
            logger,
            bus,
            detached: Mutex::new(Vec::new()),
        }
    }

    /// Validates and accepts a deploy command.
    ///
    /// Dry runs return after full validation without dispatching anything.
    /// Real runs record a `Started` status synchronously, spawn the detached
    /// provisioning workflow, and return the accepted record without waiting
    /// for the workflow.
    ///
    /// # Errors
    ///
    /// Any acceptance-phase rejection: malformed mode or slice, package
    /// resolution failure, locked environment, guard rejection, or a failing
    /// collaborator. Post-acceptance workflow failures are never returned
    /// here; they are recorded as a `Failed` status through the logger.
    pub async fn deploy(&self, command: DeployCommand) -> Result<DeployOutcome> {
        let slice = Self::accept_mode_and_slice(&command)?;
        let package_path = self.resolve_package_path(&command).await?;
        let source = SourcePackage::classify(&package_path, &command.service_version)?;

        let environment = self.environments.get_by_name(&command.environment_name).await?;
        if environment.is_locked {
            return Err(Error::resource_locked(format!(
                "the environment {} is currently locked for deployments; contact the environment owner",
                command.environment_name
            )));
        }

        let configuration = self
            .infrastructure
            .get(
                &command.environment_name,
                &command.service_name,
                &command.server_role_name,
            )
            .await?;
        let server_role = self
            .naming
            .role_name(&configuration, &command.server_role_name, slice);

        let record = DeploymentRecord {
            id: command.command_id.clone(),
            environment_name: command.environment_name.clone(),
            environment_type_name: configuration.environment_type_name.clone(),
            service_name: command.service_name.clone(),
            service_version: command.service_version.clone(),
            service_slice: slice.map(|s| s.to_string()).unwrap_or_default(),
            server_role,
            server_role_name: command.server_role_name.clone(),
            cluster_name: configuration.cluster.name.clone(),
            account_name: environment.aws_account_name.clone(),
            username: command.username.clone(),
            status: DeploymentStatus::Started,
        };
        self.validator.validate(&record).await?;

        let destination = self.package_paths.destination_for(&record).await?;

        if command.is_dry_run {
            tracing::info!(
                deployment_id = %record.id,
                environment = %record.environment_name,
                service = %record.service_name,
                "dry run validated, nothing dispatched"
            );
            return Ok(DeployOutcome::dry_run(package_path));
        }

        self.logger.started(&record).await?;

        // The caller does not wait for provisioning; the handle is tracked
        // so the workflow can never become an unobserved orphan.
        let workflow = DetachedWorkflow::new(
            Arc::clone(&self.bus),
            Arc::clone(&self.logger),
            record.clone(),
            destination,
            source,
        );
        let span = deploy_span("provision", &record.id, &record.environment_name);
        let handle = tokio::spawn(workflow.run().instrument(span));
        if let Ok(mut detached) = self.detached.lock() {
            detached.push(handle);
        }

        Ok(DeployOutcome::Accepted(record))
    }

    /// Waits for every detached workflow spawned so far to finish.
    ///
    /// For graceful shutdown and deterministic tests; deploy callers never
    /// need it.
    pub async fn quiesce(&self) {
        let handles: Vec<JoinHandle<()>> = self
            .detached
            .lock()
            .map(|mut detached| detached.drain(..).collect())
            .unwrap_or_default();
        for handle in handles {
            let _ = handle.await;
        }
    }

    /// Step 1: mode and slice rules. Rejects before any external call.
    fn accept_mode_and_slice(command: &DeployCommand) -> Result<Option<SliceName>> {
        if command.mode == "overwrite" {
            if let Some(slice) = command.service_slice.as_deref() {
                if slice != "none" {
                    return Err(Error::validation(
                        "slice must be set to 'none' in overwrite mode",
                    ));
                }
            }
        }

        let mode = DeploymentMode::parse(&command.mode)?;
        if mode.requires_slice() {
            let raw = command.service_slice.as_deref().unwrap_or("");
            return Ok(Some(SliceName::parse(raw)?));
        }
        Ok(None)
    }

    /// Steps 2: resolve the package location when none was supplied.
    async fn resolve_package_path(&self, command: &DeployCommand) -> Result<String> {
        if let Some(path) = &command.package_path {
            return Ok(path.clone());
        }

        match self
            .packages
            .find_download_url(
                &command.environment_name,
                &command.service_name,
                &command.service_version,
            )
            .await
        {
            Ok(Some(url)) => Ok(url),
            Ok(None) => Err(Error::PackageNotFound),
            Err(_) => Err(Error::PackageLookupForbidden {
                service: command.service_name.clone(),
                version: command.service_version.clone(),
            }),
        }
    }
}

impl std::fmt::Debug for Deployer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deployer").finish_non_exhaustive()
    }
}
