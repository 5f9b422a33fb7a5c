//! Deployment acceptance guards.
//!
//! Two independent checks run concurrently; either failure rejects the
//! deployment:
//!
//! - **No concurrent duplicate**: the same service must not already be
//!   deploying to the same role in the same environment
//! - **Slice exclusivity**: a service version may occupy only one slice
//!   colour per environment

use futures::future::join_all;
use std::sync::Arc;

use estate_core::RoleInstallationKey;

use crate::config::DeployRuntimeConfig;
use crate::error::{Error, Result};
use crate::history::DeploymentHistoryView;
use crate::logger::DeploymentLogger;
use crate::providers::TargetStateView;
use crate::record::DeploymentRecord;

/// Validates a deployment against the acceptance guards.
pub struct DeploymentValidator {
    history: Arc<dyn DeploymentHistoryView>,
    target_state: Arc<dyn TargetStateView>,
    logger: Arc<dyn DeploymentLogger>,
    config: DeployRuntimeConfig,
}

impl DeploymentValidator {
    /// Creates a validator over the given views.
    #[must_use]
    pub fn new(
        history: Arc<dyn DeploymentHistoryView>,
        target_state: Arc<dyn TargetStateView>,
        logger: Arc<dyn DeploymentLogger>,
        config: DeployRuntimeConfig,
    ) -> Self {
        Self {
            history,
            target_state,
            logger,
            config,
        }
    }

    /// Runs both guards concurrently; the whole call fails if either fails.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeploymentValidation`] when a guard rejects the
    /// deployment, or the underlying error when a view cannot be read.
    pub async fn validate(&self, deployment: &DeploymentRecord) -> Result<()> {
        tokio::try_join!(
            self.no_duplicate_in_flight(deployment),
            self.slice_is_exclusive(deployment)
        )?;
        Ok(())
    }

    /// Guard A: rejects when the same service is already being deployed to
    /// the same role within the maximum assumed deployment duration.
    async fn no_duplicate_in_flight(&self, deployment: &DeploymentRecord) -> Result<()> {
        let in_flight = self
            .history
            .in_flight(
                &deployment.environment_name,
                &deployment.service_name,
                &deployment.server_role_name,
                self.config.max_deployment_duration,
            )
            .await?;

        if in_flight.is_empty() {
            Ok(())
        } else {
            Err(Error::deployment_validation(format!(
                "The '{}' service is already being deployed to '{}' at this time.",
                deployment.service_name, deployment.server_role_name
            )))
        }
    }

    /// Guard B: rejects when the target version is already installed on a
    /// different slice of the same environment.
    async fn slice_is_exclusive(&self, deployment: &DeploymentRecord) -> Result<()> {
        let keys = self
            .target_state
            .list_role_keys(&deployment.environment_name)
            .await?;

        // Installations of the same service in the same environment on a
        // different slice than the target. Keys that fail to parse are
        // logged and excluded.
        let candidates: Vec<RoleInstallationKey> = keys
            .iter()
            .filter_map(|raw| match RoleInstallationKey::parse(raw) {
                Ok(key) => Some(key),
                Err(error) => {
                    tracing::error!(key = %raw, error = %error, "could not parse service installation");
                    None
                }
            })
            .filter(|key| {
                key.environment == deployment.environment_name
                    && key.service == deployment.service_name
                    && key.slice != deployment.service_slice
            })
            .collect();

        // One lookup task per candidate, issued concurrently.
        let lookups = candidates.into_iter().map(|key| {
            let target_state = Arc::clone(&self.target_state);
            let environment = deployment.environment_name.clone();
            async move {
                let version = target_state.installed_version(&environment, &key).await?;
                Ok::<_, Error>((key, version))
            }
        });

        let mut conflicts = Vec::new();
        for result in join_all(lookups).await {
            let (key, version) = result?;
            if version.as_deref() == Some(deployment.service_version.as_str()) {
                conflicts.push(format!("{key}@{}", deployment.service_version));
            }
        }

        if conflicts.is_empty() {
            return Ok(());
        }

        let message = format!(
            "Each version of a service may only be deployed to slices of one colour per environment.\n\
             You attempted to deploy {} {} to a {} slice of {}.\n\
             Conflicts:\n{}",
            deployment.service_name,
            deployment.service_version,
            deployment.service_slice,
            deployment.environment_name,
            conflicts.join("\n")
        );
        self.logger
            .in_progress(&deployment.id, &deployment.account_name, &message)
            .await;
        Err(Error::deployment_validation(message))
    }
}
