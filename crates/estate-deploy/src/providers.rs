//! Collaborator seams consumed by the acceptance pipeline.
//!
//! Environment lookup, infrastructure configuration, naming conventions,
//! package location, and the target-state view are owned by other parts of
//! the system; the pipeline depends on them only through these traits. Each
//! seam ships an in-memory implementation for tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, RwLock};

use estate_core::install_paths::environment_roles_keys_prefix;
use estate_core::RoleInstallationKey;

use crate::command::SliceName;
use crate::error::{Error, Result};
use crate::record::DeploymentRecord;

/// An environment as resolved by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentRecord {
    /// Whether the environment is currently locked for deployments.
    pub is_locked: bool,
    /// Name of the AWS account that owns the environment.
    pub aws_account_name: String,
    /// The environment's type name.
    pub environment_type_name: String,
}

/// Resolves environments by name.
#[async_trait]
pub trait EnvironmentLookup: Send + Sync {
    /// Looks up an environment.
    ///
    /// # Errors
    ///
    /// Returns an error when the environment is unknown or the lookup fails.
    async fn get_by_name(&self, name: &str) -> Result<EnvironmentRecord>;
}

/// The cluster section of infrastructure configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfig {
    /// The owning cluster's name.
    pub name: String,
}

/// Infrastructure configuration for one (environment, service, role).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfrastructureConfiguration {
    /// The environment's type name.
    pub environment_type_name: String,
    /// The owning cluster.
    pub cluster: ClusterConfig,
}

/// Supplies infrastructure configuration.
#[async_trait]
pub trait InfrastructureConfigProvider: Send + Sync {
    /// Loads configuration for `(environment, service, server_role)`.
    ///
    /// # Errors
    ///
    /// Returns an error when no configuration exists or the load fails.
    async fn get(
        &self,
        environment: &str,
        service: &str,
        server_role: &str,
    ) -> Result<InfrastructureConfiguration>;
}

/// Derives canonical role names from configuration and the requested slice.
pub trait RoleNamingConvention: Send + Sync {
    /// Returns the canonical role name for the deployment.
    fn role_name(
        &self,
        configuration: &InfrastructureConfiguration,
        server_role_name: &str,
        slice: Option<SliceName>,
    ) -> String;
}

/// Naming convention that suffixes the slice colour onto the role name.
///
/// `Worker` deployed to the blue slice becomes `Worker-blue`; sliceless
/// deployments keep the bare role name.
#[derive(Debug, Clone, Copy, Default)]
pub struct SliceSuffixNaming;

impl RoleNamingConvention for SliceSuffixNaming {
    fn role_name(
        &self,
        _configuration: &InfrastructureConfiguration,
        server_role_name: &str,
        slice: Option<SliceName>,
    ) -> String {
        match slice {
            Some(slice @ (SliceName::Blue | SliceName::Green)) => {
                format!("{server_role_name}-{slice}")
            }
            Some(SliceName::None) | None => server_role_name.to_string(),
        }
    }
}

/// Locates the most recent uploaded package for a service version.
#[async_trait]
pub trait PackageLocator: Send + Sync {
    /// Returns the download URL of the uploaded package, or `None` when no
    /// package has been uploaded.
    ///
    /// # Errors
    ///
    /// Returns an error when the lookup itself is denied or fails; the
    /// pipeline reports that as a forbidden lookup.
    async fn find_download_url(
        &self,
        environment: &str,
        service: &str,
        version: &str,
    ) -> Result<Option<String>>;
}

/// Where the workflow stages a package before pushing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageDestination {
    /// Destination bucket.
    pub bucket: String,
    /// Destination object key.
    pub key: String,
}

/// Computes the staging destination for an accepted deployment.
#[async_trait]
pub trait PackagePathProvider: Send + Sync {
    /// Returns the staging destination for `record`.
    ///
    /// # Errors
    ///
    /// Returns an error when the destination cannot be derived.
    async fn destination_for(&self, record: &DeploymentRecord) -> Result<PackageDestination>;
}

/// Read view of the currently-installed target state.
#[async_trait]
pub trait TargetStateView: Send + Sync {
    /// Enumerates every installed role key under the environment
    /// (recursive listing).
    ///
    /// # Errors
    ///
    /// Returns an error when the target-state store cannot be read.
    async fn list_role_keys(&self, environment: &str) -> Result<Vec<String>>;

    /// Returns the installed version recorded at `key` (non-recursive point
    /// lookup), or `None` when nothing is recorded there.
    ///
    /// # Errors
    ///
    /// Returns an error when the target-state store cannot be read.
    async fn installed_version(
        &self,
        environment: &str,
        key: &RoleInstallationKey,
    ) -> Result<Option<String>>;
}

// ---------------------------------------------------------------------------
// In-memory implementations
// ---------------------------------------------------------------------------

/// In-memory environment lookup for tests.
#[derive(Debug, Default)]
pub struct InMemoryEnvironments {
    environments: RwLock<HashMap<String, EnvironmentRecord>>,
    lookups: AtomicU32,
}

impl InMemoryEnvironments {
    /// Creates an empty lookup.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an environment.
    pub fn insert(&self, name: impl Into<String>, record: EnvironmentRecord) {
        if let Ok(mut environments) = self.environments.write() {
            environments.insert(name.into(), record);
        }
    }

    /// Returns how many lookups have been served.
    #[must_use]
    pub fn lookups(&self) -> u32 {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EnvironmentLookup for InMemoryEnvironments {
    async fn get_by_name(&self, name: &str) -> Result<EnvironmentRecord> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.environments
            .read()
            .ok()
            .and_then(|environments| environments.get(name).cloned())
            .ok_or_else(|| Error::provider(format!("environment not found: {name}")))
    }
}

/// In-memory infrastructure configuration for tests: one configuration for
/// every (environment, service, role).
#[derive(Debug, Clone)]
pub struct InMemoryInfrastructureConfig {
    configuration: InfrastructureConfiguration,
}

impl InMemoryInfrastructureConfig {
    /// Creates a provider that always returns `configuration`.
    #[must_use]
    pub const fn new(configuration: InfrastructureConfiguration) -> Self {
        Self { configuration }
    }
}

#[async_trait]
impl InfrastructureConfigProvider for InMemoryInfrastructureConfig {
    async fn get(
        &self,
        _environment: &str,
        _service: &str,
        _server_role: &str,
    ) -> Result<InfrastructureConfiguration> {
        Ok(self.configuration.clone())
    }
}

/// In-memory package store for tests: locator and path provider in one.
#[derive(Debug, Default)]
pub struct InMemoryPackages {
    uploads: RwLock<HashMap<(String, String, String), String>>,
    forbidden: RwLock<bool>,
    lookups: AtomicU32,
}

impl InMemoryPackages {
    /// Creates an empty package store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an uploaded package.
    pub fn upload(
        &self,
        environment: impl Into<String>,
        service: impl Into<String>,
        version: impl Into<String>,
        url: impl Into<String>,
    ) {
        if let Ok(mut uploads) = self.uploads.write() {
            uploads.insert((environment.into(), service.into(), version.into()), url.into());
        }
    }

    /// Makes every subsequent lookup fail as denied.
    pub fn deny_lookups(&self) {
        if let Ok(mut forbidden) = self.forbidden.write() {
            *forbidden = true;
        }
    }

    /// Returns how many lookups have been served.
    #[must_use]
    pub fn lookups(&self) -> u32 {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PackageLocator for InMemoryPackages {
    async fn find_download_url(
        &self,
        environment: &str,
        service: &str,
        version: &str,
    ) -> Result<Option<String>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.forbidden.read().is_ok_and(|forbidden| *forbidden) {
            return Err(Error::provider("access denied"));
        }
        Ok(self.uploads.read().ok().and_then(|uploads| {
            uploads
                .get(&(environment.to_string(), service.to_string(), version.to_string()))
                .cloned()
        }))
    }
}

#[async_trait]
impl PackagePathProvider for InMemoryPackages {
    async fn destination_for(&self, record: &DeploymentRecord) -> Result<PackageDestination> {
        Ok(PackageDestination {
            bucket: format!("estate-packages-{}", record.account_name.to_lowercase()),
            key: format!(
                "{}/{}/{}-{}.zip",
                record.environment_name, record.service_name, record.service_name,
                record.service_version
            ),
        })
    }
}

/// In-memory target state for tests.
///
/// Entries are raw key strings so tests can include unparsable keys.
#[derive(Debug, Default)]
pub struct InMemoryTargetState {
    entries: Mutex<Vec<(String, Option<String>)>>,
}

impl InMemoryTargetState {
    /// Creates an empty target state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an installation of `key` at `version`.
    pub fn install(&self, key: &RoleInstallationKey, version: impl Into<String>) {
        self.install_raw(key.to_string(), Some(version.into()));
    }

    /// Records a raw key entry, parsable or not.
    pub fn install_raw(&self, key: impl Into<String>, version: Option<String>) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push((key.into(), version));
        }
    }
}

#[async_trait]
impl TargetStateView for InMemoryTargetState {
    async fn list_role_keys(&self, environment: &str) -> Result<Vec<String>> {
        let prefix = environment_roles_keys_prefix(environment);
        Ok(self
            .entries
            .lock()
            .map(|entries| {
                entries
                    .iter()
                    .filter(|(key, _)| key.starts_with(&prefix))
                    .map(|(key, _)| key.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn installed_version(
        &self,
        _environment: &str,
        key: &RoleInstallationKey,
    ) -> Result<Option<String>> {
        let wanted = key.to_string();
        Ok(self
            .entries
            .lock()
            .ok()
            .and_then(|entries| {
                entries
                    .iter()
                    .find(|(key, _)| *key == wanted)
                    .and_then(|(_, version)| version.clone())
            }))
    }
}
