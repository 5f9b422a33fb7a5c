//! Error types for the deployment domain.
//!
//! Propagation policy: everything before acceptance is synchronous and fails
//! the caller's request; everything after acceptance is asynchronous and
//! fails only the deployment's tracked status (see
//! [`crate::workflow::sanitize_error`]).

/// The result type used throughout estate-deploy.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in deployment operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The deploy command is malformed (bad mode or slice). Rejected before
    /// any I/O.
    #[error("{message}")]
    Validation {
        /// Description of what made the command invalid.
        message: String,
    },

    /// The target environment is locked for deployments.
    #[error("{message}")]
    ResourceLocked {
        /// Description naming the locked environment.
        message: String,
    },

    /// An acceptance guard rejected the deployment (duplicate in flight, or
    /// a blue/green slice conflict). The message enumerates the conflicts.
    #[error("{message}")]
    DeploymentValidation {
        /// The guard's rejection message.
        message: String,
    },

    /// No uploaded package could be found for the requested service version.
    #[error("deployment package was not found; specify a location or upload the package to S3")]
    PackageNotFound,

    /// The package lookup was denied.
    #[error("an attempt to locate the following package was forbidden: {service} version {version}")]
    PackageLookupForbidden {
        /// The service whose package was looked up.
        service: String,
        /// The requested version.
        version: String,
    },

    /// The resolved package could not be classified. Configuration or
    /// programmer error, fatal to the request.
    #[error("unknown \"{package_type}\" source package type")]
    UnknownSourcePackageType {
        /// The unclassifiable package type or path.
        package_type: String,
    },

    /// An external collaborator failed.
    #[error("provider error: {message}")]
    Provider {
        /// Description of the collaborator failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An error from the data-access layer.
    #[error(transparent)]
    Data(#[from] estate_data::Error),

    /// An error from estate-core.
    #[error(transparent)]
    Core(#[from] estate_core::Error),
}

impl Error {
    /// Creates a new command validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a new resource-locked error.
    #[must_use]
    pub fn resource_locked(message: impl Into<String>) -> Self {
        Self::ResourceLocked {
            message: message.into(),
        }
    }

    /// Creates a new guard rejection.
    #[must_use]
    pub fn deployment_validation(message: impl Into<String>) -> Self {
        Self::DeploymentValidation {
            message: message.into(),
        }
    }

    /// Creates a new provider error.
    #[must_use]
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new provider error with a source cause.
    #[must_use]
    pub fn provider_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Provider {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Returns a stable machine-readable kind for this error.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "ValidationError",
            Self::ResourceLocked { .. } => "ResourceLockedError",
            Self::DeploymentValidation { .. } => "DeploymentValidationError",
            Self::PackageNotFound => "PackageNotFoundError",
            Self::PackageLookupForbidden { .. } => "PackageLookupForbiddenError",
            Self::UnknownSourcePackageType { .. } => "UnknownSourcePackageTypeError",
            Self::Provider { .. } => "ProviderError",
            Self::Data(_) => "DataError",
            Self::Core(_) => "CoreError",
        }
    }
}
