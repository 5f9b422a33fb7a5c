//! # estate-deploy
//!
//! Deployment domain for the Estate multi-account AWS estate manager.
//!
//! This crate implements the deployment-acceptance pipeline:
//!
//! - **Command Vocabulary**: Deploy commands, modes, slices, and source
//!   package classification
//! - **Acceptance Guards**: Duplicate-in-flight detection and blue/green
//!   slice exclusivity, checked concurrently
//! - **Orchestration**: Validate, record acceptance, then dispatch a
//!   detached three-step provisioning workflow
//! - **Cross-Account History**: The filtered history scan the duplicate
//!   guard runs across every managed account
//!
//! ## Propagation Policy
//!
//! Everything before acceptance is synchronous and fails the caller's
//! request. Everything after acceptance is asynchronous and fails only the
//! deployment's tracked status, observed through the deployment logger.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod command;
pub mod config;
pub mod deployer;
pub mod error;
pub mod history;
pub mod logger;
pub mod providers;
pub mod record;
pub mod validator;
pub mod workflow;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::command::{DeployCommand, DeployOutcome, DeploymentMode, SliceName, SourcePackage};
    pub use crate::config::DeployRuntimeConfig;
    pub use crate::deployer::Deployer;
    pub use crate::error::{Error, Result};
    pub use crate::history::{CrossAccountDeploymentHistory, DeploymentHistoryView};
    pub use crate::logger::{DeploymentLogger, NewStatus, StatusRef, TracingDeploymentLogger};
    pub use crate::providers::{
        EnvironmentLookup, EnvironmentRecord, InfrastructureConfigProvider,
        InfrastructureConfiguration, PackageDestination, PackageLocator, PackagePathProvider,
        RoleNamingConvention, TargetStateView,
    };
    pub use crate::record::{DeploymentHistoryRecord, DeploymentRecord, DeploymentStatus};
    pub use crate::validator::DeploymentValidator;
    pub use crate::workflow::{CommandBus, WorkflowCommand};
}

pub use command::{DeployCommand, DeployOutcome, DeploymentMode, SliceName, SourcePackage};
pub use config::DeployRuntimeConfig;
pub use deployer::Deployer;
pub use error::{Error, Result};
pub use history::{history_table_config, CrossAccountDeploymentHistory, DeploymentHistoryView};
pub use logger::{
    DeploymentLogger, InMemoryDeploymentLogger, LoggedEvent, NewStatus, StatusRef,
    TracingDeploymentLogger,
};
pub use providers::{
    ClusterConfig, EnvironmentLookup, EnvironmentRecord, InMemoryEnvironments,
    InMemoryInfrastructureConfig, InMemoryPackages, InMemoryTargetState,
    InfrastructureConfigProvider, InfrastructureConfiguration, PackageDestination, PackageLocator,
    PackagePathProvider, RoleNamingConvention, SliceSuffixNaming, TargetStateView,
};
pub use record::{DeploymentHistoryRecord, DeploymentRecord, DeploymentStatus};
pub use validator::DeploymentValidator;
pub use workflow::{CommandBus, InMemoryCommandBus, WorkflowCommand};
