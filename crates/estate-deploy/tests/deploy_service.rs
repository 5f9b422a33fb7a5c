//! End-to-end acceptance tests for the deployment orchestrator.
//!
//! The full pipeline runs over in-memory collaborators: environment lookup,
//! infrastructure configuration, package store, cross-account history (real
//! fan-out over an in-memory table backend), target state, logger, and
//! command bus.

use std::sync::Arc;

use chrono::{Duration, Utc};

use estate_core::{AccountNumber, ManagedAccount, RoleInstallationKey, StaticAccountDirectory};
use estate_data::{
    CrossAccountStore, InMemoryTableBackend, KeySchemaCache, PermissiveSchema, PrefixedTableNames,
    TableKeySchema, Versioned, VersionedStore,
};
use estate_deploy::history::history_table_config;
use estate_deploy::{
    ClusterConfig, CrossAccountDeploymentHistory, DeployCommand, DeployOutcome,
    DeployRuntimeConfig, Deployer, DeploymentHistoryRecord, DeploymentStatus, DeploymentValidator,
    Error, InMemoryCommandBus, InMemoryDeploymentLogger, InMemoryEnvironments,
    InMemoryInfrastructureConfig, InMemoryPackages, InMemoryTargetState,
    InfrastructureConfiguration, LoggedEvent, EnvironmentRecord, SliceSuffixNaming,
};

use estate_deploy::record::HISTORY_SCHEMA_VERSION;

struct Fixture {
    backend: Arc<InMemoryTableBackend>,
    history_store: Arc<VersionedStore<DeploymentHistoryRecord>>,
    environments: Arc<InMemoryEnvironments>,
    packages: Arc<InMemoryPackages>,
    target_state: Arc<InMemoryTargetState>,
    logger: Arc<InMemoryDeploymentLogger>,
    bus: Arc<InMemoryCommandBus>,
    deployer: Deployer,
}

fn fixture() -> Fixture {
    let backend = Arc::new(
        InMemoryTableBackend::new()
            .with_table("EstateDeploymentHistory", TableKeySchema::hash("DeploymentID")),
    );
    let history_store = Arc::new(VersionedStore::new(
        history_table_config(),
        &PrefixedTableNames::new("Estate"),
        backend.clone(),
        Arc::new(PermissiveSchema),
        Arc::new(KeySchemaCache::new()),
    ));
    let directory = Arc::new(StaticAccountDirectory::new(vec![
        ManagedAccount::master(AccountNumber::new("1").unwrap()),
        ManagedAccount::child(AccountNumber::new("2").unwrap()),
    ]));
    let history = Arc::new(CrossAccountDeploymentHistory::new(CrossAccountStore::new(
        directory,
        history_store.clone(),
    )));

    let environments = Arc::new(InMemoryEnvironments::new());
    environments.insert(
        "pr1",
        EnvironmentRecord {
            is_locked: false,
            aws_account_name: "Prod".into(),
            environment_type_name: "Prod".into(),
        },
    );

    let packages = Arc::new(InMemoryPackages::new());
    packages.upload(
        "pr1",
        "TicketKeeper",
        "1.0.0",
        "https://s3.amazonaws.com/uploads/TicketKeeper-1.0.0.zip",
    );

    let target_state = Arc::new(InMemoryTargetState::new());
    let logger = Arc::new(InMemoryDeploymentLogger::new());
    let bus = Arc::new(InMemoryCommandBus::new());

    let validator = Arc::new(DeploymentValidator::new(
        history,
        target_state.clone(),
        logger.clone(),
        DeployRuntimeConfig::default(),
    ));
    let deployer = Deployer::new(
        environments.clone(),
        Arc::new(InMemoryInfrastructureConfig::new(InfrastructureConfiguration {
            environment_type_name: "Prod".into(),
            cluster: ClusterConfig {
                name: "Tango".into(),
            },
        })),
        Arc::new(SliceSuffixNaming),
        packages.clone(),
        packages.clone(),
        validator,
        logger.clone(),
        bus.clone(),
    );

    Fixture {
        backend,
        history_store,
        environments,
        packages,
        target_state,
        logger,
        bus,
        deployer,
    }
}

fn command() -> DeployCommand {
    DeployCommand {
        environment_name: "pr1".into(),
        service_name: "TicketKeeper".into(),
        service_version: "1.0.0".into(),
        service_slice: Some("blue".into()),
        mode: "bg".into(),
        server_role_name: "Worker".into(),
        package_path: None,
        is_dry_run: false,
        command_id: uuid::Uuid::new_v4().to_string(),
        username: "alice".into(),
    }
}

#[tokio::test]
async fn overwrite_mode_with_a_slice_is_rejected_before_any_external_call() {
    let fixture = fixture();
    let mut command = command();
    command.mode = "overwrite".into();
    command.service_slice = Some("blue".into());

    let err = fixture.deployer.deploy(command).await.unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));
    assert!(err.to_string().contains("overwrite mode"));

    assert_eq!(fixture.packages.lookups(), 0, "no package lookup was made");
    assert_eq!(fixture.environments.lookups(), 0, "no environment lookup was made");
    assert!(fixture.bus.sent().is_empty());
}

#[tokio::test]
async fn unknown_modes_and_slices_are_rejected() {
    let fixture = fixture();

    let mut unknown_mode = command();
    unknown_mode.mode = "rolling".into();
    let err = fixture.deployer.deploy(unknown_mode).await.unwrap_err();
    assert!(err.to_string().contains("unknown mode 'rolling'"));

    let mut unknown_slice = command();
    unknown_slice.service_slice = Some("teal".into());
    let err = fixture.deployer.deploy(unknown_slice).await.unwrap_err();
    assert!(err.to_string().contains("unknown slice 'teal'"));

    let mut missing_slice = command();
    missing_slice.service_slice = None;
    assert!(fixture.deployer.deploy(missing_slice).await.is_err());
}

#[tokio::test]
async fn missing_packages_reject_with_a_descriptive_message() {
    let fixture = fixture();
    let mut command = command();
    command.service_version = "9.9.9".into();

    let err = fixture.deployer.deploy(command).await.unwrap_err();
    assert!(matches!(err, Error::PackageNotFound));
    assert!(err.to_string().contains("upload the package"));
}

#[tokio::test]
async fn denied_package_lookups_reject_as_forbidden() {
    let fixture = fixture();
    fixture.packages.deny_lookups();

    let err = fixture.deployer.deploy(command()).await.unwrap_err();
    assert!(matches!(err, Error::PackageLookupForbidden { .. }));
    assert!(err.to_string().contains("TicketKeeper version 1.0.0"));
}

#[tokio::test]
async fn an_explicit_package_path_skips_the_lookup() {
    let fixture = fixture();
    let mut command = command();
    command.package_path = Some("s3://my-bucket/custom.zip".into());

    let outcome = fixture.deployer.deploy(command).await.unwrap();
    assert!(matches!(outcome, DeployOutcome::Accepted(_)));
    assert_eq!(fixture.packages.lookups(), 0);
}

#[tokio::test]
async fn locked_environments_reject_with_resource_locked() {
    let fixture = fixture();
    fixture.environments.insert(
        "pr1",
        EnvironmentRecord {
            is_locked: true,
            aws_account_name: "Prod".into(),
            environment_type_name: "Prod".into(),
        },
    );

    let err = fixture.deployer.deploy(command()).await.unwrap_err();
    assert!(matches!(err, Error::ResourceLocked { .. }));
    assert!(err.to_string().contains("pr1"));
    assert!(fixture.logger.started_records().is_empty());
}

#[tokio::test]
async fn a_duplicate_in_flight_deployment_rejects_acceptance() {
    let fixture = fixture();
    fixture
        .history_store
        .create(
            &AccountNumber::new("2").unwrap(),
            Versioned::new(DeploymentHistoryRecord {
                deployment_id: "d-0".into(),
                environment_name: "pr1".into(),
                service_name: "TicketKeeper".into(),
                // The guard matches the requested role name, not the
                // slice-suffixed canonical one.
                server_role_name: "Worker".into(),
                status: DeploymentStatus::InProgress,
                start_timestamp: Utc::now() - Duration::minutes(30),
                end_timestamp: None,
                schema_version: HISTORY_SCHEMA_VERSION,
            }),
        )
        .await
        .unwrap();

    let err = fixture.deployer.deploy(command()).await.unwrap_err();
    assert!(matches!(err, Error::DeploymentValidation { .. }));
    assert!(err.to_string().contains("already being deployed"));
}

#[tokio::test]
async fn an_in_progress_record_older_than_the_window_does_not_block() {
    let fixture = fixture();
    fixture
        .history_store
        .create(
            &AccountNumber::new("1").unwrap(),
            Versioned::new(DeploymentHistoryRecord {
                deployment_id: "d-stale".into(),
                environment_name: "pr1".into(),
                service_name: "TicketKeeper".into(),
                server_role_name: "Worker".into(),
                status: DeploymentStatus::InProgress,
                start_timestamp: Utc::now() - Duration::minutes(70),
                end_timestamp: None,
                schema_version: HISTORY_SCHEMA_VERSION,
            }),
        )
        .await
        .unwrap();

    let outcome = fixture.deployer.deploy(command()).await.unwrap();
    assert!(matches!(outcome, DeployOutcome::Accepted(_)));
}

#[tokio::test]
async fn the_same_version_on_another_slice_rejects_acceptance() {
    let fixture = fixture();
    fixture.target_state.install(
        &RoleInstallationKey::new("pr1", "Worker-green", "TicketKeeper", "green"),
        "1.0.0",
    );

    let err = fixture.deployer.deploy(command()).await.unwrap_err();
    assert!(matches!(err, Error::DeploymentValidation { .. }));
    assert!(err.to_string().contains("one colour per environment"));
}

#[tokio::test]
async fn a_different_version_on_another_slice_is_accepted() {
    let fixture = fixture();
    fixture.target_state.install(
        &RoleInstallationKey::new("pr1", "Worker-green", "TicketKeeper", "green"),
        "2.0.0",
    );

    let outcome = fixture.deployer.deploy(command()).await.unwrap();
    assert!(matches!(outcome, DeployOutcome::Accepted(_)));
}

#[tokio::test]
async fn dry_runs_validate_fully_but_dispatch_nothing() {
    let fixture = fixture();
    let mut command = command();
    command.is_dry_run = true;

    let outcome = fixture.deployer.deploy(command).await.unwrap();
    assert_eq!(
        outcome,
        DeployOutcome::dry_run("https://s3.amazonaws.com/uploads/TicketKeeper-1.0.0.zip".into())
    );

    fixture.deployer.quiesce().await;
    assert!(fixture.bus.sent().is_empty(), "nothing was dispatched");
    assert!(fixture.logger.started_records().is_empty());
}

#[tokio::test]
async fn accepted_deployments_return_the_record_and_dispatch_the_workflow() {
    let fixture = fixture();
    let command = command();
    let command_id = command.command_id.clone();

    let outcome = fixture.deployer.deploy(command).await.unwrap();
    let DeployOutcome::Accepted(record) = outcome else {
        panic!("expected acceptance");
    };

    assert_eq!(record.id, command_id);
    assert_eq!(record.status, DeploymentStatus::Started);
    assert_eq!(record.server_role, "Worker-blue");
    assert_eq!(record.server_role_name, "Worker");
    assert_eq!(record.service_slice, "blue");
    assert_eq!(record.account_name, "Prod");
    assert_eq!(record.environment_type_name, "Prod");
    assert_eq!(record.cluster_name, "Tango");

    // Acceptance recorded synchronously.
    assert_eq!(fixture.logger.started_records().len(), 1);

    // The workflow runs detached; wait for it, then check the dispatches.
    fixture.deployer.quiesce().await;
    assert_eq!(
        fixture.bus.sent_names(),
        vec!["ProvideInfrastructure", "PreparePackage", "PushDeployment"]
    );
    assert!(matches!(
        fixture.logger.events().last(),
        Some(LoggedEvent::InProgress { .. })
    ));
}

#[tokio::test]
async fn workflow_failures_reach_the_logger_not_the_caller() {
    let fixture = fixture();
    fixture.bus.fail_on("PushDeployment");

    let outcome = fixture.deployer.deploy(command()).await;
    assert!(outcome.is_ok(), "acceptance already succeeded");

    fixture.deployer.quiesce().await;
    let updates = fixture.logger.status_updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].1.name, DeploymentStatus::Failed);
    let reason: serde_json::Value = serde_json::from_str(&updates[0].1.reason).unwrap();
    assert!(reason["message"].as_str().unwrap().contains("PushDeployment"));
}

#[tokio::test]
async fn a_failing_history_account_does_not_block_acceptance() {
    let fixture = fixture();
    fixture.backend.fail_account(&AccountNumber::new("2").unwrap());

    let outcome = fixture.deployer.deploy(command()).await.unwrap();
    assert!(matches!(outcome, DeployOutcome::Accepted(_)));
}
