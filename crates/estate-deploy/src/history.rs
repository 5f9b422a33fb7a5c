//! Cross-account deployment history queries.
//!
//! The duplicate-in-flight guard needs one specific filtered scan: every
//! "In Progress" deployment of a (environment, service, role) whose
//! effective timestamp falls inside a trailing window. The production
//! implementation fans the scan out across every managed account through
//! the cross-account store facade; a failing account is logged and dropped
//! rather than failing the query.

use async_trait::async_trait;
use chrono::{Duration, Utc};

use estate_data::{CrossAccountStore, TableConfig};

use crate::error::Result;
use crate::record::{DeploymentHistoryRecord, DeploymentStatus, HISTORY_SCHEMA_VERSION};

/// Table configuration of the deployment history store.
#[must_use]
pub fn history_table_config() -> TableConfig {
    TableConfig {
        entity_display_name: "deployment".into(),
        logical_table_name: "DeploymentHistory".into(),
        item_schema: "Deployment".into(),
    }
}

/// Read view of recent deployment history.
#[async_trait]
pub trait DeploymentHistoryView: Send + Sync {
    /// Returns the "In Progress" deployments of `(environment, service,
    /// server_role_name)` whose effective timestamp lies within the trailing
    /// `window`.
    ///
    /// # Errors
    ///
    /// Returns an error when the history store cannot be queried at all;
    /// single-account failures are handled inside the implementation.
    async fn in_flight(
        &self,
        environment: &str,
        service: &str,
        server_role_name: &str,
        window: Duration,
    ) -> Result<Vec<DeploymentHistoryRecord>>;
}

/// History view backed by the cross-account history table.
#[derive(Debug)]
pub struct CrossAccountDeploymentHistory {
    records: CrossAccountStore<DeploymentHistoryRecord>,
}

impl CrossAccountDeploymentHistory {
    /// Creates the view over the cross-account history store.
    #[must_use]
    pub const fn new(records: CrossAccountStore<DeploymentHistoryRecord>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl DeploymentHistoryView for CrossAccountDeploymentHistory {
    async fn in_flight(
        &self,
        environment: &str,
        service: &str,
        server_role_name: &str,
        window: Duration,
    ) -> Result<Vec<DeploymentHistoryRecord>> {
        let date_to = Utc::now();
        let date_from = date_to - window;

        let all = self.records.scan_all().await?;
        Ok(all
            .into_iter()
            .map(|tagged| tagged.value.record)
            .filter(|record| {
                record.status == DeploymentStatus::InProgress
                    && record.schema_version == HISTORY_SCHEMA_VERSION
                    && record.environment_name == environment
                    && record.service_name == service
                    && record.server_role_name == server_role_name
                    && (date_from..=date_to).contains(&record.effective_timestamp())
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use estate_core::{AccountNumber, ManagedAccount, StaticAccountDirectory};
    use estate_data::{
        InMemoryTableBackend, KeySchemaCache, PermissiveSchema, PrefixedTableNames,
        TableKeySchema, Versioned, VersionedStore,
    };
    use std::sync::Arc;

    fn account(id: &str) -> AccountNumber {
        AccountNumber::new(id).unwrap()
    }

    fn fixture() -> (
        Arc<InMemoryTableBackend>,
        Arc<VersionedStore<DeploymentHistoryRecord>>,
        CrossAccountDeploymentHistory,
    ) {
        let backend = Arc::new(
            InMemoryTableBackend::new()
                .with_table("EstateDeploymentHistory", TableKeySchema::hash("DeploymentID")),
        );
        let store = Arc::new(VersionedStore::new(
            history_table_config(),
            &PrefixedTableNames::new("Estate"),
            backend.clone(),
            Arc::new(PermissiveSchema),
            Arc::new(KeySchemaCache::new()),
        ));
        let directory = Arc::new(StaticAccountDirectory::new(vec![
            ManagedAccount::master(account("1")),
            ManagedAccount::child(account("2")),
        ]));
        let history =
            CrossAccountDeploymentHistory::new(CrossAccountStore::new(directory, store.clone()));
        (backend, store, history)
    }

    fn running(id: &str, minutes_ago: i64) -> DeploymentHistoryRecord {
        DeploymentHistoryRecord {
            deployment_id: id.into(),
            environment_name: "pr1".into(),
            service_name: "TicketKeeper".into(),
            server_role_name: "Worker-blue".into(),
            status: DeploymentStatus::InProgress,
            start_timestamp: Utc::now() - Duration::minutes(minutes_ago),
            end_timestamp: None,
            schema_version: HISTORY_SCHEMA_VERSION,
        }
    }

    #[tokio::test]
    async fn finds_recent_in_progress_deployments_across_accounts() {
        let (_backend, store, history) = fixture();
        store
            .create(&account("2"), Versioned::new(running("d-1", 10)))
            .await
            .unwrap();

        let matches = history
            .in_flight("pr1", "TicketKeeper", "Worker-blue", Duration::minutes(65))
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].deployment_id, "d-1");
    }

    #[tokio::test]
    async fn records_older_than_the_window_do_not_match() {
        let (_backend, store, history) = fixture();
        store
            .create(&account("1"), Versioned::new(running("d-old", 70)))
            .await
            .unwrap();

        let matches = history
            .in_flight("pr1", "TicketKeeper", "Worker-blue", Duration::minutes(65))
            .await
            .unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn other_services_roles_and_statuses_do_not_match() {
        let (_backend, store, history) = fixture();
        let mut other_service = running("d-2", 5);
        other_service.service_name = "OtherService".into();
        let mut other_role = running("d-3", 5);
        other_role.server_role_name = "Worker-green".into();
        let mut finished = running("d-4", 5);
        finished.status = DeploymentStatus::Failed;

        for record in [other_service, other_role, finished] {
            store.create(&account("1"), Versioned::new(record)).await.unwrap();
        }

        let matches = history
            .in_flight("pr1", "TicketKeeper", "Worker-blue", Duration::minutes(65))
            .await
            .unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn a_failing_account_is_dropped_not_fatal() {
        let (backend, store, history) = fixture();
        store
            .create(&account("2"), Versioned::new(running("d-1", 10)))
            .await
            .unwrap();
        backend.fail_account(&account("1"));

        let matches = history
            .in_flight("pr1", "TicketKeeper", "Worker-blue", Duration::minutes(65))
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
    }
}
