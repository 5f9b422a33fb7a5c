//! In-memory table backend for testing.
//!
//! Provides [`InMemoryTableBackend`], a thread-safe implementation of the
//! [`TableBackend`] trait suitable for testing and development.
//!
//! ## Limitations
//!
//! - **NOT suitable for production**: no durability, no cross-process
//!   coordination
//! - **Single-process only**: state is not shared across process boundaries
//!
//! Preconditions are evaluated under the write lock, so conditional writes
//! are atomic exactly as they are against the real table store. The page
//! size is configurable so scan-pagination aggregation is testable, and
//! whole accounts can be failed to exercise fan-out bulkheads.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use estate_core::AccountNumber;

use crate::backend::{
    display_key, Item, ItemKey, ScanPage, TableBackend, WriteCondition, WriteOutcome,
};
use crate::error::{Error, Result};
use crate::key_schema::TableKeySchema;

const DEFAULT_PAGE_SIZE: usize = 100;

/// Converts a lock poison error to a backend error.
fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::backend("lock poisoned")
}

#[derive(Debug, Clone)]
struct StoredRow {
    key: ItemKey,
    item: Item,
}

/// In-memory table backend for tests.
///
/// ## Example
///
/// ```rust
/// use estate_data::{InMemoryTableBackend, TableKeySchema};
///
/// let backend = InMemoryTableBackend::new()
///     .with_table("Environments", TableKeySchema::hash("EnvironmentName"));
/// ```
#[derive(Debug)]
pub struct InMemoryTableBackend {
    schemas: HashMap<String, TableKeySchema>,
    rows: RwLock<HashMap<(AccountNumber, String), BTreeMap<String, StoredRow>>>,
    failed_accounts: RwLock<HashSet<AccountNumber>>,
    describe_calls: AtomicU32,
    page_size: usize,
}

impl Default for InMemoryTableBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTableBackend {
    /// Creates an empty backend with no registered tables.
    #[must_use]
    pub fn new() -> Self {
        Self {
            schemas: HashMap::new(),
            rows: RwLock::new(HashMap::new()),
            failed_accounts: RwLock::new(HashSet::new()),
            describe_calls: AtomicU32::new(0),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Registers a table and its key schema in every account.
    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>, schema: TableKeySchema) -> Self {
        self.schemas.insert(table.into(), schema);
        self
    }

    /// Overrides the scan page size (default 100).
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Fails every subsequent operation against `account`.
    pub fn fail_account(&self, account: &AccountNumber) {
        if let Ok(mut failed) = self.failed_accounts.write() {
            failed.insert(account.clone());
        }
    }

    /// Returns how many times a table description was served.
    #[must_use]
    pub fn describe_calls(&self) -> u32 {
        self.describe_calls.load(Ordering::SeqCst)
    }

    /// Returns every item currently stored in `(account, table)`, in key
    /// order. Test assertion helper.
    #[must_use]
    pub fn items(&self, account: &AccountNumber, table: &str) -> Vec<Item> {
        self.rows
            .read()
            .map(|rows| {
                rows.get(&(account.clone(), table.to_string()))
                    .map(|table_rows| table_rows.values().map(|row| row.item.clone()).collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    fn check_account(&self, account: &AccountNumber) -> Result<()> {
        let failed = self.failed_accounts.read().map_err(poison_err)?;
        if failed.contains(account) {
            return Err(Error::backend(format!(
                "injected failure for account {account}"
            )));
        }
        Ok(())
    }

    fn schema_for(&self, table: &str) -> Result<&TableKeySchema> {
        self.schemas
            .get(table)
            .ok_or_else(|| Error::backend(format!("table not found: {table}")))
    }
}

/// Reads the stored version of an item.
///
/// Conditional expressions compare against the audit mirror, with the
/// top-level `version` attribute as a fallback for items written before
/// their audit block was completed.
fn stored_version(item: &Item) -> Option<u64> {
    item.get("Audit")
        .and_then(|audit| audit.get("Version"))
        .or_else(|| item.get("version"))
        .and_then(serde_json::Value::as_u64)
}

fn condition_holds(existing: Option<&Item>, condition: WriteCondition) -> bool {
    match condition {
        WriteCondition::None => true,
        WriteCondition::DoesNotExist => existing.is_none(),
        WriteCondition::VersionMatches(version) => {
            existing.is_some_and(|item| stored_version(item) == Some(version))
        }
        WriteCondition::VersionMatchesOrDoesNotExist(version) => existing
            .map_or(true, |item| stored_version(item) == Some(version)),
    }
}

#[async_trait]
impl TableBackend for InMemoryTableBackend {
    async fn describe_key_schema(
        &self,
        account: &AccountNumber,
        table: &str,
    ) -> Result<TableKeySchema> {
        self.check_account(account)?;
        let schema = self.schema_for(table)?.clone();
        self.describe_calls.fetch_add(1, Ordering::SeqCst);
        Ok(schema)
    }

    async fn scan_page(
        &self,
        account: &AccountNumber,
        table: &str,
        start_key: Option<ItemKey>,
    ) -> Result<ScanPage> {
        self.check_account(account)?;
        self.schema_for(table)?;

        let rows = self.rows.read().map_err(poison_err)?;
        let Some(table_rows) = rows.get(&(account.clone(), table.to_string())) else {
            return Ok(ScanPage::default());
        };

        let start = start_key.as_ref().map(display_key);
        let mut remaining = table_rows
            .iter()
            .filter(|(canonical, _)| start.as_ref().is_none_or(|s| canonical.as_str() > s.as_str()));

        let mut page = ScanPage::default();
        for (_, row) in remaining.by_ref().take(self.page_size) {
            page.items.push(row.item.clone());
        }
        if remaining.next().is_some() {
            if let Some(last) = page.items.last() {
                let schema = self.schema_for(table)?;
                let mut key = ItemKey::new();
                for name in schema.attribute_names() {
                    if let Some(value) = last.get(name) {
                        key.insert(name.to_string(), value.clone());
                    }
                }
                page.last_evaluated_key = Some(key);
            }
        }
        Ok(page)
    }

    async fn get_item(
        &self,
        account: &AccountNumber,
        table: &str,
        key: &ItemKey,
    ) -> Result<Option<Item>> {
        self.check_account(account)?;
        self.schema_for(table)?;

        let rows = self.rows.read().map_err(poison_err)?;
        Ok(rows
            .get(&(account.clone(), table.to_string()))
            .and_then(|table_rows| table_rows.get(&display_key(key)))
            .map(|row| row.item.clone()))
    }

    async fn put_item(
        &self,
        account: &AccountNumber,
        table: &str,
        key: ItemKey,
        item: Item,
        condition: WriteCondition,
    ) -> Result<WriteOutcome> {
        self.check_account(account)?;
        self.schema_for(table)?;

        let mut rows = self.rows.write().map_err(poison_err)?;
        let table_rows = rows
            .entry((account.clone(), table.to_string()))
            .or_default();
        let canonical = display_key(&key);

        if !condition_holds(table_rows.get(&canonical).map(|row| &row.item), condition) {
            return Ok(WriteOutcome::ConditionFailed);
        }
        table_rows.insert(canonical, StoredRow { key, item });
        Ok(WriteOutcome::Applied)
    }

    async fn delete_item(
        &self,
        account: &AccountNumber,
        table: &str,
        key: &ItemKey,
        condition: WriteCondition,
    ) -> Result<WriteOutcome> {
        self.check_account(account)?;
        self.schema_for(table)?;

        let mut rows = self.rows.write().map_err(poison_err)?;
        let table_rows = rows
            .entry((account.clone(), table.to_string()))
            .or_default();
        let canonical = display_key(key);

        match condition {
            WriteCondition::None => {
                table_rows.remove(&canonical);
                Ok(WriteOutcome::Applied)
            }
            _ => {
                if condition_holds(table_rows.get(&canonical).map(|row| &row.item), condition) {
                    table_rows.remove(&canonical);
                    Ok(WriteOutcome::Applied)
                } else {
                    Ok(WriteOutcome::ConditionFailed)
                }
            }
        }
    }
}
