//! Per-logical-table versioned store.
//!
//! [`VersionedStore`] gives each logical table a typed CRUD surface with
//! optimistic concurrency. Writes are schema-validated, audited, and
//! committed through conditional writes; conflicts come back as domain
//! errors naming the entity and key, and are never retried here.
//!
//! Key extraction is schema-driven: the table's key attribute names are
//! described by the backend (and memoized) because the key shape is not
//! statically known to the store.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::Arc;

use estate_core::AccountNumber;

use crate::audit::{with_audit, Versioned};
use crate::backend::{display_key, Item, ItemKey, TableBackend, WriteCondition, WriteOutcome};
use crate::error::{Error, Result};
use crate::key_schema::{KeySchemaCache, TableKeySchema};
use crate::schema::SchemaValidator;

/// Configuration of one logical table.
#[derive(Debug, Clone)]
pub struct TableConfig {
    /// Human-readable entity name used in error text.
    pub entity_display_name: String,
    /// Logical table name, resolved to a physical name externally.
    pub logical_table_name: String,
    /// Identifier of the item schema entities are validated against.
    pub item_schema: String,
}

/// Resolves logical table names to the physical names of the deployment.
///
/// Physical naming conventions are owned outside this crate; the store only
/// needs the mapping.
pub trait TableNameResolver: Send + Sync {
    /// Returns the physical table name for `logical_table_name`.
    fn table_name(&self, logical_table_name: &str) -> String;
}

/// Name resolver that applies a fixed installation prefix.
#[derive(Debug, Clone)]
pub struct PrefixedTableNames {
    prefix: String,
}

impl PrefixedTableNames {
    /// Creates a resolver with the given prefix.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl TableNameResolver for PrefixedTableNames {
    fn table_name(&self, logical_table_name: &str) -> String {
        format!("{}{logical_table_name}", self.prefix)
    }
}

/// Typed, optimistic-concurrency CRUD over one logical table.
///
/// Version discipline: `create` writes version 0; each successful `put`
/// increments the version by exactly 1; the audit block's version mirror is
/// maintained on every write.
///
/// `put` doubles as an upsert: its condition is "stored version matches the
/// version the caller read, OR no item exists yet", so putting a never-read
/// entity silently creates it. That matches the original store's behavior
/// and is deliberate; use `create` when creation must be exclusive.
pub struct VersionedStore<T> {
    backend: Arc<dyn TableBackend>,
    validator: Arc<dyn SchemaValidator>,
    key_schemas: Arc<KeySchemaCache>,
    entity_display_name: String,
    table_name: String,
    item_schema: String,
    _record: PhantomData<fn() -> T>,
}

impl<T> std::fmt::Debug for VersionedStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionedStore")
            .field("entity_display_name", &self.entity_display_name)
            .field("table_name", &self.table_name)
            .field("item_schema", &self.item_schema)
            .finish_non_exhaustive()
    }
}

impl<T> VersionedStore<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    /// Creates a store for one logical table.
    #[must_use]
    pub fn new(
        config: TableConfig,
        names: &dyn TableNameResolver,
        backend: Arc<dyn TableBackend>,
        validator: Arc<dyn SchemaValidator>,
        key_schemas: Arc<KeySchemaCache>,
    ) -> Self {
        let table_name = names.table_name(&config.logical_table_name);
        Self {
            backend,
            validator,
            key_schemas,
            entity_display_name: config.entity_display_name,
            table_name,
            item_schema: config.item_schema,
            _record: PhantomData,
        }
    }

    /// Returns the physical table name this store writes to.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Reads every item in `account`'s table, aggregating pages internally.
    /// Audit metadata is stripped from the results.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend fails or an item does not match the
    /// record type.
    pub async fn scan(&self, account: &AccountNumber) -> Result<Vec<Versioned<T>>> {
        let mut entities = Vec::new();
        let mut start_key = None;
        loop {
            let page = self
                .backend
                .scan_page(account, &self.table_name, start_key)
                .await?;
            for item in page.items {
                entities.push(Versioned::from_item_stripped(item)?);
            }
            match page.last_evaluated_key {
                Some(next) => start_key = Some(next),
                None => return Ok(entities),
            }
        }
    }

    /// Reads a single item by key. Audit metadata is stripped.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend fails or the item does not match
    /// the record type.
    pub async fn get(
        &self,
        account: &AccountNumber,
        key: &ItemKey,
    ) -> Result<Option<Versioned<T>>> {
        self.backend
            .get_item(account, &self.table_name, key)
            .await?
            .map(Versioned::from_item_stripped)
            .transpose()
    }

    /// Creates a new entity at version 0.
    ///
    /// The write is conditioned on no item with the same key existing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyExists`] when the key is already present,
    /// [`Error::SchemaViolation`] when the entity fails validation, or a
    /// backend error.
    pub async fn create(&self, account: &AccountNumber, mut entity: Versioned<T>) -> Result<()> {
        entity.version = 0;
        entity.audit = Some(with_audit(entity.audit.take(), 0));
        let item = entity.to_item()?;
        self.validator.conform(&self.item_schema, &item).await?;

        let key = self.extract_key(account, &item).await?;
        let outcome = self
            .backend
            .put_item(
                account,
                &self.table_name,
                key.clone(),
                item,
                WriteCondition::DoesNotExist,
            )
            .await?;
        match outcome {
            WriteOutcome::Applied => Ok(()),
            WriteOutcome::ConditionFailed => Err(Error::AlreadyExists {
                entity: self.entity_display_name.clone(),
                key: display_key(&key),
            }),
        }
    }

    /// Writes an entity read at some version, committing at that version + 1.
    ///
    /// The write is conditioned on the stored version still being the one
    /// the caller read — or on no item existing yet (upsert-create, see the
    /// type-level docs). On conflict the caller must re-read and resubmit;
    /// the store never retries.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConcurrentModification`] on a version conflict,
    /// [`Error::SchemaViolation`] when the entity fails validation, or a
    /// backend error.
    pub async fn put(&self, account: &AccountNumber, mut entity: Versioned<T>) -> Result<()> {
        let read_version = entity.version;
        let next_version = read_version + 1;
        entity.version = next_version;
        entity.audit = Some(with_audit(entity.audit.take(), next_version));
        let item = entity.to_item()?;
        self.validator.conform(&self.item_schema, &item).await?;

        let key = self.extract_key(account, &item).await?;
        let outcome = self
            .backend
            .put_item(
                account,
                &self.table_name,
                key.clone(),
                item,
                WriteCondition::VersionMatchesOrDoesNotExist(read_version),
            )
            .await?;
        match outcome {
            WriteOutcome::Applied => Ok(()),
            WriteOutcome::ConditionFailed => Err(Error::ConcurrentModification {
                operation: "modify",
                entity: self.entity_display_name.clone(),
                key: display_key(&key),
            }),
        }
    }

    /// Deletes an item by key.
    ///
    /// The key's attribute set must match the table's key schema exactly.
    /// When `expected_version` is supplied the delete is conditioned on the
    /// stored version matching it; otherwise the delete is unconditional.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidKeyShape`] when the key shape is wrong,
    /// [`Error::ConcurrentModification`] on a version conflict, or a
    /// backend error.
    pub async fn delete(
        &self,
        account: &AccountNumber,
        key: &ItemKey,
        expected_version: Option<u64>,
    ) -> Result<()> {
        let schema = self
            .key_schemas
            .get_or_describe(self.backend.as_ref(), account, &self.table_name)
            .await?;
        self.check_key_shape(&schema, key)?;

        let condition = expected_version.map_or(WriteCondition::None, WriteCondition::VersionMatches);
        let outcome = self
            .backend
            .delete_item(account, &self.table_name, key, condition)
            .await?;
        match outcome {
            WriteOutcome::Applied => Ok(()),
            WriteOutcome::ConditionFailed => Err(Error::ConcurrentModification {
                operation: "delete",
                entity: self.entity_display_name.clone(),
                key: display_key(key),
            }),
        }
    }

    /// Extracts the item's key attributes per the table's key schema.
    async fn extract_key(&self, account: &AccountNumber, item: &Item) -> Result<ItemKey> {
        let schema = self
            .key_schemas
            .get_or_describe(self.backend.as_ref(), account, &self.table_name)
            .await?;
        let mut key = ItemKey::new();
        for name in schema.attribute_names() {
            let value = item.get(name).ok_or_else(|| {
                Error::serialization(format!(
                    "{} entity is missing key attribute '{name}'",
                    self.entity_display_name
                ))
            })?;
            key.insert(name.to_string(), value.clone());
        }
        Ok(key)
    }

    fn check_key_shape(&self, schema: &TableKeySchema, key: &ItemKey) -> Result<()> {
        let mut expected = schema.attribute_names();
        expected.sort_unstable();
        let actual: Vec<&str> = key.keys().map(String::as_str).collect();
        if expected != actual {
            let expected = expected
                .iter()
                .map(|name| format!("\"{name}\""))
                .collect::<Vec<_>>()
                .join(", ");
            return Err(Error::InvalidKeyShape { expected });
        }
        Ok(())
    }
}
