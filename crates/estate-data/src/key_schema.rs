//! Table key schemas and their process-lifetime cache.
//!
//! The key shape of a table is not statically known to the store: it must be
//! described by the backend before a conditional expression or key extraction
//! can be built. Descriptions are memoized per `(account, table)` for the
//! process lifetime — there is no expiry or invalidation path, so a key
//! schema change requires a process restart.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use estate_core::AccountNumber;

use crate::backend::TableBackend;
use crate::error::{Error, Result};

/// The role a key attribute plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyType {
    /// Partition (hash) key attribute.
    Hash,
    /// Sort (range) key attribute.
    Range,
}

/// One attribute of a table's key schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeyAttribute {
    /// The attribute's name.
    pub attribute_name: String,
    /// Whether the attribute is the hash or range component.
    pub key_type: KeyType,
}

/// The ordered key schema of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableKeySchema {
    attributes: Vec<KeyAttribute>,
}

impl TableKeySchema {
    /// Creates a schema from its ordered attributes.
    #[must_use]
    pub fn new(attributes: Vec<KeyAttribute>) -> Self {
        Self { attributes }
    }

    /// Creates a hash-only key schema.
    #[must_use]
    pub fn hash(attribute_name: impl Into<String>) -> Self {
        Self::new(vec![KeyAttribute {
            attribute_name: attribute_name.into(),
            key_type: KeyType::Hash,
        }])
    }

    /// Creates a hash-and-range key schema.
    #[must_use]
    pub fn hash_and_range(hash: impl Into<String>, range: impl Into<String>) -> Self {
        Self::new(vec![
            KeyAttribute {
                attribute_name: hash.into(),
                key_type: KeyType::Hash,
            },
            KeyAttribute {
                attribute_name: range.into(),
                key_type: KeyType::Range,
            },
        ])
    }

    /// Returns the key attribute names in schema order.
    #[must_use]
    pub fn attribute_names(&self) -> Vec<&str> {
        self.attributes
            .iter()
            .map(|attr| attr.attribute_name.as_str())
            .collect()
    }

    /// Returns the name of the hash key attribute.
    ///
    /// # Errors
    ///
    /// Returns an error when the schema has no hash attribute, which would
    /// mean the backing table description is malformed.
    pub fn hash_key_name(&self) -> Result<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.key_type == KeyType::Hash)
            .map(|attr| attr.attribute_name.as_str())
            .ok_or_else(|| Error::backend("table key schema has no hash key attribute"))
    }
}

fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::backend("key schema cache lock poisoned")
}

/// Process-lifetime memo of table key schemas.
///
/// Keyed by `(account, table)`. Unbounded and never invalidated: the set of
/// managed tables is small and fixed, and key schemas do not change in place.
/// Share one instance across every store in the process.
///
/// Concurrent misses for the same entry may each describe the table; the
/// descriptions are identical, so last-write-wins insertion is harmless.
#[derive(Debug, Default)]
pub struct KeySchemaCache {
    inner: RwLock<HashMap<(AccountNumber, String), Arc<TableKeySchema>>>,
}

impl KeySchemaCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the key schema for `(account, table)`, describing the table
    /// through `backend` on first use.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend cannot describe the table.
    pub async fn get_or_describe(
        &self,
        backend: &dyn TableBackend,
        account: &AccountNumber,
        table: &str,
    ) -> Result<Arc<TableKeySchema>> {
        let cache_key = (account.clone(), table.to_string());
        {
            let cache = self.inner.read().map_err(poison_err)?;
            if let Some(schema) = cache.get(&cache_key) {
                return Ok(Arc::clone(schema));
            }
        }

        let schema = Arc::new(backend.describe_key_schema(account, table).await?);
        let mut cache = self.inner.write().map_err(poison_err)?;
        Ok(Arc::clone(
            cache.entry(cache_key).or_insert_with(|| Arc::clone(&schema)),
        ))
    }

    /// Returns the number of memoized entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().map(|cache| cache.len()).unwrap_or(0)
    }

    /// Returns true if nothing has been memoized yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
