//! Conditional-write table backend contract.
//!
//! This module defines the key/value contract the versioned store is built
//! on. The backend exposes per-account tables of attribute-map items with
//! DynamoDB-style semantics:
//!
//! - Conditional writes with preconditions evaluated atomically at commit
//! - Paged scans with an opaque continuation key
//! - Key shapes described by the backend, not statically known to callers
//!
//! A precondition failure is a *normal result* at this layer
//! ([`WriteOutcome::ConditionFailed`]), never an error; the store translates
//! it into the appropriate domain conflict.

use async_trait::async_trait;
use std::collections::BTreeMap;

use estate_core::AccountNumber;

use crate::error::Result;
use crate::key_schema::TableKeySchema;

/// A stored item: attribute name to attribute value.
pub type Item = serde_json::Map<String, serde_json::Value>;

/// An item key: key attribute name to value, ordered for canonical display.
pub type ItemKey = BTreeMap<String, serde_json::Value>;

/// Precondition for conditional writes.
///
/// Version preconditions compare against the stored item's audit version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteCondition {
    /// Write unconditionally.
    None,
    /// Write only if no item with the same key exists.
    DoesNotExist,
    /// Write only if the stored version matches.
    VersionMatches(u64),
    /// Write only if the stored version matches, or no item exists yet.
    VersionMatchesOrDoesNotExist(u64),
}

/// Result of a conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The write was applied.
    Applied,
    /// The precondition did not hold; nothing was written.
    ConditionFailed,
}

impl WriteOutcome {
    /// Returns true if the write was applied.
    #[must_use]
    pub const fn is_applied(self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// One page of a table scan.
#[derive(Debug, Clone, Default)]
pub struct ScanPage {
    /// The items on this page.
    pub items: Vec<Item>,
    /// Continuation key for the next page; `None` when the scan is complete.
    pub last_evaluated_key: Option<ItemKey>,
}

/// Table storage contract.
///
/// Implementations target one physical table store per account (DynamoDB in
/// production, [`crate::memory::InMemoryTableBackend`] in tests).
///
/// ## Thread Safety
///
/// All methods are `Send + Sync` to support concurrent access from fan-out
/// tasks.
#[async_trait]
pub trait TableBackend: Send + Sync + 'static {
    /// Describes the key schema of `table` in `account`.
    ///
    /// Callers should go through [`crate::key_schema::KeySchemaCache`] —
    /// the shape of a table does not change within a process lifetime.
    async fn describe_key_schema(
        &self,
        account: &AccountNumber,
        table: &str,
    ) -> Result<TableKeySchema>;

    /// Reads one page of a full-table scan.
    ///
    /// Pass the previous page's `last_evaluated_key` to continue.
    async fn scan_page(
        &self,
        account: &AccountNumber,
        table: &str,
        start_key: Option<ItemKey>,
    ) -> Result<ScanPage>;

    /// Reads a single item by key.
    async fn get_item(
        &self,
        account: &AccountNumber,
        table: &str,
        key: &ItemKey,
    ) -> Result<Option<Item>>;

    /// Writes an item, subject to `condition`.
    ///
    /// Returns [`WriteOutcome::ConditionFailed`] when the precondition does
    /// not hold — that is a normal result, not an error.
    async fn put_item(
        &self,
        account: &AccountNumber,
        table: &str,
        key: ItemKey,
        item: Item,
        condition: WriteCondition,
    ) -> Result<WriteOutcome>;

    /// Deletes an item by key, subject to `condition`.
    ///
    /// An unconditional delete of a missing item succeeds (idempotent); a
    /// version-conditioned delete of a missing item is a condition failure.
    async fn delete_item(
        &self,
        account: &AccountNumber,
        table: &str,
        key: &ItemKey,
        condition: WriteCondition,
    ) -> Result<WriteOutcome>;
}

/// Renders an item key as canonical JSON for error text and map keys.
///
/// `ItemKey` is an ordered map, so the rendering is deterministic.
#[must_use]
pub fn display_key(key: &ItemKey) -> String {
    serde_json::to_string(key).unwrap_or_else(|_| format!("{key:?}"))
}
