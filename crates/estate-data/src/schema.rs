//! Item schema validation seam.
//!
//! Schema validation internals (JSON-schema compilation, conformance rules)
//! live outside this crate. The store only needs a conformance check it can
//! run before every write; violations block the write with
//! [`Error::SchemaViolation`](crate::error::Error::SchemaViolation).

use async_trait::async_trait;

use crate::backend::Item;
use crate::error::Result;

/// Validates items against a named schema before they are written.
#[async_trait]
pub trait SchemaValidator: Send + Sync {
    /// Checks that `item` conforms to the schema identified by `schema_id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaViolation`](crate::error::Error::SchemaViolation)
    /// when the item does not conform.
    async fn conform(&self, schema_id: &str, item: &Item) -> Result<()>;
}

/// A validator that accepts every item.
///
/// For tests and for tables whose schema enforcement happens elsewhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissiveSchema;

#[async_trait]
impl SchemaValidator for PermissiveSchema {
    async fn conform(&self, _schema_id: &str, _item: &Item) -> Result<()> {
        Ok(())
    }
}
