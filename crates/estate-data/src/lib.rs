//! # estate-data
//!
//! Optimistic-concurrency document store for the Estate multi-account AWS
//! estate manager.
//!
//! This crate implements the data-access domain:
//!
//! - **Table Backend**: Conditional-write key/value contract over per-account
//!   tables, with an in-memory implementation for tests
//! - **Versioned Store**: Per-logical-table CRUD with version checks at
//!   commit time, schema validation, and audit metadata
//! - **Key Schema Cache**: Process-lifetime memoization of table key shapes
//! - **Cross-Account Facade**: Fan-out reads over every managed account
//!
//! ## Concurrency Model
//!
//! The store is lock-free/optimistic: conflicting writers are never
//! serialized by a mutex. Conflicts are detected at commit time through
//! conditional writes, and the store never auto-retries — callers re-read
//! and resubmit.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod audit;
pub mod backend;
pub mod cross_account;
pub mod error;
pub mod key_schema;
pub mod memory;
pub mod schema;
pub mod store;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::audit::{AuditBlock, Versioned};
    pub use crate::backend::{Item, ItemKey, ScanPage, TableBackend, WriteCondition, WriteOutcome};
    pub use crate::cross_account::CrossAccountStore;
    pub use crate::error::{Error, Result};
    pub use crate::key_schema::{KeyAttribute, KeySchemaCache, KeyType, TableKeySchema};
    pub use crate::memory::InMemoryTableBackend;
    pub use crate::schema::{PermissiveSchema, SchemaValidator};
    pub use crate::store::{PrefixedTableNames, TableConfig, TableNameResolver, VersionedStore};
}

pub use audit::{AuditBlock, Versioned};
pub use backend::{Item, ItemKey, ScanPage, TableBackend, WriteCondition, WriteOutcome};
pub use cross_account::CrossAccountStore;
pub use error::{Error, Result};
pub use key_schema::{KeyAttribute, KeySchemaCache, KeyType, TableKeySchema};
pub use memory::InMemoryTableBackend;
pub use schema::{PermissiveSchema, SchemaValidator};
pub use store::{PrefixedTableNames, TableConfig, TableNameResolver, VersionedStore};
