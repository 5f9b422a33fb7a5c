//! Audit metadata attached to every stored entity.
//!
//! Each item carries a top-level `version` attribute and an `Audit` block
//! recording who changed it, when, and under which transaction. The audit
//! block's `Version` always mirrors the entity's current version; the store
//! maintains both on every write.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::backend::Item;
use crate::error::{Error, Result};

/// User recorded when a write carries no audit identity.
pub const ANONYMOUS_USER: &str = "anonymous";

/// Audit metadata for one stored entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditBlock {
    /// When the entity last changed.
    #[serde(rename = "LastChanged")]
    pub last_changed: DateTime<Utc>,
    /// Identifier of the transaction that made the change.
    #[serde(rename = "TransactionID")]
    pub transaction_id: String,
    /// The user who made the change.
    #[serde(rename = "User")]
    pub user: String,
    /// Mirror of the entity's current version.
    #[serde(rename = "Version")]
    pub version: u64,
}

impl AuditBlock {
    /// Creates a fresh audit block for `user` with a new transaction id.
    #[must_use]
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            last_changed: Utc::now(),
            transaction_id: ulid::Ulid::new().to_string(),
            user: user.into(),
            version: 0,
        }
    }

    /// Returns this block restamped for a write at `version`.
    ///
    /// The user and transaction id are preserved; the change timestamp and
    /// version mirror are refreshed.
    #[must_use]
    pub fn refreshed(self, version: u64) -> Self {
        Self {
            last_changed: Utc::now(),
            version,
            ..self
        }
    }
}

/// Completes the audit block for a write at `version`.
///
/// A caller-supplied block keeps its user and transaction id; an absent one
/// gets a fresh transaction id attributed to [`ANONYMOUS_USER`].
#[must_use]
pub fn with_audit(audit: Option<AuditBlock>, version: u64) -> AuditBlock {
    audit
        .unwrap_or_else(|| AuditBlock::new(ANONYMOUS_USER))
        .refreshed(version)
}

/// The versioned envelope around a stored record.
///
/// `version` starts at 0 on creation and increments by exactly 1 on each
/// successful `put`. Reads strip the audit block; a read-back entity carries
/// `audit: None` until the next write completes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versioned<T> {
    /// The entity's optimistic-concurrency version.
    #[serde(default)]
    pub version: u64,
    /// Audit metadata; stripped on reads, completed by the store on writes.
    #[serde(rename = "Audit", default, skip_serializing_if = "Option::is_none")]
    pub audit: Option<AuditBlock>,
    /// The domain record itself, flattened into the item's attributes.
    #[serde(flatten)]
    pub record: T,
}

impl<T> Versioned<T> {
    /// Wraps a new record at version 0 with no audit identity.
    #[must_use]
    pub fn new(record: T) -> Self {
        Self {
            version: 0,
            audit: None,
            record,
        }
    }

    /// Attributes subsequent writes of this entity to `user`.
    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.audit = Some(AuditBlock::new(user));
        self
    }
}

impl<T: Serialize> Versioned<T> {
    /// Serializes the envelope to its stored attribute form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] when the record does not serialize
    /// to a JSON object.
    pub fn to_item(&self) -> Result<Item> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => Ok(map),
            Ok(_) => Err(Error::serialization(
                "entity did not serialize to an attribute map",
            )),
            Err(err) => Err(Error::serialization(err.to_string())),
        }
    }
}

impl<T: DeserializeOwned> Versioned<T> {
    /// Deserializes a stored item, stripping its audit metadata.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] when the item does not match the
    /// record type.
    pub fn from_item_stripped(mut item: Item) -> Result<Self> {
        item.remove("Audit");
        serde_json::from_value(serde_json::Value::Object(item))
            .map_err(|err| Error::serialization(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct Upstream {
        environment_name: String,
    }

    #[test]
    fn new_entities_start_at_version_zero() {
        let entity = Versioned::new(Upstream {
            environment_name: "pr1".into(),
        });
        assert_eq!(entity.version, 0);
        assert!(entity.audit.is_none());
    }

    #[test]
    fn with_audit_preserves_caller_identity() {
        let block = with_audit(Some(AuditBlock::new("alice")), 4);
        assert_eq!(block.user, "alice");
        assert_eq!(block.version, 4);
    }

    #[test]
    fn with_audit_defaults_to_anonymous() {
        let block = with_audit(None, 0);
        assert_eq!(block.user, ANONYMOUS_USER);
        assert!(!block.transaction_id.is_empty());
    }

    #[test]
    fn item_round_trip_flattens_the_record() {
        let entity = Versioned::new(Upstream {
            environment_name: "pr1".into(),
        })
        .with_user("bob");
        let item = {
            let mut e = entity;
            e.audit = Some(with_audit(e.audit.take(), 0));
            e.to_item().unwrap()
        };

        assert_eq!(item["EnvironmentName"], "pr1");
        assert_eq!(item["version"], 0);
        assert_eq!(item["Audit"]["User"], "bob");
        assert_eq!(item["Audit"]["Version"], 0);

        let back: Versioned<Upstream> = Versioned::from_item_stripped(item).unwrap();
        assert_eq!(back.record.environment_name, "pr1");
        assert!(back.audit.is_none(), "reads strip audit metadata");
    }
}
