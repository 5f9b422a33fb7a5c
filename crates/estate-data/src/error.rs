//! Error types for the data-access domain.

/// The result type used throughout estate-data.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in store operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A `create` found an item with the same key already present.
    #[error(
        "refused to create {entity} {key} because it would overwrite an existing {entity} with the same key"
    )]
    AlreadyExists {
        /// Display name of the entity the table holds.
        entity: String,
        /// The key of the conflicting item, rendered as JSON.
        key: String,
    },

    /// A conditional write found the stored version changed since it was
    /// read. The caller must re-read and resubmit; the store never retries.
    #[error(
        "refused to {operation} {entity} {key} because it has been modified since you last read it"
    )]
    ConcurrentModification {
        /// The operation that was refused (`modify` or `delete`).
        operation: &'static str,
        /// Display name of the entity the table holds.
        entity: String,
        /// The key of the conflicting item, rendered as JSON.
        key: String,
    },

    /// A `delete` was called with a key whose attribute set does not match
    /// the table's key schema exactly.
    #[error("expected argument \"key\" to have exactly these properties: {expected}")]
    InvalidKeyShape {
        /// The table's key attribute names, quoted and comma-joined.
        expected: String,
    },

    /// The entity failed validation against the table's item schema.
    #[error("schema violation: {message}")]
    SchemaViolation {
        /// Description of the violation.
        message: String,
    },

    /// The backing table store failed.
    #[error("backend error: {message}")]
    Backend {
        /// Description of the backend failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An entity could not be serialized to, or deserialized from, its
    /// stored attribute form.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// An error from estate-core.
    #[error("core error: {0}")]
    Core(#[from] estate_core::Error),
}

impl Error {
    /// Creates a new backend error.
    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new backend error with a source cause.
    #[must_use]
    pub fn backend_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Backend {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new serialization error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Returns true if this is a commit-time conflict (`AlreadyExists` or
    /// `ConcurrentModification`).
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::AlreadyExists { .. } | Self::ConcurrentModification { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_classification() {
        let err = Error::AlreadyExists {
            entity: "deployment map".into(),
            key: "{\"MapName\":\"m1\"}".into(),
        };
        assert!(err.is_conflict());
        assert!(!Error::backend("down").is_conflict());
    }

    #[test]
    fn concurrent_modification_display_names_the_entity_and_key() {
        let err = Error::ConcurrentModification {
            operation: "modify",
            entity: "load balancer setting".into(),
            key: "{\"EnvironmentName\":\"pr1\"}".into(),
        }
        .to_string();
        assert!(err.contains("load balancer setting"));
        assert!(err.contains("pr1"));
    }
}
