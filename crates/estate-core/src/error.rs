//! Error types and result aliases for Estate.
//!
//! This module defines the shared error types used across all Estate
//! components. Errors are structured for programmatic handling and include
//! context for debugging.

/// The result type used throughout estate-core.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in core operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input was provided.
    #[error("validation error: {message}")]
    Validation {
        /// Description of what made the input invalid.
        message: String,
    },

    /// The account directory could not be consulted.
    #[error("account directory error: {message}")]
    Directory {
        /// Description of the directory failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An internal error occurred that should not happen in normal operation.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl Error {
    /// Creates a new validation error with the given message.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a new directory error with the given message.
    #[must_use]
    pub fn directory(message: impl Into<String>) -> Self {
        Self::Directory {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new directory error with a source cause.
    #[must_use]
    pub fn directory_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Directory {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;

    #[test]
    fn validation_error_display() {
        let err = Error::validation("account number must not be empty");
        assert!(err.to_string().contains("validation error"));
    }

    #[test]
    fn directory_error_with_source() {
        let source = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
        let err = Error::directory_with_source("failed to list accounts", source);
        assert!(err.to_string().contains("account directory error"));
        assert!(StdError::source(&err).is_some());
    }
}
