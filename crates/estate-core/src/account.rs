//! Managed AWS accounts and the directory that supplies them.
//!
//! An Estate installation manages a fleet of AWS accounts: one master account
//! plus any number of child accounts. The set is owned by an external
//! directory (resolved from configuration at the edge of the system); this
//! module defines the snapshot type and the seam through which the fan-out
//! executor obtains it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// A unique identifier for a managed AWS account.
///
/// Account numbers must be non-empty and numeric. Production AWS account ids
/// are twelve digits; shorter ids are accepted so fixtures stay readable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountNumber(String);

impl AccountNumber {
    /// Creates a new account number after validating the format.
    ///
    /// # Errors
    ///
    /// Returns an error if the account number is empty or contains a
    /// non-digit character.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Creates an account number without validation.
    ///
    /// Intended for ids that have already been validated (e.g. read back
    /// from storage).
    #[must_use]
    pub fn new_unchecked(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the account number as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(id: &str) -> Result<()> {
        if id.is_empty() {
            return Err(Error::validation("account number cannot be empty"));
        }
        if !id.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::validation(format!(
                "account number '{id}' contains non-digit characters"
            )));
        }
        Ok(())
    }
}

impl fmt::Display for AccountNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for AccountNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// An immutable snapshot of one managed account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedAccount {
    /// The account's AWS account number.
    pub account_number: AccountNumber,
    /// Whether this is the master account of the estate.
    pub is_master: bool,
}

impl ManagedAccount {
    /// Creates a child (non-master) account snapshot.
    #[must_use]
    pub const fn child(account_number: AccountNumber) -> Self {
        Self {
            account_number,
            is_master: false,
        }
    }

    /// Creates the master account snapshot.
    #[must_use]
    pub const fn master(account_number: AccountNumber) -> Self {
        Self {
            account_number,
            is_master: true,
        }
    }
}

/// Directory of the accounts currently under management.
///
/// The account set is owned externally (configuration, a registry table);
/// this trait is the seam the fan-out executor reads it through. Each call
/// returns a fresh snapshot; membership changes between calls are allowed.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Lists every managed account.
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying directory cannot be consulted.
    /// This failure is *not* isolated per account: callers cannot fan out
    /// without a member list.
    async fn list_accounts(&self) -> Result<Vec<ManagedAccount>>;
}

/// A fixed, in-memory account directory.
///
/// Suitable for tests and for deployments whose account set is baked into
/// configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticAccountDirectory {
    accounts: Vec<ManagedAccount>,
}

impl StaticAccountDirectory {
    /// Creates a directory over the given accounts.
    #[must_use]
    pub fn new(accounts: Vec<ManagedAccount>) -> Self {
        Self { accounts }
    }
}

#[async_trait]
impl AccountDirectory for StaticAccountDirectory {
    async fn list_accounts(&self) -> Result<Vec<ManagedAccount>> {
        Ok(self.accounts.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_account_numbers() {
        assert!(AccountNumber::new("123456789012").is_ok());
        assert!(AccountNumber::new("1").is_ok());
    }

    #[test]
    fn invalid_account_numbers() {
        assert!(AccountNumber::new("").is_err());
        assert!(AccountNumber::new("12ab").is_err());
        assert!(AccountNumber::new("123 456").is_err());
    }

    #[tokio::test]
    async fn static_directory_lists_accounts() {
        let directory = StaticAccountDirectory::new(vec![
            ManagedAccount::master(AccountNumber::new("1").unwrap()),
            ManagedAccount::child(AccountNumber::new("2").unwrap()),
        ]);
        let accounts = directory.list_accounts().await.unwrap();
        assert_eq!(accounts.len(), 2);
        assert!(accounts[0].is_master);
    }
}
