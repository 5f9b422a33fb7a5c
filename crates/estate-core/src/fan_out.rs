//! Scatter/gather execution across every managed account.
//!
//! Cross-account reads and writes issue the same operation against each
//! account in the estate and aggregate the per-account outcomes. The
//! executor provides bulkhead isolation: one account's failure never cancels,
//! blocks, or excludes another account's result.
//!
//! ## Design Principles
//!
//! - **One slot per account**: the result list has exactly one entry per
//!   managed account, success or failure, in input order
//! - **Master first**: accounts are submitted with the master account first.
//!   This is purely for result-array determinism; dispatch is fully
//!   concurrent regardless
//! - **Failure is data**: a failing operation is captured in its slot, never
//!   propagated by `each_account` itself

use std::future::Future;

use futures::future::join_all;

use crate::account::{AccountDirectory, AccountNumber};
use crate::error::Result;

/// The outcome of one operation against one account.
#[derive(Debug)]
pub enum FanOutResult<T, E> {
    /// The operation resolved a value for this account.
    Value {
        /// The account the operation ran against.
        account: AccountNumber,
        /// The resolved value.
        value: T,
    },
    /// The operation failed for this account.
    Error {
        /// The account the operation ran against.
        account: AccountNumber,
        /// The captured failure.
        error: E,
    },
}

impl<T, E> FanOutResult<T, E> {
    /// Returns the account this result belongs to.
    #[must_use]
    pub const fn account(&self) -> &AccountNumber {
        match self {
            Self::Value { account, .. } | Self::Error { account, .. } => account,
        }
    }

    /// Returns true if this slot captured a failure.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// A successful per-account value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountValue<T> {
    /// The account the value originated from.
    pub account: AccountNumber,
    /// The value itself.
    pub value: T,
}

/// Invokes `op` once per managed account, concurrently, and collects one
/// result slot per account.
///
/// Accounts are submitted master-first so that result-array positions are
/// deterministic; completion order is unspecified and has no effect on the
/// output. A failure in one account's operation is captured in that
/// account's slot and never affects the others.
///
/// # Errors
///
/// Fails only when the account directory itself cannot be listed. Operation
/// failures are returned in the per-account slots, never as an error of the
/// whole call.
pub async fn each_account<F, Fut, T, E>(
    directory: &dyn AccountDirectory,
    op: F,
) -> Result<Vec<FanOutResult<T, E>>>
where
    F: Fn(AccountNumber) -> Fut,
    Fut: Future<Output = std::result::Result<T, E>> + Send,
    T: Send,
    E: Send,
{
    let mut accounts = directory.list_accounts().await?;
    accounts.sort_by_key(|account| !account.is_master);

    let tasks = accounts.into_iter().map(|account| {
        let number = account.account_number;
        let fut = op(number.clone());
        async move {
            match fut.await {
                Ok(value) => FanOutResult::Value {
                    account: number,
                    value,
                },
                Err(error) => FanOutResult::Error {
                    account: number,
                    error,
                },
            }
        }
    });

    Ok(join_all(tasks).await)
}

/// Drops error slots from `results`, logging each as a warning that names
/// the offending account.
pub fn ignore_errors<T, E>(results: Vec<FanOutResult<T, E>>) -> Vec<AccountValue<T>>
where
    E: std::fmt::Display,
{
    results
        .into_iter()
        .filter_map(|result| match result {
            FanOutResult::Value { account, value } => Some(AccountValue { account, value }),
            FanOutResult::Error { account, error } => {
                tracing::warn!(account = %account, error = %error, "failure in account");
                None
            }
        })
        .collect()
}

/// Surfaces the first error slot as a failure of the whole aggregate;
/// otherwise unwraps to a plain value list in slot order.
///
/// # Errors
///
/// Returns the first captured per-account error, if any.
pub fn throw_errors<T, E>(results: Vec<FanOutResult<T, E>>) -> std::result::Result<Vec<T>, E> {
    results
        .into_iter()
        .map(|result| match result {
            FanOutResult::Value { value, .. } => Ok(value),
            FanOutResult::Error { error, .. } => Err(error),
        })
        .collect()
}

/// Flattens list-valued per-account results into one list, tagging every
/// element with its originating account.
#[must_use]
pub fn flatten<T>(results: Vec<AccountValue<Vec<T>>>) -> Vec<AccountValue<T>> {
    results
        .into_iter()
        .flat_map(|AccountValue { account, value }| {
            value.into_iter().map(move |v| AccountValue {
                account: account.clone(),
                value: v,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{ManagedAccount, StaticAccountDirectory};
    use crate::error::Error;
    use std::sync::Arc;
    use tokio::sync::Barrier;

    fn account(id: &str) -> AccountNumber {
        AccountNumber::new(id).unwrap()
    }

    fn directory() -> StaticAccountDirectory {
        // Master listed last on purpose: each_account must move it first.
        StaticAccountDirectory::new(vec![
            ManagedAccount::child(account("2")),
            ManagedAccount::child(account("3")),
            ManagedAccount::master(account("1")),
        ])
    }

    #[tokio::test]
    async fn returns_one_value_slot_per_account_master_first() {
        let results = each_account(&directory(), |acc| async move {
            Ok::<_, Error>(format!("seen-{acc}"))
        })
        .await
        .unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].account(), &account("1"));
        assert_eq!(results[1].account(), &account("2"));
        assert_eq!(results[2].account(), &account("3"));
        assert!(results.iter().all(|r| !r.is_error()));
    }

    #[tokio::test]
    async fn completion_order_does_not_affect_slot_order() {
        // The master account finishes last; its slot is still first.
        let results = each_account(&directory(), |acc| async move {
            let delay = if acc.as_str() == "1" { 20 } else { 1 };
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
            Ok::<_, Error>(acc.to_string())
        })
        .await
        .unwrap();

        let order: Vec<_> = results.iter().map(|r| r.account().to_string()).collect();
        assert_eq!(order, vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn dispatch_is_concurrent_across_accounts() {
        // Every operation waits for all the others; this only resolves when
        // the three run at once.
        let barrier = Arc::new(Barrier::new(3));
        let results = each_account(&directory(), |acc| {
            let barrier = barrier.clone();
            async move {
                barrier.wait().await;
                Ok::<_, Error>(acc)
            }
        })
        .await
        .unwrap();
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn failures_are_captured_per_account() {
        let results = each_account(&directory(), |acc| async move {
            if acc.as_str() == "2" {
                Err(Error::validation(format!("boom in {acc}")))
            } else {
                Ok(acc.to_string())
            }
        })
        .await
        .unwrap();

        assert_eq!(results.len(), 3);
        assert!(!results[0].is_error());
        assert!(results[1].is_error());
        assert!(!results[2].is_error());
    }

    #[tokio::test]
    async fn ignore_errors_keeps_only_the_complement() {
        let results = each_account(&directory(), |acc| async move {
            if acc.as_str() == "3" {
                Err(Error::validation("down"))
            } else {
                Ok(acc.to_string())
            }
        })
        .await
        .unwrap();

        let survivors = ignore_errors(results);
        let accounts: Vec<_> = survivors.iter().map(|v| v.account.to_string()).collect();
        assert_eq!(accounts, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn throw_errors_surfaces_the_first_failure() {
        let results = each_account(&directory(), |acc| async move {
            if acc.as_str() == "1" {
                Err(Error::validation("master down"))
            } else {
                Ok(acc.to_string())
            }
        })
        .await
        .unwrap();

        let err = throw_errors(results).unwrap_err();
        assert!(err.to_string().contains("master down"));
    }

    #[tokio::test]
    async fn throw_errors_unwraps_values_in_slot_order() {
        let results = each_account(&directory(), |acc| async move {
            Ok::<_, Error>(acc.to_string())
        })
        .await
        .unwrap();

        assert_eq!(throw_errors(results).unwrap(), vec!["1", "2", "3"]);
    }

    #[test]
    fn flatten_tags_every_element_with_its_account() {
        let flat = flatten(vec![
            AccountValue {
                account: account("1"),
                value: vec!["a", "b"],
            },
            AccountValue {
                account: account("2"),
                value: vec!["c"],
            },
        ]);

        assert_eq!(flat.len(), 3);
        assert_eq!(flat[0].account, account("1"));
        assert_eq!(flat[0].value, "a");
        assert_eq!(flat[2].account, account("2"));
        assert_eq!(flat[2].value, "c");
    }
}
