//! Cross-account read facade over a versioned store.
//!
//! Cross-account queries issue the same read against every managed account
//! via the fan-out executor and aggregate the survivors: an account that
//! fails is logged and dropped, never fatal to the whole query.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use estate_core::fan_out::{each_account, flatten, ignore_errors, AccountValue};
use estate_core::AccountDirectory;

use crate::audit::Versioned;
use crate::backend::ItemKey;
use crate::error::Result;
use crate::store::VersionedStore;

/// Fan-out reads of one logical table across every managed account.
pub struct CrossAccountStore<T> {
    directory: Arc<dyn AccountDirectory>,
    store: Arc<VersionedStore<T>>,
}

impl<T> std::fmt::Debug for CrossAccountStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrossAccountStore")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl<T> CrossAccountStore<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Creates a facade over `store` for the accounts in `directory`.
    #[must_use]
    pub fn new(directory: Arc<dyn AccountDirectory>, store: Arc<VersionedStore<T>>) -> Self {
        Self { directory, store }
    }

    /// Scans the table in every account and concatenates the results,
    /// tagging each entity with its originating account.
    ///
    /// Failing accounts are logged and excluded; they never abort the scan.
    ///
    /// # Errors
    ///
    /// Fails only when the account directory cannot be listed.
    pub async fn scan_all(&self) -> Result<Vec<AccountValue<Versioned<T>>>> {
        let results = each_account(self.directory.as_ref(), |account| {
            let store = Arc::clone(&self.store);
            async move { store.scan(&account).await }
        })
        .await?;
        Ok(flatten(ignore_errors(results)))
    }

    /// Looks the key up in every account and returns the first hit, tagged
    /// with the account it was found in.
    ///
    /// Failing accounts are logged and excluded.
    ///
    /// # Errors
    ///
    /// Fails only when the account directory cannot be listed.
    pub async fn find(&self, key: &ItemKey) -> Result<Option<AccountValue<Versioned<T>>>> {
        let results = each_account(self.directory.as_ref(), |account| {
            let store = Arc::clone(&self.store);
            let key = key.clone();
            async move { store.get(&account, &key).await }
        })
        .await?;
        Ok(ignore_errors(results)
            .into_iter()
            .find_map(|AccountValue { account, value }| {
                value.map(|entity| AccountValue {
                    account,
                    value: entity,
                })
            }))
    }
}
