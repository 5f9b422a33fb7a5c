//! # estate-core
//!
//! Core abstractions for the Estate multi-account AWS estate manager.
//!
//! This crate provides the foundational types and traits used across all
//! Estate components:
//!
//! - **Managed Accounts**: The set of AWS accounts under management and the
//!   directory seam that supplies them
//! - **Account Fan-Out**: Scatter/gather execution of one operation against
//!   every managed account, with per-account failure isolation
//! - **Installation Paths**: Typed, bidirectional role-installation keys
//! - **Error Types**: Shared error definitions and result types
//!
//! ## Crate Boundary
//!
//! `estate-core` is the **only** crate allowed to define shared primitives.
//! Domain crates (`estate-data`, `estate-deploy`) build on the seams defined
//! here and never reach around them.
//!
//! ## Example
//!
//! ```rust
//! use estate_core::prelude::*;
//!
//! let master = ManagedAccount::master(AccountNumber::new("000000000001").unwrap());
//! let directory = StaticAccountDirectory::new(vec![master]);
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod account;
pub mod error;
pub mod fan_out;
pub mod install_paths;
pub mod observability;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use estate_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::account::{AccountDirectory, AccountNumber, ManagedAccount, StaticAccountDirectory};
    pub use crate::error::{Error, Result};
    pub use crate::fan_out::{each_account, flatten, ignore_errors, throw_errors, AccountValue, FanOutResult};
    pub use crate::install_paths::{environment_roles_keys_prefix, RoleInstallationKey};
}

pub use account::{AccountDirectory, AccountNumber, ManagedAccount, StaticAccountDirectory};
pub use error::{Error, Result};
pub use fan_out::{AccountValue, FanOutResult};
pub use install_paths::RoleInstallationKey;
pub use observability::{init_logging, LogFormat};
