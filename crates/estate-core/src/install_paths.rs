//! Typed path helpers for role installations in the target-state tree.
//!
//! Installed services are recorded under hierarchical keys of the form
//! `environments/{environment}/roles/{role}/services/{service}/{slice}`.
//! This module gives that shape a structured type with a bidirectional
//! parse/format pair so callers never splice path strings by hand.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// A parsed role-installation key.
///
/// `parse` and `Display` are inverses: for any key `k`,
/// `k.to_string().parse() == Ok(k)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleInstallationKey {
    /// Environment the role is installed in.
    pub environment: String,
    /// Server role name.
    pub role: String,
    /// Installed service name.
    pub service: String,
    /// Deployment slice the service occupies (a colour, or `none`).
    pub slice: String,
}

impl RoleInstallationKey {
    /// Creates a key from its four segments.
    #[must_use]
    pub fn new(
        environment: impl Into<String>,
        role: impl Into<String>,
        service: impl Into<String>,
        slice: impl Into<String>,
    ) -> Self {
        Self {
            environment: environment.into(),
            role: role.into(),
            service: service.into(),
            slice: slice.into(),
        }
    }

    /// Parses a role-installation key from its path form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when the path does not match
    /// `environments/{env}/roles/{role}/services/{service}/{slice}` or any
    /// segment is empty.
    pub fn parse(key: &str) -> Result<Self> {
        let segments: Vec<&str> = key.split('/').collect();
        match segments.as_slice() {
            ["environments", environment, "roles", role, "services", service, slice]
                if [environment, role, service, slice]
                    .iter()
                    .all(|s| !s.is_empty()) =>
            {
                Ok(Self::new(*environment, *role, *service, *slice))
            }
            _ => Err(Error::validation(format!(
                "could not parse service installation: {key}"
            ))),
        }
    }
}

impl fmt::Display for RoleInstallationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "environments/{}/roles/{}/services/{}/{}",
            self.environment, self.role, self.service, self.slice
        )
    }
}

impl FromStr for RoleInstallationKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Returns the recursive key-listing prefix for every role installed in an
/// environment.
#[must_use]
pub fn environment_roles_keys_prefix(environment: &str) -> String {
    format!("environments/{environment}/roles/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_well_formed_key() {
        let key =
            RoleInstallationKey::parse("environments/pr1/roles/Worker/services/TicketKeeper/blue")
                .unwrap();
        assert_eq!(key.environment, "pr1");
        assert_eq!(key.role, "Worker");
        assert_eq!(key.service, "TicketKeeper");
        assert_eq!(key.slice, "blue");
    }

    #[test]
    fn format_then_parse_round_trips() {
        let key = RoleInstallationKey::new("envA", "roleA", "svcA", "green");
        let parsed = RoleInstallationKey::parse(&key.to_string()).unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn rejects_malformed_keys() {
        for bad in [
            "",
            "environments/pr1/roles/Worker",
            "environments/pr1/roles/Worker/services/TicketKeeper",
            "environment/pr1/roles/Worker/services/TicketKeeper/blue",
            "environments//roles/Worker/services/TicketKeeper/blue",
            "environments/pr1/roles/Worker/services/TicketKeeper/blue/extra",
        ] {
            assert!(RoleInstallationKey::parse(bad).is_err(), "accepted: {bad}");
        }
    }

    #[test]
    fn from_str_matches_parse() {
        let key: RoleInstallationKey = "environments/e/roles/r/services/s/none".parse().unwrap();
        assert_eq!(key.slice, "none");
    }

    #[test]
    fn listing_prefix() {
        assert_eq!(
            environment_roles_keys_prefix("pr1"),
            "environments/pr1/roles/"
        );
    }
}
