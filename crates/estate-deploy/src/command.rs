//! The deploy command and its accepted vocabulary.
//!
//! Mode and slice arrive from the transport as plain strings and are parsed
//! into closed enums during acceptance; an unrecognized value rejects the
//! command before any external call is made.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};
use crate::record::DeploymentRecord;

/// A request to deploy one service version to a role in an environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployCommand {
    /// Target environment name.
    pub environment_name: String,
    /// Service to deploy.
    pub service_name: String,
    /// Version to deploy.
    pub service_version: String,
    /// Requested slice colour; required by blue/green mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_slice: Option<String>,
    /// Deployment mode (`overwrite` or `bg`).
    pub mode: String,
    /// Role to deploy to, as named by the caller.
    pub server_role_name: String,
    /// Explicit package location; looked up when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_path: Option<String>,
    /// Validate fully but dispatch nothing.
    #[serde(default)]
    pub is_dry_run: bool,
    /// Command identifier; becomes the deployment id.
    pub command_id: String,
    /// User issuing the command.
    pub username: String,
}

/// Recognized deployment modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
    /// Replace whatever is installed, sliceless.
    Overwrite,
    /// Blue/green: deploy to a slice colour.
    #[serde(rename = "bg")]
    BlueGreen,
}

impl DeploymentMode {
    const SUPPORTED: &'static str = "overwrite, bg";

    /// Parses a mode string, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] naming the supported modes when the
    /// string is not one of them.
    pub fn parse(mode: &str) -> Result<Self> {
        match mode.to_lowercase().as_str() {
            "overwrite" => Ok(Self::Overwrite),
            "bg" => Ok(Self::BlueGreen),
            _ => Err(Error::validation(format!(
                "unknown mode '{mode}'; supported modes are: {}",
                Self::SUPPORTED
            ))),
        }
    }

    /// Returns true when this mode deploys to a slice.
    #[must_use]
    pub const fn requires_slice(self) -> bool {
        matches!(self, Self::BlueGreen)
    }
}

/// Recognized slice names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SliceName {
    /// No slice; the sliceless installation group.
    None,
    /// The blue slice.
    Blue,
    /// The green slice.
    Green,
}

impl SliceName {
    const SUPPORTED: &'static str = "none, blue, green";

    /// Parses a slice string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] naming the supported slices when the
    /// string is not one of them.
    pub fn parse(slice: &str) -> Result<Self> {
        match slice {
            "none" => Ok(Self::None),
            "blue" => Ok(Self::Blue),
            "green" => Ok(Self::Green),
            _ => Err(Error::validation(format!(
                "unknown slice '{slice}'; supported slices are: {}",
                Self::SUPPORTED
            ))),
        }
    }

    /// Returns the slice's canonical lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Blue => "blue",
            Self::Green => "green",
        }
    }
}

impl fmt::Display for SliceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The package the provisioning workflow stages and pushes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SourcePackage {
    /// A revision reference: the package is fetched from a URI.
    CodeDeployRevision {
        /// Location of the revision.
        url: String,
    },
    /// An opaque deployment-map identifier resolved by the workflow.
    DeploymentMap {
        /// The deployment map id.
        id: String,
        /// The service version the map is resolved at.
        version: String,
    },
}

impl SourcePackage {
    /// Classifies a resolved package path.
    ///
    /// URI-shaped paths are revision references; anything else is treated as
    /// a deployment-map identifier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownSourcePackageType`] when the path is empty
    /// and cannot be classified at all.
    pub fn classify(package_path: &str, service_version: &str) -> Result<Self> {
        if package_path.is_empty() {
            return Err(Error::UnknownSourcePackageType {
                package_type: package_path.to_string(),
            });
        }
        if is_uri(package_path) {
            Ok(Self::CodeDeployRevision {
                url: package_path.to_string(),
            })
        } else {
            Ok(Self::DeploymentMap {
                id: package_path.to_string(),
                version: service_version.to_string(),
            })
        }
    }
}

/// Returns true for URI-shaped strings (`scheme://rest`).
fn is_uri(s: &str) -> bool {
    s.split_once("://").is_some_and(|(scheme, rest)| {
        !rest.is_empty()
            && !scheme.is_empty()
            && scheme.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    })
}

/// The orchestrator's answer to an accepted command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeployOutcome {
    /// The command was fully validated and nothing was dispatched.
    #[serde(rename_all = "camelCase")]
    DryRun {
        /// Marker distinguishing the dry-run shape.
        is_dry_run: bool,
        /// The resolved package path the run would have used.
        package_path: String,
    },
    /// The deployment was accepted and its workflow dispatched.
    Accepted(DeploymentRecord),
}

impl DeployOutcome {
    /// Creates the dry-run outcome.
    #[must_use]
    pub const fn dry_run(package_path: String) -> Self {
        Self::DryRun {
            is_dry_run: true,
            package_path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modes_parse_case_insensitively() {
        assert_eq!(DeploymentMode::parse("overwrite").unwrap(), DeploymentMode::Overwrite);
        assert_eq!(DeploymentMode::parse("BG").unwrap(), DeploymentMode::BlueGreen);
        let err = DeploymentMode::parse("rolling").unwrap_err();
        assert!(err.to_string().contains("supported modes are: overwrite, bg"));
    }

    #[test]
    fn slices_parse_exactly() {
        assert_eq!(SliceName::parse("blue").unwrap(), SliceName::Blue);
        assert!(SliceName::parse("Blue").is_err());
        let err = SliceName::parse("teal").unwrap_err();
        assert!(err.to_string().contains("supported slices are: none, blue, green"));
    }

    #[test]
    fn uri_shaped_paths_are_revision_references() {
        let pkg = SourcePackage::classify("https://bucket.s3.amazonaws.com/p.zip", "1.0.0").unwrap();
        assert!(matches!(pkg, SourcePackage::CodeDeployRevision { .. }));

        let pkg = SourcePackage::classify("s3://packages/p.zip", "1.0.0").unwrap();
        assert!(matches!(pkg, SourcePackage::CodeDeployRevision { .. }));
    }

    #[test]
    fn opaque_paths_are_deployment_maps() {
        let pkg = SourcePackage::classify("ticket-keeper-map", "1.0.0").unwrap();
        assert_eq!(
            pkg,
            SourcePackage::DeploymentMap {
                id: "ticket-keeper-map".into(),
                version: "1.0.0".into(),
            }
        );
    }

    #[test]
    fn empty_paths_cannot_be_classified() {
        assert!(matches!(
            SourcePackage::classify("", "1.0.0"),
            Err(Error::UnknownSourcePackageType { .. })
        ));
    }

    #[test]
    fn uri_detection_rejects_malformed_schemes() {
        assert!(!is_uri("not a uri"));
        assert!(!is_uri("://missing-scheme"));
        assert!(!is_uri("1http://digit-first"));
        assert!(!is_uri("s3://"));
        assert!(is_uri("git+ssh://host/repo"));
    }

    #[test]
    fn dry_run_outcome_serializes_with_the_marker() {
        let value = serde_json::to_value(DeployOutcome::dry_run("s3://p/x.zip".into())).unwrap();
        assert_eq!(value["isDryRun"], true);
        assert_eq!(value["packagePath"], "s3://p/x.zip");
    }
}
