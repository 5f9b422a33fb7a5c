//! Runtime configuration for the deployment domain.
//!
//! Limits are explicit and reproducible: values load from the process
//! environment with strict validation, and a test-friendly entry point
//! accepts a key lookup function instead of touching the real environment.

use chrono::Duration;

use crate::error::{Error, Result};

const ENV_MAX_DEPLOYMENT_DURATION_SECS: &str = "ESTATE_DEPLOY_MAX_DURATION_SECS";

/// The maximum assumed duration of one deployment: 65 minutes.
const DEFAULT_MAX_DEPLOYMENT_DURATION_SECS: u64 = 65 * 60;

/// Runtime limits for deployment acceptance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployRuntimeConfig {
    /// Maximum assumed deployment duration. The duplicate-in-flight guard
    /// treats an "In Progress" history record older than this as finished.
    pub max_deployment_duration: Duration,
}

impl Default for DeployRuntimeConfig {
    fn default() -> Self {
        Self {
            max_deployment_duration: Duration::seconds(
                i64::try_from(DEFAULT_MAX_DEPLOYMENT_DURATION_SECS).unwrap_or(3900),
            ),
        }
    }
}

impl DeployRuntimeConfig {
    /// Loads runtime config from the process environment.
    ///
    /// # Errors
    ///
    /// Returns a validation error when an environment value is not a
    /// positive integer or exceeds the supported range.
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Loads runtime config with a custom environment source.
    ///
    /// # Errors
    ///
    /// Returns a validation error when an environment value is not a
    /// positive integer or exceeds the supported range.
    pub fn from_env_with<F>(get_env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let max_duration_secs = parse_positive_u64_env(
            &get_env,
            ENV_MAX_DEPLOYMENT_DURATION_SECS,
            DEFAULT_MAX_DEPLOYMENT_DURATION_SECS,
        )?;
        let max_deployment_duration =
            Duration::seconds(i64::try_from(max_duration_secs).map_err(|_| {
                Error::validation(format!(
                    "{ENV_MAX_DEPLOYMENT_DURATION_SECS} value {max_duration_secs} exceeds supported range"
                ))
            })?);
        Ok(Self {
            max_deployment_duration,
        })
    }
}

fn parse_positive_u64_env<F>(get_env: &F, key: &str, default: u64) -> Result<u64>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = get_env(key) else {
        return Ok(default);
    };

    let parsed = raw.parse::<u64>().map_err(|_| {
        Error::validation(format!("{key} must be a positive integer, got '{raw}'"))
    })?;
    if parsed == 0 {
        return Err(Error::validation(format!(
            "{key} must be greater than zero"
        )));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_sixty_five_minutes() {
        let config = DeployRuntimeConfig::default();
        assert_eq!(config.max_deployment_duration, Duration::minutes(65));
        assert_eq!(
            DeployRuntimeConfig::from_env_with(|_| None).unwrap(),
            config
        );
    }

    #[test]
    fn accepts_a_positive_override() {
        let config =
            DeployRuntimeConfig::from_env_with(|_| Some("600".to_string())).unwrap();
        assert_eq!(config.max_deployment_duration, Duration::minutes(10));
    }

    #[test]
    fn rejects_non_numeric_and_zero_values() {
        assert!(DeployRuntimeConfig::from_env_with(|_| Some("soon".to_string())).is_err());
        assert!(DeployRuntimeConfig::from_env_with(|_| Some("0".to_string())).is_err());
        assert!(DeployRuntimeConfig::from_env_with(|_| Some("-5".to_string())).is_err());
    }
}
