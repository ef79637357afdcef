//! Top-level configuration, loadable from the environment.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use taleforge_identity::IdentityConfig;
use taleforge_protocol::ErrorKind;

/// Environment variable: email link lifetime in minutes.
pub const ENV_EMAIL_TOKEN_TTL_MINS: &str = "TALEFORGE_EMAIL_TOKEN_TTL_MINS";
/// Environment variable: access token lifetime in minutes.
pub const ENV_ACCESS_TOKEN_TTL_MINS: &str = "TALEFORGE_ACCESS_TOKEN_TTL_MINS";
/// Environment variable: log filter directive.
pub const ENV_LOG: &str = "TALEFORGE_LOG";

/// A setting that is present but unusable.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be a positive number of minutes, got {value:?}")]
    InvalidMinutes { var: &'static str, value: String },
}

impl ConfigError {
    /// Bad configuration is bad input.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidInput
    }
}

/// Everything needed to stand up a [`Taleforge`](crate::Taleforge).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaleforgeConfig {
    /// Token lifetimes and retry budgets.
    pub identity: IdentityConfig,
    /// `tracing` filter directive used by [`telemetry::init`](crate::telemetry::init).
    pub log_filter: String,
}

impl Default for TaleforgeConfig {
    fn default() -> Self {
        Self {
            identity: IdentityConfig::default(),
            log_filter: "info".to_owned(),
        }
    }
}

impl TaleforgeConfig {
    /// Loads configuration from environment variables, falling back to
    /// defaults for anything unset.
    ///
    /// # Errors
    /// [`ConfigError::InvalidMinutes`] if a TTL variable is set but isn't a
    /// positive integer.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through
    /// `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(ttl) = minutes(&lookup, ENV_EMAIL_TOKEN_TTL_MINS)? {
            config.identity.email_token_ttl = ttl;
        }
        if let Some(ttl) = minutes(&lookup, ENV_ACCESS_TOKEN_TTL_MINS)? {
            config.identity.access_token_ttl = ttl;
        }
        if let Some(filter) = lookup(ENV_LOG).filter(|f| !f.trim().is_empty()) {
            config.log_filter = filter;
        }

        Ok(config)
    }
}

fn minutes(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<Duration>, ConfigError> {
    let Some(value) = lookup(var) else {
        return Ok(None);
    };
    match value.trim().parse::<u64>() {
        Ok(mins) if mins > 0 => Ok(Some(Duration::from_secs(mins.saturating_mul(60)))),
        _ => Err(ConfigError::InvalidMinutes { var, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_from_lookup_empty_uses_defaults() {
        let config = TaleforgeConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, TaleforgeConfig::default());
    }

    #[test]
    fn test_from_lookup_overrides_ttls_and_filter() {
        let config = TaleforgeConfig::from_lookup(lookup(&[
            (ENV_EMAIL_TOKEN_TTL_MINS, "15"),
            (ENV_ACCESS_TOKEN_TTL_MINS, " 120 "),
            (ENV_LOG, "taleforge=debug"),
        ]))
        .unwrap();
        assert_eq!(config.identity.email_token_ttl, Duration::from_secs(15 * 60));
        assert_eq!(config.identity.access_token_ttl, Duration::from_secs(120 * 60));
        assert_eq!(config.log_filter, "taleforge=debug");
    }

    #[test]
    fn test_from_lookup_rejects_non_numeric_ttl() {
        let err = TaleforgeConfig::from_lookup(lookup(&[(ENV_EMAIL_TOKEN_TTL_MINS, "soon")]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(err.to_string().contains(ENV_EMAIL_TOKEN_TTL_MINS));
    }

    #[test]
    fn test_from_lookup_rejects_zero_ttl() {
        assert!(
            TaleforgeConfig::from_lookup(lookup(&[(ENV_ACCESS_TOKEN_TTL_MINS, "0")])).is_err()
        );
    }

    #[test]
    fn test_from_lookup_blank_filter_keeps_default() {
        let config = TaleforgeConfig::from_lookup(lookup(&[(ENV_LOG, "  ")])).unwrap();
        assert_eq!(config.log_filter, "info");
    }
}
