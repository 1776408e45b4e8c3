use std::path::PathBuf;
use std::time::Duration;

use crate::repositories::local_store::DEFAULT_PREFIX;
use crate::services::sync_service::{DEFAULT_PROFILE_RETRY_BACKOFF, DEFAULT_REMOTE_TIMEOUT};

pub const DEFAULT_SUBSCRIPTION_POLL: Duration = Duration::from_secs(2);
pub const DEFAULT_LOCAL_STORE_PATH: &str = ".classroom/local.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { name: &'static str, value: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Missing(name) => write!(f, "{} environment variable must be set", name),
            ConfigError::Invalid { name, value } => {
                write!(f, "{} has an invalid value: '{}'", name, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub table_name: String,
    pub remote_timeout: Duration,
    pub profile_retry_backoff: Duration,
    pub subscription_poll: Duration,
    pub local_store_path: PathBuf,
    pub local_store_prefix: String,
    pub local_store_quota_bytes: Option<usize>,
    pub jwt_secret: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };
        let millis = |name: &'static str, default: Duration| match lookup(name) {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| ConfigError::Invalid { name, value: raw }),
            None => Ok(default),
        };

        let local_store_quota_bytes = match lookup("LOCAL_STORE_QUOTA_BYTES") {
            Some(raw) => Some(raw.trim().parse::<usize>().map_err(|_| ConfigError::Invalid {
                name: "LOCAL_STORE_QUOTA_BYTES",
                value: raw,
            })?),
            None => None,
        };

        Ok(AppConfig {
            table_name: required("CLASSROOM_TABLE")?,
            remote_timeout: millis("REMOTE_TIMEOUT_MS", DEFAULT_REMOTE_TIMEOUT)?,
            profile_retry_backoff: millis(
                "PROFILE_RETRY_BACKOFF_MS",
                DEFAULT_PROFILE_RETRY_BACKOFF,
            )?,
            subscription_poll: millis("SUBSCRIPTION_POLL_MS", DEFAULT_SUBSCRIPTION_POLL)?,
            local_store_path: lookup("LOCAL_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOCAL_STORE_PATH)),
            local_store_prefix: lookup("LOCAL_STORE_PREFIX")
                .unwrap_or_else(|| DEFAULT_PREFIX.to_string()),
            local_store_quota_bytes,
            jwt_secret: required("JWT_SECRET")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_apply_when_optional_vars_missing() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("CLASSROOM_TABLE", "classroom"),
            ("JWT_SECRET", "s"),
        ]))
        .unwrap();

        assert_eq!(config.table_name, "classroom");
        assert_eq!(config.remote_timeout, Duration::from_secs(5));
        assert_eq!(config.local_store_prefix, "classroom_");
        assert!(config.local_store_quota_bytes.is_none());
    }

    #[test]
    fn test_overrides_are_parsed() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("CLASSROOM_TABLE", "classroom"),
            ("JWT_SECRET", "s"),
            ("REMOTE_TIMEOUT_MS", "250"),
            ("LOCAL_STORE_QUOTA_BYTES", "5242880"),
            ("LOCAL_STORE_PATH", "/tmp/cache.json"),
        ]))
        .unwrap();

        assert_eq!(config.remote_timeout, Duration::from_millis(250));
        assert_eq!(config.local_store_quota_bytes, Some(5_242_880));
        assert_eq!(config.local_store_path, PathBuf::from("/tmp/cache.json"));
    }

    #[test]
    fn test_missing_and_invalid_values() {
        assert_eq!(
            AppConfig::from_lookup(lookup_from(&[("JWT_SECRET", "s")])),
            Err(ConfigError::Missing("CLASSROOM_TABLE"))
        );
        assert!(matches!(
            AppConfig::from_lookup(lookup_from(&[
                ("CLASSROOM_TABLE", "t"),
                ("JWT_SECRET", "s"),
                ("SUBSCRIPTION_POLL_MS", "soon"),
            ])),
            Err(ConfigError::Invalid {
                name: "SUBSCRIPTION_POLL_MS",
                ..
            })
        ));
    }
}
