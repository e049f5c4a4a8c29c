// src/config.rs

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const ENV_PREFIX: &str = "ATTRIBUTOR_";

const DEFAULT_INVENTORY_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_VALIDATOR_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(String),
    #[error("{key} is not a valid URL: {source}")]
    InvalidUrl { key: String, source: url::ParseError },
    #[error("{key} is not a valid duration: {source}")]
    InvalidDuration { key: String, source: humantime::DurationError },
    #[error("{key} must be true or false, got {value:?}")]
    InvalidBool { key: String, value: String },
    #[error("failed to load .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
}

/// Logging switches consumed by [`crate::logging::initialize_logging`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Also write logs to a file in the platform data directory.
    pub log_file: bool,
}

/// Runtime settings, read from `ATTRIBUTOR_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributorConfig {
    /// Base URL of the inventory's cloud asset API. Optional only in dry-run mode.
    pub inventory_endpoint: Option<Url>,
    /// Bound on every inventory lookup.
    pub inventory_timeout: Duration,
    /// Bound on every validator.
    pub validator_timeout: Duration,
    /// Enables the account allow-list validator when non-empty.
    pub allowed_accounts: Vec<String>,
    /// Skip the inventory and attribute every record with an empty context.
    pub dry_run: bool,
    /// Where records that fail attribution or validation are appended.
    pub dead_letter_file: Option<PathBuf>,
    pub logging: LoggingConfig,
}

impl AttributorConfig {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => {}
            Err(e) if e.not_found() => {}
            Err(e) => return Err(e.into()),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup, so parsing can be tested
    /// without touching the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            let key = format!("{ENV_PREFIX}{name}");
            let value = lookup(&key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
            (key, value)
        };

        let dry_run = match get("DRY_RUN") {
            (key, Some(value)) => parse_bool(&key, &value)?,
            (_, None) => false,
        };

        let inventory_endpoint = match get("INVENTORY_ENDPOINT") {
            (key, Some(value)) => Some(Url::parse(&value).map_err(|source| ConfigError::InvalidUrl { key, source })?),
            (key, None) if !dry_run => return Err(ConfigError::Missing(key)),
            (_, None) => None,
        };

        let inventory_timeout = match get("INVENTORY_TIMEOUT") {
            (key, Some(value)) => parse_duration(key, &value)?,
            (_, None) => DEFAULT_INVENTORY_TIMEOUT,
        };

        let validator_timeout = match get("VALIDATOR_TIMEOUT") {
            (key, Some(value)) => parse_duration(key, &value)?,
            (_, None) => DEFAULT_VALIDATOR_TIMEOUT,
        };

        let allowed_accounts = get("ALLOWED_ACCOUNTS")
            .1
            .map(|v| v.split(',').map(str::trim).filter(|a| !a.is_empty()).map(String::from).collect())
            .unwrap_or_default();

        let dead_letter_file = get("DEAD_LETTER_FILE").1.map(PathBuf::from);

        let log_file = match get("LOG_FILE") {
            (key, Some(value)) => parse_bool(&key, &value)?,
            (_, None) => false,
        };

        Ok(Self {
            inventory_endpoint,
            inventory_timeout,
            validator_timeout,
            allowed_accounts,
            dry_run,
            dead_letter_file,
            logging: LoggingConfig { log_file },
        })
    }
}

fn parse_duration(key: String, value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value).map_err(|source| ConfigError::InvalidDuration { key, source })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool { key: key.to_string(), value: value.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AttributorConfig, ConfigError> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AttributorConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_endpoint_is_set() {
        let config = load(&[("ATTRIBUTOR_INVENTORY_ENDPOINT", "https://localhost:8080/v1/cloud")]).unwrap();

        assert_eq!(config.inventory_endpoint.unwrap().as_str(), "https://localhost:8080/v1/cloud");
        assert_eq!(config.inventory_timeout, Duration::from_secs(10));
        assert_eq!(config.validator_timeout, Duration::from_secs(5));
        assert!(config.allowed_accounts.is_empty());
        assert!(!config.dry_run);
        assert!(config.dead_letter_file.is_none());
        assert!(!config.logging.log_file);
    }

    #[test]
    fn endpoint_is_required_outside_dry_run() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(ref key) if key == "ATTRIBUTOR_INVENTORY_ENDPOINT"));

        let config = load(&[("ATTRIBUTOR_DRY_RUN", "true")]).unwrap();
        assert!(config.dry_run);
        assert!(config.inventory_endpoint.is_none());
    }

    #[test]
    fn parses_every_setting() {
        let config = load(&[
            ("ATTRIBUTOR_INVENTORY_ENDPOINT", "http://inventory/v1/cloud"),
            ("ATTRIBUTOR_INVENTORY_TIMEOUT", "1500ms"),
            ("ATTRIBUTOR_VALIDATOR_TIMEOUT", "2s"),
            ("ATTRIBUTOR_ALLOWED_ACCOUNTS", "123, 456,,"),
            ("ATTRIBUTOR_DEAD_LETTER_FILE", "/tmp/dead.jsonl"),
            ("ATTRIBUTOR_LOG_FILE", "yes"),
        ])
        .unwrap();

        assert_eq!(config.inventory_timeout, Duration::from_millis(1500));
        assert_eq!(config.validator_timeout, Duration::from_secs(2));
        assert_eq!(config.allowed_accounts, vec!["123".to_string(), "456".to_string()]);
        assert_eq!(config.dead_letter_file, Some(PathBuf::from("/tmp/dead.jsonl")));
        assert!(config.logging.log_file);
    }

    #[test]
    fn rejects_malformed_values() {
        let bad_url = load(&[("ATTRIBUTOR_INVENTORY_ENDPOINT", "~!@#$%^&*()_+:?><")]).unwrap_err();
        assert!(matches!(bad_url, ConfigError::InvalidUrl { .. }));

        let bad_duration = load(&[
            ("ATTRIBUTOR_INVENTORY_ENDPOINT", "http://inventory"),
            ("ATTRIBUTOR_INVENTORY_TIMEOUT", "soon"),
        ])
        .unwrap_err();
        assert!(matches!(bad_duration, ConfigError::InvalidDuration { .. }));

        let bad_bool = load(&[("ATTRIBUTOR_DRY_RUN", "maybe")]).unwrap_err();
        assert!(matches!(bad_bool, ConfigError::InvalidBool { .. }));
    }
}
