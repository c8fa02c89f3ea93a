use super::types::ReconcilePolicy;
use crate::error_handling::types::ConfigError;
use log::debug;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration structure that defines all runtime parameters.
///
/// The configuration is read from a TOML file with [`Config::from_file`]; every key is
/// optional and falls back to the value returned by [`Config::default`]. Command-line flags
/// parsed in `main.rs` are applied on top of it afterwards.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use sessionctl::configuration::Config;
///
/// let config = Config::from_file(Path::new("sessionctl.toml")).unwrap();
/// println!("Polling {} every {}s", config.base_url, config.poll_interval_secs);
/// ```
///
/// # Fields Overview
///
/// - `base_url`: origin of the remote API, `/api/...` paths are appended to it
/// - `poll_interval_secs`: period of the status poll
/// - `request_timeout_secs`: upper bound for every network call
/// - `drift_tolerance_secs`: how far the local countdown may drift before it is resynchronized
/// - `max_consecutive_misses`: escalation threshold for "not running" snapshots, disabled when
/// absent
/// - `stop_on_logout`: issue a best-effort stop call on logout
/// - `notifications_enabled`: when `false` no user notification is emitted
/// - `default_max_viewers`: viewer quota assumed when the profile does not carry one
/// - `token_file`: file holding the bearer token
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub base_url: String,
    pub poll_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub drift_tolerance_secs: u64,
    pub max_consecutive_misses: Option<u32>,
    pub stop_on_logout: bool,
    pub notifications_enabled: bool,
    pub default_max_viewers: u32,
    pub token_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let policy = ReconcilePolicy::default();
        Self {
            base_url: String::from("http://127.0.0.1:8000"),
            poll_interval_secs: policy.poll_interval.as_secs(),
            request_timeout_secs: 10,
            drift_tolerance_secs: policy.drift_tolerance_secs,
            max_consecutive_misses: policy.max_consecutive_misses,
            stop_on_logout: policy.stop_on_logout,
            notifications_enabled: policy.notifications_enabled,
            default_max_viewers: policy.default_max_viewers,
            token_file: None,
        }
    }
}

impl Config {
    /// Reads and validates a TOML configuration file.
    ///
    /// # Errors
    /// - `ConfigError::IoError` if the file cannot be read
    /// - `ConfigError::TomlError` if the content is not valid TOML or has unknown keys
    /// - `ConfigError::InvalidValue` if a value is out of range
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        debug!("Reading configuration from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::TomlError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = self.base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ConfigError::InvalidValue(format!(
                "base_url must start with http:// or https://, got '{}'",
                self.base_url
            )));
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "poll_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "request_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.max_consecutive_misses == Some(0) {
            return Err(ConfigError::InvalidValue(
                "max_consecutive_misses must be at least 1 when set".to_string(),
            ));
        }
        if self.default_max_viewers == 0 {
            return Err(ConfigError::InvalidValue(
                "default_max_viewers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Base URL without a trailing slash, ready for path concatenation.
    pub fn api_origin(&self) -> &str {
        self.base_url.trim().trim_end_matches('/')
    }

    pub fn policy(&self) -> ReconcilePolicy {
        ReconcilePolicy {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            drift_tolerance_secs: self.drift_tolerance_secs,
            max_consecutive_misses: self.max_consecutive_misses,
            stop_on_logout: self.stop_on_logout,
            notifications_enabled: self.notifications_enabled,
            default_max_viewers: self.default_max_viewers,
        }
    }
}
