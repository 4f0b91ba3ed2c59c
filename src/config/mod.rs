//! Configuration management for the reconcile loop and its collaborators.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file support (`CONFIG_PATH`)
//! - Environment variable overrides (`DEPLOYBOT__SECTION__FIELD`)
//! - Section-wise validation
mod controller;
mod mattermost;
mod monitoring;
mod rate_limit;
mod retry;
mod watch;
pub use controller::*;
pub use mattermost::*;
pub use monitoring::*;
pub use rate_limit::*;
pub use retry::*;
pub use watch::*;

#[cfg(test)]
mod controller_test;

use std::env;
use std::fmt::Debug;
use std::path::PathBuf;

use config::Config;
use config::ConfigError;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Prefix of environment overrides, e.g. `DEPLOYBOT__CONTROLLER__WORKERS=4`
const ENV_PREFIX: &str = "DEPLOYBOT";

/// Main configuration container
///
/// Combines all section configurations with hierarchical override support:
/// 1. Default values from code implementation
/// 2. Configuration file specified by `CONFIG_PATH`
/// 3. Environment variables (highest priority)
#[derive(Serialize, Deserialize, Clone, Default)]
pub struct BotConfig {
    /// Reconcile loop parameters
    #[serde(default)]
    pub controller: ControllerConfig,
    /// Change queue backoff and throttling
    #[serde(default)]
    pub rate_limit: RateLimiterConfig,
    /// Watch transport settings
    #[serde(default)]
    pub watch: WatchConfig,
    /// Chat notification sink
    #[serde(default)]
    pub mattermost: MattermostConfig,
    /// Metrics endpoint
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl Debug for BotConfig {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("BotConfig")
            .field("controller", &self.controller)
            .field("rate_limit", &self.rate_limit)
            .field("watch", &self.watch)
            .field("monitoring", &self.monitoring)
            .finish()
    }
}

impl BotConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Sources are merged in the following order (later sources override earlier):
    /// 1. Type defaults (lowest priority)
    /// 2. Configuration file from `CONFIG_PATH` environment variable (if set)
    /// 3. Environment variables with `DEPLOYBOT__` prefix (highest priority)
    ///
    /// Callers must call `validate()` before using the configuration.
    ///
    /// # Examples
    /// ```ignore
    /// let cfg = BotConfig::new()?
    ///     .with_override_config("custom.toml")?
    ///     .validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(env_source());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional configuration overrides from file without validation.
    ///
    /// Merging order (later sources override earlier):
    /// 1. Current configuration values
    /// 2. New configuration file
    /// 3. Latest environment variables (highest priority)
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates every section and returns the validated instance.
    pub fn validate(self) -> Result<Self> {
        self.controller.validate()?;
        self.rate_limit.validate()?;
        self.watch.validate()?;
        self.mattermost.validate()?;
        self.monitoring.validate()?;

        if let Some(notify_timeout) = self.controller.notify_timeout() {
            let login = self.mattermost.login.worst_case();
            if self.mattermost.is_enabled() && login >= notify_timeout {
                return Err(invalid(format!(
                    "mattermost.login may take up to {login:?}, which does not fit in controller.notify_timeout_ms {}",
                    self.controller.notify_timeout_ms
                )));
            }
        }
        Ok(self)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}

/// Log output location
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogConfig {
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
        }
    }
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("./logs")
}

pub(super) fn invalid(msg: impl Into<String>) -> Error {
    Error::Config(ConfigError::Message(msg.into()))
}
