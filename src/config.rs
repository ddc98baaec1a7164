//! Engine configuration.
//!
//! Every setting has a default, so an empty document is a valid
//! configuration:
//!
//! ```toml
//! [heartbeat]
//! max_attempts = 3
//!
//! [retry]
//! default_max_retries = 2
//!
//! [scheduler]
//! tick_interval_ms = 5000
//! default_max_concurrent_tasks = 1
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Heartbeat reconciliation settings.
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    /// Retry policy settings.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Scheduler settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// Heartbeat reconciliation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeartbeatConfig {
    /// Read-compute-write attempts before a heartbeat reports a conflict.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
        }
    }
}

/// Retry policy settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Retry ceiling for tasks created without an explicit one.
    #[serde(default = "default_max_retries")]
    pub default_max_retries: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            default_max_retries: default_max_retries(),
        }
    }
}

/// Scheduler settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Delay between timer-driven ticks, in milliseconds.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Concurrency budget for workers registered without one.
    #[serde(default = "default_max_concurrent_tasks")]
    pub default_max_concurrent_tasks: u32,
}

impl SchedulerConfig {
    /// Returns the tick interval as a [`Duration`].
    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            default_max_concurrent_tasks: default_max_concurrent_tasks(),
        }
    }
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_max_retries() -> u32 {
    2
}

const fn default_tick_interval_ms() -> u64 {
    5_000
}

const fn default_max_concurrent_tasks() -> u32 {
    1
}

/// Errors returned while loading configuration.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration from {path}: {source}")]
    Io {
        /// File that was read.
        path: PathBuf,
        /// Underlying I/O failure.
        source: Arc<std::io::Error>,
    },

    /// The document is not valid TOML or has unknown keys.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid configuration value for {field}: {reason}")]
    Invalid {
        /// Dotted key of the offending setting.
        field: &'static str,
        /// Why the value was refused.
        reason: &'static str,
    },
}

impl EngineConfig {
    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed documents and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses, and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file cannot be read, otherwise
    /// as [`EngineConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file_path = path.as_ref();
        let text = std::fs::read_to_string(file_path).map_err(|err| ConfigError::Io {
            path: file_path.to_path_buf(),
            source: Arc::new(err),
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %file_path.display(), "loaded engine configuration");
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when `heartbeat.max_attempts`,
    /// `scheduler.tick_interval_ms`, or
    /// `scheduler.default_max_concurrent_tasks` is zero.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.heartbeat.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "heartbeat.max_attempts",
                reason: "must be at least 1",
            });
        }
        if self.scheduler.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "scheduler.tick_interval_ms",
                reason: "must be at least 1",
            });
        }
        if self.scheduler.default_max_concurrent_tasks == 0 {
            return Err(ConfigError::Invalid {
                field: "scheduler.default_max_concurrent_tasks",
                reason: "must be at least 1",
            });
        }
        Ok(())
    }
}
