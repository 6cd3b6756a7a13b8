//! Configuration for the faultline harness
//!
//! Every knob is a plain scalar with a built-in default, overridable from
//! (highest precedence first):
//! 1. Environment variables (`FAULTLINE_*` prefix)
//! 2. `faultline.toml` in the project directory
//! 3. Built-in defaults
//!
//! Retry budgets and delays are deliberately configuration, not code
//! constants: scenarios tune them per environment and nothing in the harness
//! treats the exact numbers as a contract.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

mod error;
mod loader;

pub use error::ConfigError;
pub use loader::ConfigLoader;

/// Top-level harness configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub lifecycle: LifecycleConfig,
    pub retry: RetryConfig,
    pub scale: ScaleConfig,
    pub logging: LoggingConfig,
}

/// Knobs for cluster lifecycle control: poll loops and control-command retry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Wall-clock bound on a start/stop/restore poll loop, in seconds.
    pub max_start_wait_secs: u64,

    /// Sleep between liveness polls, in milliseconds.
    pub poll_interval_ms: u64,

    /// Retry budget for control scripts (budget N = up to N+1 attempts).
    pub command_retries: u32,

    /// Sleep between control-script attempts, in milliseconds.
    pub command_retry_delay_ms: u64,

    /// Directory holding the control scripts.
    pub scripts_dir: PathBuf,

    /// Append-only log file for every script invocation and its outcome.
    /// `None` discards the output.
    pub command_log: Option<PathBuf>,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            max_start_wait_secs: 60,
            poll_interval_ms: 1000,
            command_retries: 3,
            command_retry_delay_ms: 100,
            scripts_dir: PathBuf::from("_binaries"),
            command_log: None,
        }
    }
}

impl LifecycleConfig {
    pub fn max_start_wait(&self) -> Duration {
        Duration::from_secs(self.max_start_wait_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn command_retry_delay(&self) -> Duration {
        Duration::from_millis(self.command_retry_delay_ms)
    }
}

/// Knobs for the consistency-aware retry layer wrapped around data-path
/// client calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts for writes that may race a failover.
    pub write_attempts: u32,

    /// Attempts for reads waiting out replication lag.
    pub read_attempts: u32,

    /// Sleep between data-path attempts, in milliseconds.
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            write_attempts: 5,
            read_attempts: 5,
            delay_ms: 300,
        }
    }
}

impl RetryConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Test-scale knobs consumed by scenarios, not by the harness core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleConfig {
    /// Key count for "a few keys" scenarios.
    pub multi_n: u32,

    /// Key count for bulk scenarios.
    pub many_n: u32,

    /// Proxy message-buffer size handed to deployment.
    pub mbuf: u32,

    /// Payload size for large-value scenarios, in bytes.
    pub large: u32,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            multi_n: 2,
            many_n: 50,
            mbuf: 512,
            large: 1000,
        }
    }
}

/// Verbosity handed to deployed processes under test.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub verbose: u8,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { verbose: 5 }
    }
}

impl HarnessConfig {
    /// Load configuration from the current directory and environment.
    pub fn load() -> anyhow::Result<Self> {
        ConfigLoader::new().load()
    }

    /// Rejects knob combinations the harness cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lifecycle.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "lifecycle.poll_interval_ms must be positive".to_string(),
            ));
        }
        if self.retry.write_attempts == 0 || self.retry.read_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "retry attempts must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Load configuration, falling back to defaults on any failure.
    pub fn load_or_default() -> Self {
        ConfigLoader::new().load_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = HarnessConfig::default();

        assert_eq!(config.lifecycle.max_start_wait(), Duration::from_secs(60));
        assert_eq!(config.lifecycle.command_retries, 3);
        assert_eq!(config.retry.write_attempts, 5);
        assert_eq!(config.scale.many_n, 50);
        assert!(config.lifecycle.command_log.is_none());
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let mut config = HarnessConfig::default();
        config.lifecycle.poll_interval_ms = 0;
        assert!(config.validate().is_err());

        config.lifecycle.poll_interval_ms = 10;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn round_trips_through_toml() {
        let config = HarnessConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let back: HarnessConfig = toml::from_str(&text).unwrap();

        assert_eq!(back.lifecycle.max_start_wait_secs, 60);
        assert_eq!(back.scale.mbuf, config.scale.mbuf);
    }
}
