use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_BACKOFF_BASE_DELAY_MS;
use crate::constants::DEFAULT_BACKOFF_JITTER_FACTOR;
use crate::constants::DEFAULT_BACKOFF_MAX_DELAY_MS;
use crate::constants::DEFAULT_BACKOFF_MAX_RETRIES;
use crate::constants::DEFAULT_BACKOFF_MULTIPLIER;
use crate::constants::DEFAULT_OPEN_TIMEOUT_MS;
use crate::Error;
use crate::Result;

/// Basic retry policy template
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    /// Maximum number of consecutive retries (0 means unlimited retries)
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Single open attempt timeout (unit: milliseconds)
    #[serde(default = "default_op_timeout_ms")]
    pub timeout_ms: u64,

    /// Backoff base (unit: milliseconds)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Maximum backoff time (unit: milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Growth factor applied per consecutive failure
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Width of the random jitter band as a fraction of the delay.
    /// 1.0 spreads delays over `[0.5 * delay, 1.5 * delay]`.
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            timeout_ms: default_op_timeout_ms(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
            jitter_factor: default_jitter_factor(),
        }
    }
}

impl BackoffPolicy {
    pub(crate) fn validate(
        &self,
        name: &str,
    ) -> Result<()> {
        if self.base_delay_ms > self.max_delay_ms {
            return Err(Error::Config(ConfigError::Message(format!(
                "retry.{}: base_delay_ms ({}) must not exceed max_delay_ms ({})",
                name, self.base_delay_ms, self.max_delay_ms
            ))));
        }

        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(Error::Config(ConfigError::Message(format!(
                "retry.{}: multiplier must be >= 1.0, got {}",
                name, self.multiplier
            ))));
        }

        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(Error::Config(ConfigError::Message(format!(
                "retry.{}: jitter_factor must be within [0, 1], got {}",
                name, self.jitter_factor
            ))));
        }

        if self.timeout_ms == 0 {
            return Err(Error::Config(ConfigError::Message(format!(
                "retry.{}: timeout_ms must be > 0",
                name
            ))));
        }

        Ok(())
    }
}

/// Divide strategies by business domain
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct RetryPolicies {
    // Listen stream (re)open strategy
    #[serde(default)]
    pub stream: BackoffPolicy,
}

impl RetryPolicies {
    pub fn validate(&self) -> Result<()> {
        self.stream.validate("stream")
    }
}

fn default_max_retries() -> usize {
    DEFAULT_BACKOFF_MAX_RETRIES
}
fn default_op_timeout_ms() -> u64 {
    DEFAULT_OPEN_TIMEOUT_MS
}
fn default_base_delay_ms() -> u64 {
    DEFAULT_BACKOFF_BASE_DELAY_MS
}
fn default_max_delay_ms() -> u64 {
    DEFAULT_BACKOFF_MAX_DELAY_MS
}
fn default_multiplier() -> f64 {
    DEFAULT_BACKOFF_MULTIPLIER
}
fn default_jitter_factor() -> f64 {
    DEFAULT_BACKOFF_JITTER_FACTOR
}
