use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_IDLE_TIMEOUT_MS;
use crate::Error;
use crate::Result;

/// Stream session parameters shared by every subscription
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WatchConfig {
    /// Silence (unit: milliseconds) after which an open stream is considered
    /// stalled and re-opened
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            idle_timeout_ms: default_idle_timeout_ms(),
        }
    }
}

impl WatchConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.idle_timeout_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "watch.idle_timeout_ms must be > 0".to_string(),
            )));
        }
        Ok(())
    }
}

fn default_idle_timeout_ms() -> u64 {
    DEFAULT_IDLE_TIMEOUT_MS
}
