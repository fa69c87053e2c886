//! Configuration management for the watch engine.
//!
//! Provides layered configuration loading with priority:
//! 1. Default values (hardcoded)
//! 2. Config file passed by the caller
//! 3. Config file named by `LISTEN_CONFIG_PATH`
//! 4. Environment variables (highest priority)
//!
//! Settings are read once when a [`crate::Watch`] is constructed; there is no
//! per-subscription runtime configuration.

mod database;
mod network;
mod retry;
mod watch;
pub use database::*;
pub use network::*;
pub use retry::*;
pub use watch::*;


//---
use std::env;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::ENV_CONFIG_PATH;
use crate::constants::ENV_PREFIX;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Settings {
    /// Database the listen streams are scoped to
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Channel parameters for the gRPC transport
    #[serde(default)]
    pub network: NetworkConfig,
    /// Stream session parameters
    #[serde(default)]
    pub watch: WatchConfig,
    /// Reconnect policies
    #[serde(default)]
    pub retry: RetryPolicies,
}

impl Settings {
    /// Load configuration from multiple sources with priority:
    /// 1. Defaults
    /// 2. `path`, when given (must exist)
    /// 3. `LISTEN_CONFIG_PATH`, when set
    /// 4. Environment variables (`LISTEN__SECTION__KEY`)
    ///
    /// The merged result is validated before it is returned.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config = Config::builder();

        if let Some(path) = path {
            config = config.add_source(File::with_name(path).required(true));
        }

        if let Ok(path) = env::var(ENV_CONFIG_PATH) {
            config = config.add_source(File::with_name(&path).required(true));
        }

        config = config.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true),
        );

        let settings: Settings = config.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        self.database.validate()?;
        self.network.validate()?;
        self.watch.validate()?;
        self.retry.validate()?;
        Ok(())
    }
}
