//! Layered configuration.
//!
//! Values are merged from built-in defaults, then `tsunagi.toml` in the
//! working directory, then `TSUNAGI_`-prefixed environment variables. Nested
//! keys use a double underscore, so `TSUNAGI_POLICY__ACCEPT_THRESHOLD=0.5`
//! sets `policy.accept_threshold`.
//!
//! Loading is optional: every component also has a `Default`.
//!
//! # Examples
//!
//! ```rust
//! use tsunagi::config::Config;
//!
//! let config = Config::default();
//! assert_eq!(config.policy.best_match_threshold, 0.7);
//! assert_eq!(config.pipeline.worker_limit, 4);
//! ```

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::{error::Result, mapping::MatchPolicy, net::proxy::ProxySources};

pub const CONFIG_FILE: &str = "tsunagi.toml";
pub const ENV_PREFIX: &str = "TSUNAGI_";

/// Pipeline scheduling limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Providers searched concurrently during candidate gathering.
    pub worker_limit: usize,
    /// Upper bound on the storage existence check.
    pub store_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            worker_limit: 4,
            store_timeout_secs: 10,
        }
    }
}

impl PipelineConfig {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub proxies: ProxySources,
    pub policy: MatchPolicy,
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Loads `tsunagi.toml` from the working directory plus the environment.
    pub fn load() -> Result<Self> {
        Self::load_from(CONFIG_FILE)
    }

    /// Loads a specific TOML file plus the environment. A missing file is
    /// not an error.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_figment(Self::figment(path))
    }

    /// The merged provider stack, for callers that want to add layers.
    pub fn figment(path: impl AsRef<Path>) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        Ok(figment.extract()?)
    }
}
