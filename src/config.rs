//! Configuration management for Windowgate.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::{Result, WindowGateError};
use crate::ratelimit::{Policy, PolicyHandle, DEFAULT_PERMIT_LIMIT, DEFAULT_TIME_WINDOW};

/// Prefix for environment variable overrides, e.g.
/// `WINDOWGATE_RATE_LIMITING__PERMIT_LIMIT=5`.
pub const ENV_PREFIX: &str = "WINDOWGATE";

/// Main configuration for the Windowgate service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Units admitted per identifier per window
    #[serde(default = "default_permit_limit")]
    pub permit_limit: u64,

    /// Window length in seconds
    #[serde(default = "default_time_window_secs")]
    pub time_window_secs: u64,

    /// How often the configuration file is re-read, in seconds
    #[serde(default = "default_reload_interval")]
    pub config_reload_interval_secs: u64,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            permit_limit: default_permit_limit(),
            time_window_secs: default_time_window_secs(),
            config_reload_interval_secs: default_reload_interval(),
        }
    }
}

fn default_permit_limit() -> u64 {
    DEFAULT_PERMIT_LIMIT
}

fn default_time_window_secs() -> u64 {
    DEFAULT_TIME_WINDOW.as_secs()
}

fn default_reload_interval() -> u64 {
    5
}

impl RateLimitingConfig {
    /// Build the admission policy described by this section.
    pub fn policy(&self) -> Policy {
        Policy::new(self.permit_limit, Duration::from_secs(self.time_window_secs))
    }

    /// Get the reload interval as a duration.
    pub fn reload_interval(&self) -> Duration {
        Duration::from_secs(self.config_reload_interval_secs)
    }
}

impl AppConfig {
    /// Load configuration from an optional file, then environment overrides.
    ///
    /// The file format is taken from its extension. Environment variables use
    /// the [`ENV_PREFIX`] prefix and `__` between nested keys.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env_prefix(path, ENV_PREFIX)
    }

    fn load_with_env_prefix(path: Option<&Path>, env_prefix: &str) -> Result<Self> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            debug!(path = %path.display(), "Reading configuration file");
            builder = builder.add_source(::config::File::from(path).required(true));
        }

        let config: AppConfig = builder
            .add_source(
                ::config::Environment::with_prefix(env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: AppConfig = serde_yaml::from_str(yaml)
            .map_err(|e| WindowGateError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the admission core does not handle.
    pub fn validate(&self) -> Result<()> {
        let rl = &self.rate_limiting;
        if rl.permit_limit == 0 {
            return Err(WindowGateError::Config(
                "rate_limiting.permit_limit must be greater than zero".to_string(),
            ));
        }
        if rl.time_window_secs == 0 {
            return Err(WindowGateError::Config(
                "rate_limiting.time_window_secs must be greater than zero".to_string(),
            ));
        }
        if rl.config_reload_interval_secs == 0 {
            return Err(WindowGateError::Config(
                "rate_limiting.config_reload_interval_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Periodically re-reads a configuration file into a [`PolicyHandle`].
pub struct PolicyReloader {
    /// File to re-read
    path: PathBuf,
    /// Handle that receives new policies
    handle: PolicyHandle,
}

impl PolicyReloader {
    /// Create a reloader for `path` feeding `handle`.
    pub fn new(path: impl Into<PathBuf>, handle: PolicyHandle) -> Self {
        Self {
            path: path.into(),
            handle,
        }
    }

    /// Re-read the configuration once.
    ///
    /// Returns whether the policy changed. On error the previous policy is
    /// left in place.
    pub fn reload(&self) -> Result<bool> {
        let config = AppConfig::load(Some(self.path.as_path()))?;
        Ok(self.handle.update(config.rate_limiting.policy()))
    }

    /// Reload on a fixed interval until the task is dropped.
    pub async fn run(self, every: Duration) {
        info!(
            path = %self.path.display(),
            interval_secs = every.as_secs(),
            "Watching configuration for policy changes"
        );

        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; the startup load already ran.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match self.reload() {
                Ok(true) => debug!(path = %self.path.display(), "Configuration reloaded"),
                Ok(false) => {}
                Err(e) => warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Configuration reload failed, keeping previous policy"
                ),
            }
        }
    }
}
