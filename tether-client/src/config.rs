//! Client-side configuration loading
//!
//! Loads timeouts, polling defaults and connection overrides from
//! `$XDG_CONFIG_HOME/tether/config.toml`. Every field is optional.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tether_utils::{config_file, DiscoveryOptions, Result, TetherError};

/// Session-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Bound on each request/response round trip (default: 5000)
    pub request_timeout_ms: u64,
    /// Bound on opening the TCP connection (default: 5000)
    pub connect_timeout_ms: u64,
    /// Interval between remote-state checks in typed waits (default: 100)
    pub poll_interval_ms: u64,
    /// Startup grace for typed waits (default: 1000)
    pub startup_grace_ms: u64,
    /// Explicit connection parameters
    pub connection: ConnectionConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 5_000,
            connect_timeout_ms: 5_000,
            poll_interval_ms: 100,
            startup_grace_ms: 1_000,
            connection: ConnectionConfig::default(),
        }
    }
}

/// `[connection]` table; values here act like explicit discovery options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub token: Option<String>,
    pub bridge_info: Option<PathBuf>,
}

impl ClientConfig {
    /// Load from the default config file, falling back to defaults when absent
    pub fn load() -> Result<Self> {
        let path = config_file();
        if !path.exists() {
            tracing::debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load and validate a specific config file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| TetherError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| TetherError::ConfigInvalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate().map_err(|e| TetherError::ConfigInvalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        tracing::debug!(path = %path.display(), "Loaded client config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_ms == 0 {
            return Err(TetherError::config("request_timeout_ms must be > 0"));
        }
        if self.connect_timeout_ms == 0 {
            return Err(TetherError::config("connect_timeout_ms must be > 0"));
        }
        if self.poll_interval_ms == 0 {
            return Err(TetherError::config("poll_interval_ms must be > 0"));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn startup_grace(&self) -> Duration {
        Duration::from_millis(self.startup_grace_ms)
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = u64::try_from(timeout.as_millis())
            .unwrap_or(u64::MAX)
            .max(1);
        self
    }

    /// Discovery options seeded from the `[connection]` table
    pub fn discovery_options(&self) -> DiscoveryOptions {
        DiscoveryOptions {
            host: self.connection.host.clone(),
            port: self.connection.port,
            token: self.connection.token.clone(),
            bridge_info_path: self.connection.bridge_info.clone(),
        }
    }
}
