//! # Store Configuration
//!
//! Runtime parameters with sane defaults and environment overrides.

use redux_stream_bus::DEFAULT_CHANNEL_CAPACITY;
use redux_stream_types::ConfigError;
use std::env;

/// Environment variable overriding [`StoreConfig::bus_capacity`].
pub const ENV_BUS_CAPACITY: &str = "REDUX_STREAM_BUS_CAPACITY";

/// Environment variable overriding [`StoreConfig::log_actions`].
pub const ENV_LOG_ACTIONS: &str = "REDUX_STREAM_LOG_ACTIONS";

/// Store configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Per-subscriber bus backlog at which a warning is logged.
    pub bus_capacity: usize,
    /// Log every reduced action at `info` instead of `debug`.
    pub log_actions: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            bus_capacity: DEFAULT_CHANNEL_CAPACITY,
            log_actions: false,
        }
    }
}

impl StoreConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `REDUX_STREAM_BUS_CAPACITY`: bus backlog warning threshold (default: 1000)
    /// - `REDUX_STREAM_LOG_ACTIONS`: `true`/`false`/`1`/`0` (default: false)
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(raw) = env::var(ENV_BUS_CAPACITY) {
            config.bus_capacity = raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: ENV_BUS_CAPACITY,
                value: raw.clone(),
            })?;
        }

        if let Ok(raw) = env::var(ENV_LOG_ACTIONS) {
            config.log_actions = parse_flag(&raw).ok_or(ConfigError::InvalidEnv {
                var: ENV_LOG_ACTIONS,
                value: raw.clone(),
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    ///
    /// # Returns
    ///
    /// Returns `Err` if the bus capacity is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bus_capacity == 0 {
            return Err(ConfigError::ZeroBusCapacity);
        }
        Ok(())
    }

    /// Override the bus capacity.
    #[must_use]
    pub fn with_bus_capacity(mut self, capacity: usize) -> Self {
        self.bus_capacity = capacity;
        self
    }

    /// Enable or disable `info`-level action logging.
    #[must_use]
    pub fn with_log_actions(mut self, enabled: bool) -> Self {
        self.log_actions = enabled;
        self
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
