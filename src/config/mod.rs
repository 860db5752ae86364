use crate::error::{Error, Result};
use dashmap::DashMap;
use std::env;
use std::sync::Arc;
use std::time::Duration;

/// Environment key for the shutdown timeout, in milliseconds
pub const SHUTDOWN_TIMEOUT_MS: &str = "MULTISERVE_SHUTDOWN_TIMEOUT_MS";
/// Environment key enabling shutdown on SIGINT/SIGTERM
pub const SHUTDOWN_ON_SIGNAL: &str = "MULTISERVE_SHUTDOWN_ON_SIGNAL";

/// Configuration service
#[derive(Clone, Default)]
pub struct ConfigService {
    config: Arc<DashMap<String, String>>,
}

impl ConfigService {
    /// Create a store seeded from the process environment
    pub fn from_env() -> Self {
        let service = Self::default();
        for (key, value) in env::vars() {
            service.set(&key, &value);
        }
        service
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.config.get(key).map(|v| v.clone())
    }

    pub fn set(&self, key: &str, value: &str) {
        self.config.insert(key.to_string(), value.to_string());
    }

    pub fn get_u64(&self, key: &str) -> Result<Option<u64>> {
        self.get(key)
            .map(|raw| {
                raw.trim()
                    .parse::<u64>()
                    .map_err(|e| Error::config(key, format!("`{raw}` is not a number: {e}")))
            })
            .transpose()
    }

    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        self.get(key)
            .map(|raw| match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(true),
                "false" | "0" | "no" | "off" => Ok(false),
                _ => Err(Error::config(key, format!("`{raw}` is not a boolean"))),
            })
            .transpose()
    }
}

/// Settings for a [`Coordinator`](crate::lifecycle::Coordinator)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Window services get to stop; `None` means they get none
    pub shutdown_timeout: Option<Duration>,
    /// Shut down on SIGINT/SIGTERM
    pub shutdown_on_signal: bool,
}

impl CoordinatorConfig {
    /// Read the coordinator settings from the process environment
    pub fn from_env() -> Result<Self> {
        Self::load(&ConfigService::from_env())
    }

    pub fn load(config: &ConfigService) -> Result<Self> {
        let shutdown_timeout = config
            .get_u64(SHUTDOWN_TIMEOUT_MS)?
            .map(Duration::from_millis);
        let shutdown_on_signal = config.get_bool(SHUTDOWN_ON_SIGNAL)?.unwrap_or(false);

        tracing::debug!(?shutdown_timeout, shutdown_on_signal, "Loaded coordinator config");

        Ok(Self {
            shutdown_timeout,
            shutdown_on_signal,
        })
    }
}
