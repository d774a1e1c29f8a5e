//! # Bridge Configuration
//!
//! Layered configuration: built-in defaults, then an optional TOML file, then
//! `RUNTIME_BRIDGE_*` environment variables.

use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CALL_TIMEOUT, DEFAULT_NOTIFY_TIMEOUT, DEFAULT_OWNER_THREAD_NAME,
    DEFAULT_QUEUE_CAPACITY, ENV_PREFIX,
};
use crate::error::{BridgeError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Name given to the owner worker thread
    pub owner_thread_name: String,
    /// Capacity of the owner task queue
    pub queue_capacity: usize,
    /// Maximum time a host thread may block enqueueing onto a full queue
    pub notify_timeout_ms: u64,
    /// Maximum time to wait for a reply from a blocking owner call
    pub call_timeout_ms: u64,
    /// Overrides the environment-derived log level when set
    pub log_level: Option<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            owner_thread_name: DEFAULT_OWNER_THREAD_NAME.to_string(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            notify_timeout_ms: DEFAULT_NOTIFY_TIMEOUT.as_millis() as u64,
            call_timeout_ms: DEFAULT_CALL_TIMEOUT.as_millis() as u64,
            log_level: None,
        }
    }
}

impl BridgeConfig {
    /// Load configuration, reading `path` when given (it must exist).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let config: BridgeConfig = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides.
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(BridgeError::Configuration(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.owner_thread_name.trim().is_empty() {
            return Err(BridgeError::Configuration(
                "owner_thread_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_millis(self.notify_timeout_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn with_owner_thread_name(mut self, name: impl Into<String>) -> Self {
        self.owner_thread_name = name.into();
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_notify_timeout(mut self, timeout: Duration) -> Self {
        self.notify_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout_ms = timeout.as_millis() as u64;
        self
    }
}
