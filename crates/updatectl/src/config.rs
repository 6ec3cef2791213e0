//! Configuration for the fake instance fleet
//!
//! The configuration is built once from the command line, validated, and
//! then shared read-only by every simulated instance.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use updatectl_common::UpdatectlError;
use updatectl_omaha::InstallSource;

use crate::fakeclients::IdentityScheme;

/// Default update server
pub const DEFAULT_SERVER: &str = "http://localhost:8000";

/// Errors raised by [`FakeClientsConfig::validate`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("clients-per-app must be > 0")]
    NoClients,

    #[error("min-sleep ({min}s) must not exceed max-sleep ({max}s)")]
    SleepRange { min: u64, max: u64 },

    #[error("errorrate must be between 0 and 100, got {0}")]
    ErrorRate(u8),

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("invalid server URL '{server}': {reason}")]
    InvalidServer { server: String, reason: String },
}

impl From<ConfigError> for UpdatectlError {
    fn from(err: ConfigError) -> Self {
        UpdatectlError::Config(err.to_string())
    }
}

/// Immutable configuration shared by all simulated instances
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FakeClientsConfig {
    /// Update server base URL
    pub server: String,
    /// Number of instances to launch
    pub clients: usize,
    /// Lower bound of the poll interval, also the pause before a retried step
    pub min_sleep_secs: u64,
    /// Upper bound of the poll interval
    pub max_sleep_secs: u64,
    /// Chance (0-100) that a lifecycle step is reported as failed
    pub error_rate: u8,
    /// OEM tag reported by every instance
    pub oem: String,
    /// Heartbeats to send after the first successful install(s)
    pub ping_only: u32,
    /// Application id to report
    pub app_id: String,
    /// Group (track) id to report
    pub group_id: String,
    /// Starting version of every instance
    pub version: String,
    /// Report `ondemandupdate` instead of `scheduler` as install source
    pub force_update: bool,
    /// Dump every request/response pair
    pub verbose: bool,
    /// Base seed for per-instance randomness (OS entropy when unset)
    pub seed: Option<u64>,
    /// How machine ids are generated
    pub id_scheme: IdentityScheme,
    /// Timeout for a single request/response exchange
    pub request_timeout: Duration,
}

impl Default for FakeClientsConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            clients: 20,
            min_sleep_secs: 1,
            max_sleep_secs: 10,
            error_rate: 1,
            oem: "fakeclient".to_string(),
            ping_only: 0,
            app_id: String::new(),
            group_id: String::new(),
            version: "0.0.0".to_string(),
            force_update: false,
            verbose: false,
            seed: None,
            id_scheme: IdentityScheme::default(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl FakeClientsConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clients == 0 {
            return Err(ConfigError::NoClients);
        }

        if self.min_sleep_secs > self.max_sleep_secs {
            return Err(ConfigError::SleepRange {
                min: self.min_sleep_secs,
                max: self.max_sleep_secs,
            });
        }

        if self.error_rate > 100 {
            return Err(ConfigError::ErrorRate(self.error_rate));
        }

        if self.app_id.trim().is_empty() {
            return Err(ConfigError::MissingField("app-id"));
        }

        if self.group_id.trim().is_empty() {
            return Err(ConfigError::MissingField("group-id"));
        }

        let url = reqwest::Url::parse(&self.server).map_err(|e| ConfigError::InvalidServer {
            server: self.server.clone(),
            reason: e.to_string(),
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidServer {
                server: self.server.clone(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }

        Ok(())
    }

    /// Pause before resending a step that failed
    pub fn min_sleep(&self) -> Duration {
        Duration::from_secs(self.min_sleep_secs)
    }

    pub fn install_source(&self) -> InstallSource {
        InstallSource::for_force_update(self.force_update)
    }
}
