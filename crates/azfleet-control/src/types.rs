//! Configuration for VM control.

use std::time::Duration;

use serde::Deserialize;

/// Configuration for the fleet controller.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ControlConfig {
    /// How long start requests are suppressed after a capacity conflict
    /// (seconds).
    #[serde(default = "ControlConfig::default_unavailable_timeout")]
    pub unavailable_timeout_seconds: u64,

    /// Interval between state checks while waiting for a VM to run (seconds).
    #[serde(default = "ControlConfig::default_poll_interval")]
    pub start_poll_interval_seconds: u64,

    /// How long to wait for a started VM to report running (seconds).
    #[serde(default = "ControlConfig::default_start_timeout")]
    pub start_timeout_seconds: u64,
}

impl ControlConfig {
    const fn default_unavailable_timeout() -> u64 {
        600 // 10 minutes
    }

    const fn default_poll_interval() -> u64 {
        15
    }

    const fn default_start_timeout() -> u64 {
        600
    }

    /// Load configuration from environment variables.
    ///
    /// Supported environment variables:
    /// - `AZFLEET_UNAVAILABLE_TIMEOUT`: capacity cool-down in seconds
    /// - `AZFLEET_POLL_INTERVAL`: wait-for-running poll interval in seconds
    /// - `AZFLEET_START_TIMEOUT`: wait-for-running timeout in seconds
    ///
    /// Unparseable values are ignored.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(n) = env_u64("AZFLEET_UNAVAILABLE_TIMEOUT") {
            config.unavailable_timeout_seconds = n;
        }
        if let Some(n) = env_u64("AZFLEET_POLL_INTERVAL") {
            config.start_poll_interval_seconds = n;
        }
        if let Some(n) = env_u64("AZFLEET_START_TIMEOUT") {
            config.start_timeout_seconds = n;
        }

        config
    }

    /// The capacity cool-down as a `Duration`.
    #[must_use]
    pub fn unavailable_timeout(&self) -> Duration {
        Duration::from_secs(self.unavailable_timeout_seconds)
    }

    /// The poll interval as a `Duration`.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.start_poll_interval_seconds)
    }

    /// The wait-for-running timeout as a `Duration`.
    #[must_use]
    pub fn start_timeout(&self) -> Duration {
        Duration::from_secs(self.start_timeout_seconds)
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            unavailable_timeout_seconds: Self::default_unavailable_timeout(),
            start_poll_interval_seconds: Self::default_poll_interval(),
            start_timeout_seconds: Self::default_start_timeout(),
        }
    }
}
