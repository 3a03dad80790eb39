//! Acquirer configuration.

use crate::acquire::backoff::ReconnectPolicy;
use crate::error::{AcquireError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Allowed polling interval range in seconds.
pub const POLL_INTERVAL_BOUNDS: (u64, u64) = (1, 60);

/// Immutable configuration shared by the acquirers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquirerConfig {
    /// Base URL for the REST endpoints (`/ping`, `/cpu`)
    pub base_url: String,
    /// Base URL for the streaming endpoints (`/memory`)
    pub ws_url: String,
    /// Polling interval in seconds, bounded [1, 60]
    pub poll_interval_secs: u64,
    /// Debounce window for manual triggers, in milliseconds
    pub debounce_ms: u64,
    /// Maximum automatic reconnect attempts before giving up
    pub max_reconnect_attempts: u32,
    /// Base delay for exponential backoff, in milliseconds
    pub base_backoff_ms: u64,
    /// Upper bound on the backoff delay, in milliseconds
    pub backoff_cap_ms: u64,
}

impl Default for AcquirerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            ws_url: "ws://localhost:8000/ws".to_string(),
            poll_interval_secs: crate::DEFAULT_POLL_INTERVAL_SECS,
            debounce_ms: crate::DEFAULT_DEBOUNCE_MS,
            max_reconnect_attempts: crate::DEFAULT_MAX_RECONNECT_ATTEMPTS,
            base_backoff_ms: crate::DEFAULT_BASE_BACKOFF_MS,
            backoff_cap_ms: crate::DEFAULT_BACKOFF_CAP_MS,
        }
    }
}

impl AcquirerConfig {
    /// Create a configuration with custom endpoint bases.
    pub fn new(base_url: impl Into<String>, ws_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ws_url: ws_url.into(),
            ..Default::default()
        }
    }

    /// Set the REST base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the streaming base URL.
    pub fn with_ws_url(mut self, ws_url: impl Into<String>) -> Self {
        self.ws_url = ws_url.into();
        self
    }

    /// Set the polling interval in seconds.
    pub fn with_poll_interval_secs(mut self, secs: u64) -> Self {
        self.poll_interval_secs = secs;
        self
    }

    /// Set the debounce window in milliseconds.
    pub fn with_debounce_ms(mut self, ms: u64) -> Self {
        self.debounce_ms = ms;
        self
    }

    /// Set the maximum number of automatic reconnect attempts.
    pub fn with_max_reconnect_attempts(mut self, max: u32) -> Self {
        self.max_reconnect_attempts = max;
        self
    }

    /// Set the base backoff delay in milliseconds.
    pub fn with_base_backoff_ms(mut self, ms: u64) -> Self {
        self.base_backoff_ms = ms;
        self
    }

    /// Set the backoff cap in milliseconds.
    pub fn with_backoff_cap_ms(mut self, ms: u64) -> Self {
        self.backoff_cap_ms = ms;
        self
    }

    /// Validate field bounds.
    pub fn validate(&self) -> Result<()> {
        let (min, max) = POLL_INTERVAL_BOUNDS;
        if !(min..=max).contains(&self.poll_interval_secs) {
            return Err(AcquireError::config_error(format!(
                "poll interval must be within [{min}, {max}] seconds, got {}",
                self.poll_interval_secs
            )));
        }
        if self.base_backoff_ms == 0 {
            return Err(AcquireError::config_error("base backoff must be non-zero"));
        }
        if self.backoff_cap_ms < self.base_backoff_ms {
            return Err(AcquireError::config_error(
                "backoff cap must be at least the base delay",
            ));
        }
        Ok(())
    }

    /// The reconnect policy derived from the backoff fields.
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(
            Duration::from_millis(self.base_backoff_ms),
            Duration::from_millis(self.backoff_cap_ms),
            self.max_reconnect_attempts,
        )
    }

    /// Debounce window as a [`Duration`].
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AcquirerConfig::default();
        assert_eq!(config.poll_interval_secs, 5);
        assert_eq!(config.debounce_ms, 1000);
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.base_backoff_ms, 1000);
        assert_eq!(config.backoff_cap_ms, 16000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = AcquirerConfig::new("http://pc:9000/api", "ws://pc:9000/ws")
            .with_poll_interval_secs(10)
            .with_debounce_ms(500)
            .with_max_reconnect_attempts(3);

        assert_eq!(config.base_url, "http://pc:9000/api");
        assert_eq!(config.ws_url, "ws://pc:9000/ws");
        assert_eq!(config.poll_interval_secs, 10);
        assert_eq!(config.debounce_ms, 500);
        assert_eq!(config.max_reconnect_attempts, 3);
    }

    #[test]
    fn test_interval_bounds() {
        assert!(AcquirerConfig::default()
            .with_poll_interval_secs(0)
            .validate()
            .is_err());
        assert!(AcquirerConfig::default()
            .with_poll_interval_secs(61)
            .validate()
            .is_err());
        assert!(AcquirerConfig::default()
            .with_poll_interval_secs(1)
            .validate()
            .is_ok());
        assert!(AcquirerConfig::default()
            .with_poll_interval_secs(60)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_backoff_bounds() {
        assert!(AcquirerConfig::default()
            .with_base_backoff_ms(0)
            .validate()
            .is_err());
        assert!(AcquirerConfig::default()
            .with_base_backoff_ms(2000)
            .with_backoff_cap_ms(1000)
            .validate()
            .is_err());
    }
}
