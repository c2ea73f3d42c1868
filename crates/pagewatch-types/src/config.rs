//! Monitoring configuration.
//!
//! [`MonitorConfig`] carries the tuning knobs for one monitored session:
//! the performance poll interval, the alert thresholds, and where
//! screenshots land. Loaded from TOML or constructed with defaults.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::TelemetryError;

/// Tuning knobs for a monitored browser session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Interval between performance metric snapshots, in milliseconds.
    pub poll_interval_ms: u64,
    /// Requests slower than this (send to receive) raise a slow-request
    /// alert, in milliseconds.
    pub slow_request_threshold_ms: i64,
    /// JS heap metric samples above this raise a high-memory alert.
    pub memory_threshold: f64,
    /// Directory screenshot captures are written under.
    pub screenshot_dir: PathBuf,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            poll_interval_ms: 2000,
            slow_request_threshold_ms: 1000,
            memory_threshold: 50_000_000.0,
            screenshot_dir: PathBuf::from("screenshots"),
        }
    }
}

impl MonitorConfig {
    /// Parse a config from TOML text. Missing fields take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, TelemetryError> {
        toml::from_str(text).map_err(|e| TelemetryError::Config(e.to_string()))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = MonitorConfig::default();
        assert_eq!(config.poll_interval_ms, 2000);
        assert_eq!(config.slow_request_threshold_ms, 1000);
        assert_eq!(config.memory_threshold, 50_000_000.0);
        assert_eq!(config.screenshot_dir, PathBuf::from("screenshots"));
    }

    #[test]
    fn partial_toml_keeps_defaults_for_missing_fields() {
        let config = MonitorConfig::from_toml_str("poll_interval_ms = 500\n").unwrap();
        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.slow_request_threshold_ms, 1000);
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let err = MonitorConfig::from_toml_str("poll_interval_ms = \"fast\"").unwrap_err();
        assert!(matches!(err, TelemetryError::Config(_)));
    }
}
