//! Defense Configuration
//!
//! Numeric policy parameters and policy flags for the defense engine.
//! Defaults reproduce the RREQ flooding deployment (3 messages per second,
//! block after 10 violations).

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

use crate::types::Seconds;

/// Default sliding window length (seconds)
pub const DEFAULT_WINDOW_SECS: Seconds = 1.0;

/// Default events admitted per window
pub const DEFAULT_RATE_LIMIT: u32 = 3;

/// Default violations before permanent block
pub const DEFAULT_BLOCK_THRESHOLD: u32 = 10;

/// Default consecutive events inspected by the burst check
pub const DEFAULT_BURST_SIZE: u32 = 5;

/// Default burst span (seconds)
pub const DEFAULT_BURST_SPAN_SECS: Seconds = 0.5;

/// Configuration errors. All of them are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("window_secs must be a positive, finite number of seconds (got {0})")]
    InvalidWindow(Seconds),

    #[error("rate_limit must be at least 1")]
    ZeroRateLimit,

    #[error("block_threshold must be at least 1")]
    ZeroBlockThreshold,

    #[error("burst_size must be at least 1")]
    ZeroBurstSize,

    #[error("burst_span_secs must be a positive, finite number of seconds (got {0})")]
    InvalidBurstSpan(Seconds),

    #[error("failed to read or write config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Policy configuration for the defense engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefenseConfig {
    // === Rate limiting ===

    /// Sliding window length (seconds)
    pub window_secs: Seconds,

    /// Maximum events admitted per source inside one window
    pub rate_limit: u32,

    // === Escalation ===

    /// Violations after which a source is blocked for the rest of the run
    pub block_threshold: u32,

    /// Escalate sources to a permanent block once the threshold is reached.
    /// When off, violations are still counted and reported.
    pub permanent_block: bool,

    // === Burst detection ===

    /// Run the burst sub-check on admitted events
    pub burst_detection: bool,

    /// Number of consecutive admitted events inspected by the burst check
    pub burst_size: u32,

    /// Events spanning less than this are a burst (seconds)
    pub burst_span_secs: Seconds,

    /// Keep a burst-flagged event in the window for later rate computation
    pub burst_retains_event: bool,
}

impl Default for DefenseConfig {
    fn default() -> Self {
        Self {
            window_secs: DEFAULT_WINDOW_SECS,
            rate_limit: DEFAULT_RATE_LIMIT,
            block_threshold: DEFAULT_BLOCK_THRESHOLD,
            permanent_block: true,
            burst_detection: false,
            burst_size: DEFAULT_BURST_SIZE,
            burst_span_secs: DEFAULT_BURST_SPAN_SECS,
            burst_retains_event: true,
        }
    }
}

impl DefenseConfig {
    /// RREQ flooding deployment: 3/s, permanent block after 10 violations
    pub fn flooding() -> Self {
        Self::default()
    }

    /// Sybil deployment: 3 per 5s window plus burst check, no permanent block
    pub fn sybil() -> Self {
        Self {
            window_secs: 5.0,
            rate_limit: 3,
            permanent_block: false,
            burst_detection: true,
            ..Self::default()
        }
    }

    /// Load configuration from TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    // Builder-style methods for CLI overrides

    /// Override the window length
    pub fn with_window_secs(mut self, secs: Seconds) -> Self {
        self.window_secs = secs;
        self
    }

    /// Override the per-window limit
    pub fn with_rate_limit(mut self, limit: u32) -> Self {
        self.rate_limit = limit;
        self
    }

    /// Override the block threshold
    pub fn with_block_threshold(mut self, threshold: u32) -> Self {
        self.block_threshold = threshold;
        self
    }

    /// Turn permanent blocking on or off
    pub fn with_permanent_block(mut self, enabled: bool) -> Self {
        self.permanent_block = enabled;
        self
    }

    /// Enable the burst check with the given size and span
    pub fn with_burst(mut self, size: u32, span_secs: Seconds) -> Self {
        self.burst_detection = true;
        self.burst_size = size;
        self.burst_span_secs = span_secs;
        self
    }

    /// Turn the burst check on or off
    pub fn with_burst_detection(mut self, enabled: bool) -> Self {
        self.burst_detection = enabled;
        self
    }

    /// Keep or release burst-flagged events
    pub fn with_burst_retains_event(mut self, retain: bool) -> Self {
        self.burst_retains_event = retain;
        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.window_secs.is_finite() && self.window_secs > 0.0) {
            return Err(ConfigError::InvalidWindow(self.window_secs));
        }

        if self.rate_limit == 0 {
            return Err(ConfigError::ZeroRateLimit);
        }

        if self.block_threshold == 0 {
            return Err(ConfigError::ZeroBlockThreshold);
        }

        if self.burst_detection {
            if self.burst_size == 0 {
                return Err(ConfigError::ZeroBurstSize);
            }

            if !(self.burst_span_secs.is_finite() && self.burst_span_secs > 0.0) {
                return Err(ConfigError::InvalidBurstSpan(self.burst_span_secs));
            }

            // The window never holds more than rate_limit events
            if self.burst_size > self.rate_limit {
                warn!(
                    "burst_size ({}) exceeds rate_limit ({}): burst check can never fire",
                    self.burst_size, self.rate_limit
                );
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DefenseConfig::default();
        assert_eq!(config.window_secs, 1.0);
        assert_eq!(config.rate_limit, 3);
        assert_eq!(config.block_threshold, 10);
        assert!(config.permanent_block);
        assert!(!config.burst_detection);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sybil_preset() {
        let config = DefenseConfig::sybil();
        assert_eq!(config.window_secs, 5.0);
        assert!(config.burst_detection);
        assert!(!config.permanent_block);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = DefenseConfig::default();

        config.window_secs = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidWindow(_))));

        config.window_secs = -1.0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidWindow(_))));

        config.window_secs = f64::NAN;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidWindow(_))));

        let config = DefenseConfig::default().with_rate_limit(0);
        assert!(matches!(config.validate(), Err(ConfigError::ZeroRateLimit)));

        let config = DefenseConfig::default().with_block_threshold(0);
        assert!(matches!(config.validate(), Err(ConfigError::ZeroBlockThreshold)));
    }

    #[test]
    fn test_burst_validation_only_when_enabled() {
        let mut config = DefenseConfig::default();
        config.burst_span_secs = 0.0;
        // Burst disabled: span is ignored
        assert!(config.validate().is_ok());

        config.burst_detection = true;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidBurstSpan(_))));

        let config = DefenseConfig::default().with_burst(0, 0.5);
        assert!(matches!(config.validate(), Err(ConfigError::ZeroBurstSize)));
    }

    #[test]
    fn test_builder_methods() {
        let config = DefenseConfig::default()
            .with_window_secs(2.0)
            .with_rate_limit(10)
            .with_block_threshold(4)
            .with_permanent_block(false)
            .with_burst(5, 0.25)
            .with_burst_retains_event(false);

        assert_eq!(config.window_secs, 2.0);
        assert_eq!(config.rate_limit, 10);
        assert_eq!(config.block_threshold, 4);
        assert!(!config.permanent_block);
        assert!(config.burst_detection);
        assert_eq!(config.burst_size, 5);
        assert_eq!(config.burst_span_secs, 0.25);
        assert!(!config.burst_retains_event);

        let config = DefenseConfig::sybil().with_burst_detection(false);
        assert!(!config.burst_detection);
        assert_eq!(config.burst_size, DEFAULT_BURST_SIZE);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shield.toml");

        let config = DefenseConfig::sybil().with_block_threshold(7);
        config.save(&path).unwrap();

        let loaded = DefenseConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "rate_limit = 8\n").unwrap();

        let loaded = DefenseConfig::load(&path).unwrap();
        assert_eq!(loaded.rate_limit, 8);
        assert_eq!(loaded.window_secs, DEFAULT_WINDOW_SECS);
        assert_eq!(loaded.block_threshold, DEFAULT_BLOCK_THRESHOLD);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = DefenseConfig::load(&dir.path().join("missing.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
