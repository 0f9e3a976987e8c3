//! Throttle and stream configuration contracts.
//!
//! Values are supplied once at construction and never mutated afterwards.
//! Invalid values fall back to documented defaults instead of failing.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::RateMode;

pub const DEFAULT_HIGH_FREQUENCY_MS: u64 = 100;
pub const DEFAULT_LOW_FREQUENCY_MS: u64 = 1000;
pub const DEFAULT_STATIC_THRESHOLD: f64 = 0.1;
pub const DEFAULT_STATIC_DURATION_MS: u64 = 2000;

/// A configuration value that was replaced by its default
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigWarning {
    /// Dotted field path
    pub field: String,
    /// What was wrong with the supplied value
    pub message: String,
}

impl ConfigWarning {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Adaptive throttler configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Emission interval while moving (ms)
    pub high_frequency_ms: u64,
    /// Emission interval while still (ms)
    pub low_frequency_ms: u64,
    /// Acceleration magnitude above which the device counts as moving
    pub static_threshold: f64,
    /// Quiet time before switching to the static regime (ms)
    pub static_duration_ms: u64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            high_frequency_ms: DEFAULT_HIGH_FREQUENCY_MS,
            low_frequency_ms: DEFAULT_LOW_FREQUENCY_MS,
            static_threshold: DEFAULT_STATIC_THRESHOLD,
            static_duration_ms: DEFAULT_STATIC_DURATION_MS,
        }
    }
}

impl ThrottleConfig {
    /// Replace invalid values with defaults, reporting each replacement
    pub fn sanitized(self) -> (Self, Vec<ConfigWarning>) {
        let mut warnings = Vec::new();
        let mut config = self;

        if config.high_frequency_ms == 0 {
            warnings.push(ConfigWarning::new(
                "high_frequency_ms",
                format!("must be > 0, using {DEFAULT_HIGH_FREQUENCY_MS}"),
            ));
            config.high_frequency_ms = DEFAULT_HIGH_FREQUENCY_MS;
        }
        if config.low_frequency_ms == 0 {
            warnings.push(ConfigWarning::new(
                "low_frequency_ms",
                format!("must be > 0, using {DEFAULT_LOW_FREQUENCY_MS}"),
            ));
            config.low_frequency_ms = DEFAULT_LOW_FREQUENCY_MS;
        }
        if !config.static_threshold.is_finite() || config.static_threshold < 0.0 {
            warnings.push(ConfigWarning::new(
                "static_threshold",
                format!(
                    "must be finite and >= 0 (got {}), using {DEFAULT_STATIC_THRESHOLD}",
                    config.static_threshold
                ),
            ));
            config.static_threshold = DEFAULT_STATIC_THRESHOLD;
        }
        if config.static_duration_ms == 0 {
            warnings.push(ConfigWarning::new(
                "static_duration_ms",
                format!("must be > 0, using {DEFAULT_STATIC_DURATION_MS}"),
            ));
            config.static_duration_ms = DEFAULT_STATIC_DURATION_MS;
        }

        (config, warnings)
    }

    /// Interval bound to a rate mode
    pub fn interval_for(&self, mode: RateMode) -> Duration {
        match mode {
            RateMode::Active => Duration::from_millis(self.high_frequency_ms),
            RateMode::Static => Duration::from_millis(self.low_frequency_ms),
        }
    }

    pub fn static_duration(&self) -> Duration {
        Duration::from_millis(self.static_duration_ms)
    }
}

/// Per-subscription stream arguments
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// High-frequency (or fixed) emission interval (ms)
    pub throttle_ms: u64,
    /// Prefer slower sensor cadence and coarser location accuracy
    pub low_power_mode: bool,
    /// Use the motion-driven adaptive throttler instead of a fixed one
    pub adaptive_throttling: bool,
    /// Static-regime interval (ms)
    pub low_frequency_ms: u64,
    /// Motion threshold
    pub static_threshold: f64,
    /// Quiet time before the static regime (ms)
    pub static_duration_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            throttle_ms: DEFAULT_HIGH_FREQUENCY_MS,
            low_power_mode: false,
            adaptive_throttling: false,
            low_frequency_ms: DEFAULT_LOW_FREQUENCY_MS,
            static_threshold: DEFAULT_STATIC_THRESHOLD,
            static_duration_ms: DEFAULT_STATIC_DURATION_MS,
        }
    }
}

impl StreamConfig {
    /// Map onto the throttler configuration
    pub fn to_throttle_config(&self) -> ThrottleConfig {
        ThrottleConfig {
            high_frequency_ms: self.throttle_ms,
            low_frequency_ms: self.low_frequency_ms,
            static_threshold: self.static_threshold,
            static_duration_ms: self.static_duration_ms,
        }
    }
}
