//! Sampling profile and session metrics

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Location accuracy the platform should be asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationAccuracy {
    /// Best available fix
    Best,
    /// Roughly ten meters, cheaper on battery
    NearestTenMeters,
}

/// Recommended platform sampling cadence for a stream
///
/// Informational; the session never samples sensors itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingProfile {
    /// Orientation update interval
    pub orientation_interval: Duration,
    /// Linear-acceleration update interval (motion detection)
    pub motion_interval: Duration,
    /// Requested location accuracy
    pub location_accuracy: LocationAccuracy,
    /// Minimum movement between location updates (meters)
    pub location_distance_filter_m: f64,
}

impl SamplingProfile {
    /// Profile for the given power mode
    pub fn for_power_mode(low_power_mode: bool) -> Self {
        if low_power_mode {
            Self {
                orientation_interval: Duration::from_millis(200),
                motion_interval: Duration::from_millis(20),
                location_accuracy: LocationAccuracy::NearestTenMeters,
                location_distance_filter_m: 5.0,
            }
        } else {
            Self {
                orientation_interval: Duration::from_millis(100),
                motion_interval: Duration::from_millis(20),
                location_accuracy: LocationAccuracy::Best,
                location_distance_filter_m: 5.0,
            }
        }
    }
}

/// Session metrics
#[derive(Debug, Default)]
pub struct SessionMetrics {
    /// Orientation samples accepted
    pub orientation_samples: AtomicU64,

    /// Location samples accepted
    pub location_samples: AtomicU64,

    /// Acceleration samples fed to the classifier
    pub motion_samples: AtomicU64,

    /// Samples rejected as non-finite or out of range
    pub invalid_samples: AtomicU64,

    /// Provider-disabled reports
    pub provider_errors: AtomicU64,

    /// Callbacks ignored after cancel
    pub ignored_after_cancel: AtomicU64,
}

impl SessionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_orientation(&self) {
        self.orientation_samples.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_location(&self) {
        self.location_samples.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_motion(&self) {
        self.motion_samples.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalid(&self) {
        self.invalid_samples.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_provider_error(&self) {
        self.provider_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ignored(&self) {
        self.ignored_after_cancel.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> SessionMetricsSnapshot {
        SessionMetricsSnapshot {
            orientation_samples: self.orientation_samples.load(Ordering::Relaxed),
            location_samples: self.location_samples.load(Ordering::Relaxed),
            motion_samples: self.motion_samples.load(Ordering::Relaxed),
            invalid_samples: self.invalid_samples.load(Ordering::Relaxed),
            provider_errors: self.provider_errors.load(Ordering::Relaxed),
            ignored_after_cancel: self.ignored_after_cancel.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionMetricsSnapshot {
    pub orientation_samples: u64,
    pub location_samples: u64,
    pub motion_samples: u64,
    pub invalid_samples: u64,
    pub provider_errors: u64,
    pub ignored_after_cancel: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_low_power_profile_is_coarser() {
        let low = SamplingProfile::for_power_mode(true);
        let normal = SamplingProfile::for_power_mode(false);

        assert!(low.orientation_interval > normal.orientation_interval);
        assert_eq!(low.location_accuracy, LocationAccuracy::NearestTenMeters);
        assert_eq!(normal.location_accuracy, LocationAccuracy::Best);
    }
}
