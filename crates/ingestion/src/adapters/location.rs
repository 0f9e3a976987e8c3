//! Location adapter

use contracts::Fragment;

use crate::adapter::{SampleAdapter, SampleKind};

pub const FIELD_LATITUDE: &str = "lat";
pub const FIELD_LONGITUDE: &str = "lon";
pub const FIELD_ALTITUDE: &str = "alt";
pub const FIELD_ACCURACY: &str = "accuracy";

/// Position fix
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationSample {
    /// Degrees, WGS84
    pub latitude: f64,
    /// Degrees, WGS84
    pub longitude: f64,
    /// Meters
    pub altitude: f64,
    /// Horizontal accuracy radius in meters
    pub accuracy: f64,
}

impl LocationSample {
    pub fn new(latitude: f64, longitude: f64, altitude: f64, accuracy: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
            accuracy,
        }
    }
}

impl SampleAdapter for LocationSample {
    fn kind(&self) -> SampleKind {
        SampleKind::Location
    }

    fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
            && self.altitude.is_finite()
            && self.accuracy.is_finite()
    }

    fn to_fragment(&self, ts_ms: i64) -> Fragment {
        Fragment::new()
            .with(FIELD_LATITUDE, self.latitude)
            .with(FIELD_LONGITUDE, self.longitude)
            .with(FIELD_ALTITUDE, self.altitude)
            .with(FIELD_ACCURACY, self.accuracy)
            .with_timestamp(ts_ms)
    }
}
