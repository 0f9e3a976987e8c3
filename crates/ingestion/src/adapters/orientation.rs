//! Orientation adapter

use contracts::Fragment;

use crate::adapter::{SampleAdapter, SampleKind};

pub const FIELD_HEADING: &str = "heading";
pub const FIELD_PITCH: &str = "pitch";
pub const FIELD_ROLL: &str = "roll";
pub const FIELD_MAGNETOMETER_ACCURACY: &str = "magnetometerAccuracy";

/// Magnetometer calibration level reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MagnetometerAccuracy {
    Unreliable = 0,
    Low = 1,
    Medium = 2,
    High = 3,
}

impl MagnetometerAccuracy {
    /// Map a raw platform level (0..=3)
    pub fn from_level(level: i64) -> Option<Self> {
        match level {
            0 => Some(Self::Unreliable),
            1 => Some(Self::Low),
            2 => Some(Self::Medium),
            3 => Some(Self::High),
            _ => None,
        }
    }

    pub fn level(&self) -> i64 {
        *self as i64
    }
}

/// Normalize an azimuth in degrees to `[0, 360)`
pub fn normalize_heading(degrees: f64) -> f64 {
    let heading = degrees.rem_euclid(360.0);
    // rem_euclid rounds tiny negatives up to exactly 360
    if heading >= 360.0 { 0.0 } else { heading }
}

/// Device attitude in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientationSample {
    /// Azimuth, any range; normalized on decode
    pub azimuth: f64,
    pub pitch: f64,
    pub roll: f64,
    /// Latest magnetometer accuracy, if one was ever reported
    pub accuracy: Option<MagnetometerAccuracy>,
}

impl OrientationSample {
    pub fn from_degrees(azimuth: f64, pitch: f64, roll: f64) -> Self {
        Self {
            azimuth,
            pitch,
            roll,
            accuracy: None,
        }
    }

    /// From yaw/pitch/roll in radians
    pub fn from_radians(yaw: f64, pitch: f64, roll: f64) -> Self {
        Self::from_degrees(yaw.to_degrees(), pitch.to_degrees(), roll.to_degrees())
    }

    pub fn with_accuracy(mut self, accuracy: Option<MagnetometerAccuracy>) -> Self {
        self.accuracy = accuracy;
        self
    }

    /// Heading in `[0, 360)`
    pub fn heading(&self) -> f64 {
        normalize_heading(self.azimuth)
    }
}

impl SampleAdapter for OrientationSample {
    fn kind(&self) -> SampleKind {
        SampleKind::Orientation
    }

    fn is_valid(&self) -> bool {
        self.azimuth.is_finite() && self.pitch.is_finite() && self.roll.is_finite()
    }

    fn to_fragment(&self, ts_ms: i64) -> Fragment {
        let mut fragment = Fragment::new()
            .with(FIELD_HEADING, self.heading())
            .with(FIELD_PITCH, self.pitch)
            .with(FIELD_ROLL, self.roll)
            .with_timestamp(ts_ms);
        if let Some(accuracy) = self.accuracy {
            fragment.insert(FIELD_MAGNETOMETER_ACCURACY, accuracy.level());
        }
        fragment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{FieldValue, FIELD_TIMESTAMP};

    #[test]
    fn test_normalize_heading() {
        assert_eq!(normalize_heading(-90.0), 270.0);
        assert_eq!(normalize_heading(360.0), 0.0);
        assert_eq!(normalize_heading(725.0), 5.0);
        assert_eq!(normalize_heading(12.5), 12.5);

        let tiny = normalize_heading(-1e-15);
        assert!((0.0..360.0).contains(&tiny));
    }

    #[test]
    fn test_from_radians() {
        let sample = OrientationSample::from_radians(-std::f64::consts::FRAC_PI_2, 0.0, 0.0);
        assert!((sample.heading() - 270.0).abs() < 1e-9);
    }

    #[test]
    fn test_fragment_fields() {
        let fragment = OrientationSample::from_degrees(-10.0, 5.0, -2.0).to_fragment(1_700_000);

        assert_eq!(fragment.get(FIELD_HEADING), Some(&FieldValue::Float(350.0)));
        assert_eq!(fragment.get(FIELD_PITCH), Some(&FieldValue::Float(5.0)));
        assert_eq!(fragment.get(FIELD_ROLL), Some(&FieldValue::Float(-2.0)));
        assert_eq!(fragment.get(FIELD_TIMESTAMP), Some(&FieldValue::Int(1_700_000)));
        assert!(!fragment.contains(FIELD_MAGNETOMETER_ACCURACY));
    }

    #[test]
    fn test_accuracy_included_once_known() {
        let fragment = OrientationSample::from_degrees(0.0, 0.0, 0.0)
            .with_accuracy(MagnetometerAccuracy::from_level(2))
            .to_fragment(0);
        assert_eq!(
            fragment.get(FIELD_MAGNETOMETER_ACCURACY),
            Some(&FieldValue::Int(2))
        );
    }

    #[test]
    fn test_accuracy_levels() {
        assert_eq!(MagnetometerAccuracy::from_level(0), Some(MagnetometerAccuracy::Unreliable));
        assert_eq!(MagnetometerAccuracy::from_level(3), Some(MagnetometerAccuracy::High));
        assert_eq!(MagnetometerAccuracy::from_level(4), None);
        assert_eq!(MagnetometerAccuracy::Low.level(), 1);
    }

    #[test]
    fn test_non_finite_is_invalid() {
        assert!(!OrientationSample::from_degrees(f64::NAN, 0.0, 0.0).is_valid());
        assert!(OrientationSample::from_degrees(400.0, 0.0, 0.0).is_valid());
    }
}
