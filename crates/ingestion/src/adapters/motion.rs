//! Linear-acceleration adapter
//!
//! Acceleration never becomes a fragment; its magnitude feeds the motion
//! classifier.

use contracts::Fragment;

use crate::adapter::{SampleAdapter, SampleKind};

/// Euclidean norm of a gravity-free acceleration vector (m/s²)
pub fn acceleration_magnitude(x: f64, y: f64, z: f64) -> f64 {
    (x * x + y * y + z * z).sqrt()
}

/// Gravity-free acceleration vector (m/s²)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AccelerationSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl AccelerationSample {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn magnitude(&self) -> f64 {
        acceleration_magnitude(self.x, self.y, self.z)
    }
}

impl SampleAdapter for AccelerationSample {
    fn kind(&self) -> SampleKind {
        SampleKind::Acceleration
    }

    fn is_valid(&self) -> bool {
        self.magnitude().is_finite()
    }

    fn to_fragment(&self, ts_ms: i64) -> Fragment {
        Fragment::new()
            .with("acceleration", self.magnitude())
            .with_timestamp(ts_ms)
    }
}
