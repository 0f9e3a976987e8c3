//! Platform sensor events delivered to a session

use crate::adapters::{AccelerationSample, LocationSample, OrientationSample};

/// One already-decoded platform callback
#[derive(Debug, Clone, PartialEq)]
pub enum SensorEvent {
    Orientation(OrientationSample),
    MagnetometerAccuracy(i64),
    Location(LocationSample),
    Acceleration(AccelerationSample),
    ProviderDisabled(String),
}

impl SensorEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Orientation(_) => "orientation",
            Self::MagnetometerAccuracy(_) => "magnetometer_accuracy",
            Self::Location(_) => "location",
            Self::Acceleration(_) => "acceleration",
            Self::ProviderDisabled(_) => "provider_disabled",
        }
    }
}
