//! Platform sample adapters
//!
//! Each adapter turns one already-sampled platform reading into a
//! [`contracts::Fragment`] with the field names consumers expect.

mod location;
mod motion;
mod orientation;

pub use location::{LocationSample, FIELD_ACCURACY, FIELD_ALTITUDE, FIELD_LATITUDE, FIELD_LONGITUDE};
pub use motion::{acceleration_magnitude, AccelerationSample};
pub use orientation::{
    normalize_heading, MagnetometerAccuracy, OrientationSample, FIELD_HEADING,
    FIELD_MAGNETOMETER_ACCURACY, FIELD_PITCH, FIELD_ROLL,
};
