//! # Ingestion
//!
//! Sensor sample ingestion for throttled streams.
//!
//! Responsibilities:
//! - Decode already-sampled platform readings into fragments
//! - Run one [`SensorStreamSession`] per subscription (fixed or adaptive)
//! - Provide scripted mock producers for demos and tests
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{MockSensorSource, MotionProfile, SensorStreamSession};
//!
//! let session = SensorStreamSession::new(stream_config, sink)?;
//! let source = MockSensorSource::with_profile("device", MotionProfile::default(), None);
//! let rx = source.start(256)?;
//!
//! session.start(Some(source.last_known_location()));
//! session.drive(rx).await;
//! ```

mod adapter;
mod adapters;
mod config;
mod error;
mod event;
mod mock;
mod session;

// Re-exports
pub use adapter::{decode, SampleAdapter, SampleKind};
pub use adapters::{
    acceleration_magnitude, normalize_heading, AccelerationSample, LocationSample,
    MagnetometerAccuracy, OrientationSample, FIELD_ACCURACY, FIELD_ALTITUDE, FIELD_HEADING,
    FIELD_LATITUDE, FIELD_LONGITUDE, FIELD_MAGNETOMETER_ACCURACY, FIELD_PITCH, FIELD_ROLL,
};
pub use config::{LocationAccuracy, SamplingProfile, SessionMetrics, SessionMetricsSnapshot};
pub use error::{IngestionError, Result};
pub use event::SensorEvent;
pub use mock::{MockSensorConfig, MockSensorSource, MotionPhase, MotionProfile};
pub use session::{SensorStreamSession, SessionBuilder};
