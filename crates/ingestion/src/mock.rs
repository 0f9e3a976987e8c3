//! Mock sensor source
//!
//! Scripted producer for demos and tests without real hardware. Emits
//! orientation, location and acceleration events following a motion
//! profile of alternating moving/still phases.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, trace};

use crate::adapters::{AccelerationSample, LocationSample, OrientationSample};
use crate::error::{IngestionError, Result};
use crate::event::SensorEvent;

/// One scripted phase
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionPhase {
    pub moving: bool,
    pub duration: Duration,
}

impl MotionPhase {
    pub fn moving(duration: Duration) -> Self {
        Self {
            moving: true,
            duration,
        }
    }

    pub fn still(duration: Duration) -> Self {
        Self {
            moving: false,
            duration,
        }
    }
}

/// Sequence of phases, repeated cyclically
#[derive(Debug, Clone, PartialEq)]
pub struct MotionProfile {
    phases: Vec<MotionPhase>,
}

impl MotionProfile {
    pub fn new(phases: Vec<MotionPhase>) -> Self {
        Self { phases }
    }

    /// Walk for `moving`, stand for `still`, repeat
    pub fn walk_and_stop(moving: Duration, still: Duration) -> Self {
        Self::new(vec![MotionPhase::moving(moving), MotionPhase::still(still)])
    }

    /// Whether the device moves at `elapsed` into the profile
    ///
    /// An empty profile is always still.
    pub fn is_moving_at(&self, elapsed: Duration) -> bool {
        let cycle: Duration = self.phases.iter().map(|p| p.duration).sum();
        if cycle.is_zero() {
            return false;
        }

        let mut offset = Duration::from_nanos((elapsed.as_nanos() % cycle.as_nanos()) as u64);
        for phase in &self.phases {
            if offset < phase.duration {
                return phase.moving;
            }
            offset -= phase.duration;
        }
        false
    }

    pub fn phases(&self) -> &[MotionPhase] {
        &self.phases
    }
}

impl Default for MotionProfile {
    fn default() -> Self {
        Self::walk_and_stop(Duration::from_secs(5), Duration::from_secs(5))
    }
}

/// Mock sensor source configuration
#[derive(Debug, Clone)]
pub struct MockSensorConfig {
    /// Source ID
    pub source_id: String,

    /// Orientation rate (Hz)
    pub orientation_hz: f64,

    /// Location rate (Hz)
    pub location_hz: f64,

    /// Linear-acceleration rate (Hz)
    pub acceleration_hz: f64,

    /// Moving/still script
    pub profile: MotionProfile,

    /// Starting position
    pub origin: LocationSample,

    /// Report a magnetometer accuracy level at start
    pub magnetometer_accuracy: Option<i64>,

    /// RNG seed for reproducible runs
    pub seed: Option<u64>,
}

impl Default for MockSensorConfig {
    fn default() -> Self {
        Self {
            source_id: "mock_device".to_string(),
            orientation_hz: 10.0,
            location_hz: 1.0,
            acceleration_hz: 50.0,
            profile: MotionProfile::default(),
            origin: LocationSample::new(40.4168, -3.7038, 657.0, 5.0),
            magnetometer_accuracy: Some(3),
            seed: None,
        }
    }
}

/// Evolving mock device state
struct DeviceState {
    rng: StdRng,
    heading: f64,
    location: LocationSample,
}

impl DeviceState {
    fn acceleration(&mut self, moving: bool) -> AccelerationSample {
        let spread = if moving { 1.2 } else { 0.03 };
        let mut axis = || self.rng.random_range(-spread..spread);
        let sample = AccelerationSample::new(axis(), axis(), axis());
        if moving && sample.magnitude() <= 0.3 {
            // Walking never reads as still
            AccelerationSample::new(0.3, sample.y, sample.z)
        } else {
            sample
        }
    }

    fn orientation(&mut self, moving: bool) -> OrientationSample {
        let drift = if moving { 8.0 } else { 0.5 };
        self.heading += self.rng.random_range(-drift..drift);
        let pitch = self.rng.random_range(-2.0..2.0);
        let roll = self.rng.random_range(-2.0..2.0);
        OrientationSample::from_degrees(self.heading, pitch, roll)
    }

    fn location(&mut self, moving: bool) -> LocationSample {
        if moving {
            // ~1.4 m/s walking pace along the heading
            let step_deg = 1.4 / 111_320.0;
            let rad = self.heading.to_radians();
            self.location.latitude = (self.location.latitude + step_deg * rad.cos()).clamp(-90.0, 90.0);
            self.location.longitude += step_deg * rad.sin();
            if self.location.longitude > 180.0 {
                self.location.longitude -= 360.0;
            } else if self.location.longitude < -180.0 {
                self.location.longitude += 360.0;
            }
        }
        self.location.accuracy = self.rng.random_range(3.0..8.0);
        self.location
    }
}

fn period(hz: f64) -> Duration {
    if hz.is_finite() && hz > 0.0 {
        Duration::from_secs_f64(1.0 / hz)
    } else {
        Duration::from_secs(1)
    }
}

/// Mock sensor source
///
/// Generates simulated sensor events for testing.
pub struct MockSensorSource {
    config: MockSensorConfig,
    running: Arc<AtomicBool>,
}

impl MockSensorSource {
    /// Create a new mock source
    pub fn new(config: MockSensorConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Default device following `profile`
    pub fn with_profile(source_id: &str, profile: MotionProfile, seed: Option<u64>) -> Self {
        Self::new(MockSensorConfig {
            source_id: source_id.to_string(),
            profile,
            seed,
            ..Default::default()
        })
    }

    /// Start producing; returns the event stream
    ///
    /// The last known location (the configured origin) is not sent on the
    /// channel; pass [`MockSensorSource::last_known_location`] to the
    /// session's `start` instead.
    ///
    /// # Errors
    /// Returns [`IngestionError::AlreadyRunning`] if already started
    pub fn start(&self, channel_capacity: usize) -> Result<mpsc::Receiver<SensorEvent>> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(IngestionError::AlreadyRunning {
                source_id: self.config.source_id.clone(),
            });
        }

        let (tx, rx) = mpsc::channel(channel_capacity.max(1));
        let config = self.config.clone();
        let running = Arc::clone(&self.running);

        tokio::spawn(async move {
            let rng = match config.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_os_rng(),
            };
            let mut device = DeviceState {
                rng,
                heading: 0.0,
                location: config.origin,
            };

            let mut accel_tick = interval(period(config.acceleration_hz));
            let mut orientation_tick = interval(period(config.orientation_hz));
            let mut location_tick = interval(period(config.location_hz));
            for tick in [&mut accel_tick, &mut orientation_tick, &mut location_tick] {
                tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
            }

            let started = Instant::now();
            debug!(
                source_id = %config.source_id,
                acceleration_hz = config.acceleration_hz,
                orientation_hz = config.orientation_hz,
                location_hz = config.location_hz,
                "mock sensor source started"
            );

            if let Some(level) = config.magnetometer_accuracy {
                if tx.send(SensorEvent::MagnetometerAccuracy(level)).await.is_err() {
                    running.store(false, Ordering::SeqCst);
                    return;
                }
            }

            while running.load(Ordering::Relaxed) {
                let event = tokio::select! {
                    _ = accel_tick.tick() => {
                        let moving = config.profile.is_moving_at(started.elapsed());
                        SensorEvent::Acceleration(device.acceleration(moving))
                    }
                    _ = orientation_tick.tick() => {
                        let moving = config.profile.is_moving_at(started.elapsed());
                        SensorEvent::Orientation(device.orientation(moving))
                    }
                    _ = location_tick.tick() => {
                        let moving = config.profile.is_moving_at(started.elapsed());
                        SensorEvent::Location(device.location(moving))
                    }
                };

                trace!(source_id = %config.source_id, kind = event.kind(), "mock event");
                if tx.send(event).await.is_err() {
                    debug!(source_id = %config.source_id, "mock event channel closed");
                    break;
                }
            }

            running.store(false, Ordering::SeqCst);
            debug!(source_id = %config.source_id, "mock sensor source stopped");
        });

        Ok(rx)
    }

    /// Position to hand to the session at start
    pub fn last_known_location(&self) -> LocationSample {
        self.config.origin
    }

    /// Stop the mock source
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Check if running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn config(&self) -> &MockSensorConfig {
        &self.config
    }
}

impl Drop for MockSensorSource {
    fn drop(&mut self) {
        self.stop();
    }
}
