//! Throttle Engine - motion-adaptive record throttling
//!
//! Coalesces high-frequency sensor fragments into records emitted at a
//! bounded rate, slowing down while the device is still.
//!
//! # Components
//!
//! - [`MotionClassifier`]: debounced active/static detection
//! - [`CoalescingThrottler`]: last-write-wins buffer with one deferred emission
//! - [`AdaptiveThrottler`]: classifier-driven throttler with mode-change records
//! - [`TokioScheduler`]: cancellable one-shot timers

mod adaptive;
mod classifier;
mod coalescer;
mod error;
mod metrics;
mod scheduler;

pub use adaptive::{AdaptiveThrottler, AdaptiveThrottlerBuilder};
pub use classifier::{MotionClassifier, TransitionCallback};
pub use coalescer::{CoalescerConfig, CoalescingThrottler, ThrottlerState};
pub use error::EngineError;
pub use metrics::{ThrottleMetrics, ThrottleMetricsSnapshot};
pub use scheduler::{TimerHandle, TokioScheduler};
