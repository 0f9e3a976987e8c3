//! Motion classifier with hysteresis.
//!
//! Turns acceleration-magnitude samples into an active/static signal:
//! any sample above the threshold flips to active immediately, while the
//! flip to static is debounced by a single static-check timer.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use contracts::{ModeTransition, RateMode};
use tokio::time::Instant;
use tracing::{debug, instrument, trace};

use crate::scheduler::{TimerHandle, TokioScheduler};

/// Receives transitions detected when the static-check timer fires
pub type TransitionCallback = Arc<dyn Fn(ModeTransition) + Send + Sync>;

/// Outstanding static-check timer
#[derive(Debug)]
struct StaticCheck {
    token: u64,
    timer: TimerHandle,
}

#[derive(Debug)]
struct MotionState {
    mode: RateMode,
    last_movement: Instant,
    static_check: Option<StaticCheck>,
    next_token: u64,
    sequence: u64,
    disposed: bool,
}

impl MotionState {
    fn cancel_static_check(&mut self) {
        if let Some(check) = self.static_check.take() {
            check.timer.cancel();
        }
    }

    fn transition_to(&mut self, mode: RateMode) -> ModeTransition {
        let from = self.mode;
        self.mode = mode;
        self.sequence += 1;
        ModeTransition::new(from, mode, self.sequence)
    }
}

struct ClassifierInner {
    threshold: f64,
    static_duration: Duration,
    scheduler: TokioScheduler,
    on_deferred: TransitionCallback,
    state: Mutex<MotionState>,
}

impl ClassifierInner {
    fn lock(&self) -> MutexGuard<'_, MotionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Static-check timer body
    fn run_static_check(&self, token: u64) {
        let transition = {
            let mut state = self.lock();
            if state.disposed {
                return;
            }
            match &state.static_check {
                Some(check) if check.token == token => {}
                _ => {
                    trace!(token, "stale static check ignored");
                    return;
                }
            }
            state.static_check = None;

            let quiet_for = Instant::now().saturating_duration_since(state.last_movement);
            if state.mode.is_active() && quiet_for >= self.static_duration {
                Some(state.transition_to(RateMode::Static))
            } else {
                debug!(
                    quiet_ms = quiet_for.as_millis() as u64,
                    "movement seen since check was scheduled, staying active"
                );
                None
            }
        };

        if let Some(transition) = transition {
            debug!(
                quiet_ms = self.static_duration.as_millis() as u64,
                "no movement, switching to static"
            );
            (self.on_deferred)(transition);
        }
    }
}

impl Drop for ClassifierInner {
    fn drop(&mut self) {
        self.state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel_static_check();
    }
}

/// Debounced motion classifier
///
/// Starts in [`RateMode::Active`]. Safe to call from high-frequency
/// producers on any thread; at most one static-check timer is outstanding.
#[derive(Clone)]
pub struct MotionClassifier {
    inner: Arc<ClassifierInner>,
}

impl MotionClassifier {
    /// Create a classifier
    ///
    /// `on_deferred` receives the active→static transition when the
    /// static-check timer confirms enough quiet time.
    pub fn new(
        static_threshold: f64,
        static_duration: Duration,
        scheduler: TokioScheduler,
        on_deferred: TransitionCallback,
    ) -> Self {
        let state = MotionState {
            mode: RateMode::Active,
            last_movement: Instant::now(),
            static_check: None,
            next_token: 0,
            sequence: 0,
            disposed: false,
        };

        Self {
            inner: Arc::new(ClassifierInner {
                threshold: static_threshold,
                static_duration,
                scheduler,
                on_deferred,
                state: Mutex::new(state),
            }),
        }
    }

    /// Classify one acceleration-magnitude sample
    ///
    /// Returns the static→active transition synchronously. The active→static
    /// transition is delivered later through the deferred callback.
    /// Non-finite samples are ignored; negative samples count as still.
    #[instrument(level = "trace", name = "motion_classify", skip(self, now))]
    pub fn classify(&self, magnitude: f64, now: Instant) -> Option<ModeTransition> {
        if !magnitude.is_finite() {
            trace!("non-finite magnitude ignored");
            return None;
        }
        let magnitude = magnitude.max(0.0);

        let mut state = self.inner.lock();
        if state.disposed {
            return None;
        }

        if magnitude > self.inner.threshold {
            state.last_movement = now;
            state.cancel_static_check();

            if state.mode == RateMode::Static {
                let transition = state.transition_to(RateMode::Active);
                debug!(magnitude, "movement detected, switching to active");
                return Some(transition);
            }
        } else if state.mode.is_active() && state.static_check.is_none() {
            let token = state.next_token;
            state.next_token += 1;

            let weak: Weak<ClassifierInner> = Arc::downgrade(&self.inner);
            let timer = self
                .inner
                .scheduler
                .schedule(self.inner.static_duration, move || {
                    if let Some(inner) = weak.upgrade() {
                        inner.run_static_check(token);
                    }
                });
            state.static_check = Some(StaticCheck { token, timer });
            trace!(token, "static check scheduled");
        }

        None
    }

    /// Classify a sample stamped with the current time
    pub fn observe(&self, magnitude: f64) -> Option<ModeTransition> {
        self.classify(magnitude, Instant::now())
    }

    /// Current mode
    pub fn mode(&self) -> RateMode {
        self.inner.lock().mode
    }

    /// Whether a static-check timer is outstanding
    pub fn has_pending_check(&self) -> bool {
        self.inner.lock().static_check.is_some()
    }

    /// Timestamp of the last above-threshold sample
    pub fn last_movement(&self) -> Instant {
        self.inner.lock().last_movement
    }

    /// Cancel the static-check timer and stop classifying. Idempotent.
    pub fn dispose(&self) {
        let mut state = self.inner.lock();
        state.disposed = true;
        state.cancel_static_check();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.lock().disposed
    }
}

impl std::fmt::Debug for MotionClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MotionClassifier")
            .field("threshold", &self.inner.threshold)
            .field("static_duration", &self.inner.static_duration)
            .finish_non_exhaustive()
    }
}
