//! RateMode - emission cadence regime

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Emission cadence regime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateMode {
    /// Device moving: high-frequency interval
    #[default]
    Active,
    /// Device still: low-frequency interval
    Static,
}

impl RateMode {
    /// Marker string used in mode-change fragments
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Static => "static",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl fmt::Display for RateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A detected flip between rate modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeTransition {
    pub from: RateMode,
    pub to: RateMode,
    /// Monotonic per-classifier sequence; later transitions supersede earlier ones
    pub sequence: u64,
}

impl ModeTransition {
    pub fn new(from: RateMode, to: RateMode, sequence: u64) -> Self {
        Self { from, to, sequence }
    }
}

/// Side-channel observer notified synchronously on transition detection
///
/// Receives the new mode. Invoked before the synthetic mode-change
/// fragment goes through the throttling path.
pub type ModeObserver = Arc<dyn Fn(RateMode) + Send + Sync>;
