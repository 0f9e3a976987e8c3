//! Sample adapter trait

use contracts::Fragment;

/// Kind of decoded platform sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleKind {
    Orientation,
    Location,
    Acceleration,
}

impl SampleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Orientation => "orientation",
            Self::Location => "location",
            Self::Acceleration => "acceleration",
        }
    }
}

/// A decoded platform sample that becomes one fragment
///
/// Implementors only translate values; throttling and timing belong to
/// the session that receives the fragment.
pub trait SampleAdapter {
    /// Sample kind (used for logging/metrics)
    fn kind(&self) -> SampleKind;

    /// Whether every value is usable (finite and within range)
    fn is_valid(&self) -> bool;

    /// Build the fragment stamped with `ts_ms` (epoch milliseconds)
    fn to_fragment(&self, ts_ms: i64) -> Fragment;
}

/// Build the fragment for `sample`, rejecting unusable values
pub fn decode<A: SampleAdapter>(sample: &A, ts_ms: i64) -> Option<Fragment> {
    sample.is_valid().then(|| sample.to_fragment(ts_ms))
}
