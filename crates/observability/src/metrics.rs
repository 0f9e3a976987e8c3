//! Stream metrics
//!
//! Facade helpers for events seen outside the throttler, plus an in-memory
//! aggregator over the records a stream emitted.

use std::collections::HashMap;
use std::fmt;

use contracts::{Record, RateMode, FIELD_MODE_CHANGE};
use metrics::{counter, gauge};

/// Count a raw sensor event before decoding
pub fn record_sensor_event(kind: &str) {
    counter!("geo_throttle_sensor_events_total", "kind" => kind.to_string()).increment(1);
}

/// Count a provider that went away mid-stream
pub fn record_provider_disabled(provider: &str) {
    counter!(
        "geo_throttle_provider_disabled_total",
        "provider" => provider.to_string()
    )
    .increment(1);
}

pub fn record_session_started(stream: &str, adaptive: bool) {
    let kind = if adaptive { "adaptive" } else { "fixed" };
    counter!(
        "geo_throttle_sessions_started_total",
        "stream" => stream.to_string(),
        "kind" => kind
    )
    .increment(1);
    gauge!("geo_throttle_sessions_active").increment(1.0);
}

pub fn record_session_stopped(stream: &str) {
    counter!("geo_throttle_sessions_stopped_total", "stream" => stream.to_string()).increment(1);
    gauge!("geo_throttle_sessions_active").decrement(1.0);
}

/// Aggregates what a stream emitted
///
/// Inter-emission gaps are attributed to the mode in effect when the later
/// record went out. A record carrying the mode-change marker switches the
/// mode before its own gap is counted, since it was throttled under the
/// new interval.
#[derive(Debug, Clone)]
pub struct EmissionStatsAggregator {
    pub total_records: u64,
    pub transitions_to_active: u64,
    pub transitions_to_static: u64,
    /// Gap statistics keyed by mode label
    pub interval_stats: HashMap<String, RunningStats>,
    /// How many records carried each field
    pub field_counts: HashMap<String, u64>,
    current_label: String,
    last_emit_ms: Option<f64>,
}

impl Default for EmissionStatsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl EmissionStatsAggregator {
    /// Aggregator for an adaptive stream (starts ACTIVE)
    pub fn new() -> Self {
        Self::with_initial_label(RateMode::Active.as_str())
    }

    /// Aggregator whose gaps start out attributed to `label`
    ///
    /// Fixed-rate streams use a label such as `"fixed"`.
    pub fn with_initial_label(label: impl Into<String>) -> Self {
        Self {
            total_records: 0,
            transitions_to_active: 0,
            transitions_to_static: 0,
            interval_stats: HashMap::new(),
            field_counts: HashMap::new(),
            current_label: label.into(),
            last_emit_ms: None,
        }
    }

    /// Label the next gap will be attributed to
    pub fn current_label(&self) -> &str {
        &self.current_label
    }

    /// Account for one emitted record observed at `at_ms` (monotonic)
    pub fn update(&mut self, record: &Record, at_ms: f64) {
        self.total_records += 1;

        if let Some(change) = record.get(FIELD_MODE_CHANGE).and_then(|v| v.as_str()) {
            if change == RateMode::Active.as_str() {
                self.transitions_to_active += 1;
            } else if change == RateMode::Static.as_str() {
                self.transitions_to_static += 1;
            }
            self.current_label = change.to_string();
        }

        if let Some(last) = self.last_emit_ms {
            self.interval_stats
                .entry(self.current_label.clone())
                .or_default()
                .push((at_ms - last).max(0.0));
        }
        self.last_emit_ms = Some(at_ms);

        for name in record.keys() {
            *self.field_counts.entry(name.clone()).or_insert(0) += 1;
        }
    }

    pub fn summary(&self) -> EmissionSummary {
        let mut intervals_ms: Vec<_> = self
            .interval_stats
            .iter()
            .map(|(label, stats)| (label.clone(), StatsSummary::from(stats)))
            .collect();
        intervals_ms.sort_by(|a, b| a.0.cmp(&b.0));

        EmissionSummary {
            total_records: self.total_records,
            transitions_to_active: self.transitions_to_active,
            transitions_to_static: self.transitions_to_static,
            intervals_ms,
            field_counts: self.field_counts.clone(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::with_initial_label(std::mem::take(&mut self.current_label));
    }
}

/// Emission report
#[derive(Debug, Clone, Default)]
pub struct EmissionSummary {
    pub total_records: u64,
    pub transitions_to_active: u64,
    pub transitions_to_static: u64,
    /// Gap statistics per mode label, sorted by label
    pub intervals_ms: Vec<(String, StatsSummary)>,
    pub field_counts: HashMap<String, u64>,
}

impl EmissionSummary {
    pub fn transitions(&self) -> u64 {
        self.transitions_to_active + self.transitions_to_static
    }

    pub fn interval(&self, label: &str) -> Option<&StatsSummary> {
        self.intervals_ms
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, s)| s)
    }
}

impl fmt::Display for EmissionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Emission Summary ===")?;
        writeln!(f, "Records emitted: {}", self.total_records)?;
        writeln!(
            f,
            "Mode transitions: {} (to active: {}, to static: {})",
            self.transitions(),
            self.transitions_to_active,
            self.transitions_to_static
        )?;
        for (label, stats) in &self.intervals_ms {
            writeln!(f, "Interval {label} (ms): {stats}")?;
        }

        if !self.field_counts.is_empty() {
            let mut fields: Vec<_> = self.field_counts.iter().collect();
            fields.sort();
            writeln!(f, "Field counts:")?;
            for (name, count) in fields {
                writeln!(f, "  {name}: {count}")?;
            }
        }
        Ok(())
    }
}

/// Summary of a [`RunningStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.1}, max={:.1}, mean={:.1}, std={:.1} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online mean/variance (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Fragment, FIELD_THROTTLE_MS};

    fn record(fragment: Fragment) -> Record {
        let mut record = Record::new();
        fragment.merge_into(&mut record);
        record
    }

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_attributes_gaps_to_mode() {
        let mut agg = EmissionStatsAggregator::new();
        let heading = || record(Fragment::new().with("heading", 10.0));

        agg.update(&heading(), 0.0);
        agg.update(&heading(), 100.0);
        agg.update(&heading(), 200.0);

        let change = record(
            Fragment::new()
                .with(FIELD_MODE_CHANGE, "static")
                .with(FIELD_THROTTLE_MS, 1000i64),
        );
        agg.update(&change, 1200.0);
        agg.update(&heading(), 2200.0);

        let summary = agg.summary();
        assert_eq!(summary.total_records, 5);
        assert_eq!(summary.transitions_to_static, 1);
        assert_eq!(summary.transitions(), 1);

        let active = summary.interval("active").unwrap();
        assert_eq!(active.count, 2);
        assert!((active.mean - 100.0).abs() < 1e-10);

        let still = summary.interval("static").unwrap();
        assert_eq!(still.count, 2);
        assert!((still.min - 1000.0).abs() < 1e-10);

        assert_eq!(summary.field_counts.get("heading"), Some(&4));
        assert_eq!(agg.current_label(), "static");
    }

    #[test]
    fn test_fixed_label_and_reset() {
        let mut agg = EmissionStatsAggregator::with_initial_label("fixed");
        agg.update(&record(Fragment::new().with("lat", 1.0)), 0.0);
        agg.update(&record(Fragment::new().with("lat", 2.0)), 250.0);
        assert_eq!(agg.summary().interval("fixed").unwrap().count, 1);

        agg.reset();
        assert_eq!(agg.total_records, 0);
        assert_eq!(agg.current_label(), "fixed");
    }

    #[test]
    fn test_summary_display() {
        let mut agg = EmissionStatsAggregator::new();
        agg.update(&record(Fragment::new().with("heading", 1.0)), 0.0);
        agg.update(&record(Fragment::new().with("heading", 2.0)), 100.0);

        let output = agg.summary().to_string();
        assert!(output.contains("Records emitted: 2"));
        assert!(output.contains("Interval active (ms): min=100.0"));
        assert!(output.contains("heading: 2"));
    }

    #[test]
    fn test_empty_stats_display() {
        assert_eq!(StatsSummary::default().to_string(), "N/A");
    }
}
