//! Pipeline statistics.

use std::time::Duration;

use dispatcher::SinkMetricsSnapshot;
use ingestion::SessionMetricsSnapshot;
use observability::EmissionSummary;
use throttle_engine::ThrottleMetricsSnapshot;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Sensor events handed to the session
    pub events_received: u64,

    /// Wall time of the run
    pub duration: Duration,

    /// Whether the stream ran adaptively
    pub adaptive: bool,

    /// Interval in effect when the run ended
    pub final_interval: Duration,

    pub session: SessionMetricsSnapshot,

    pub throttle: ThrottleMetricsSnapshot,

    /// What reached the dispatcher
    pub emissions: EmissionSummary,

    /// Final counters per sink
    pub sinks: Vec<(String, SinkMetricsSnapshot)>,
}

impl PipelineStats {
    /// Records emitted per second
    pub fn records_per_sec(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.throttle.records_emitted as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Fragments merged per record emitted
    pub fn coalescing_ratio(&self) -> f64 {
        if self.throttle.records_emitted > 0 {
            self.throttle.fragments_received as f64 / self.throttle.records_emitted as f64
        } else {
            0.0
        }
    }

    pub fn print_summary(&self) {
        println!("\n=== Pipeline Statistics ===\n");

        println!("Overview");
        println!("   Duration: {:.2}s", self.duration.as_secs_f64());
        println!(
            "   Mode: {}",
            if self.adaptive { "adaptive" } else { "fixed" }
        );
        println!("   Final interval: {} ms", self.final_interval.as_millis());
        println!("   Sensor events: {}", self.events_received);

        println!("\nSession");
        println!("   Orientation samples: {}", self.session.orientation_samples);
        println!("   Location samples: {}", self.session.location_samples);
        println!("   Motion samples: {}", self.session.motion_samples);
        println!("   Invalid samples: {}", self.session.invalid_samples);
        println!("   Provider errors: {}", self.session.provider_errors);

        println!("\nThrottler");
        println!("   Fragments: {}", self.throttle.fragments_received);
        println!("   Records emitted: {}", self.throttle.records_emitted);
        println!("   Records/sec: {:.2}", self.records_per_sec());
        println!("   Fragments per record: {:.2}", self.coalescing_ratio());
        println!("   Emit failures: {}", self.throttle.emit_failures);
        println!("   Dropped (no sink): {}", self.throttle.emissions_dropped);
        println!("   Mode transitions: {}", self.throttle.mode_transitions);

        println!("\n{}", self.emissions);

        if !self.sinks.is_empty() {
            println!("Sinks");
            for (name, m) in &self.sinks {
                println!(
                    "   {name}: written={}, failed={}, dropped={}",
                    m.write_count, m.failure_count, m.dropped_count
                );
            }
        }

        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates() {
        let stats = PipelineStats {
            duration: Duration::from_secs(10),
            throttle: ThrottleMetricsSnapshot {
                fragments_received: 400,
                records_emitted: 100,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!((stats.records_per_sec() - 10.0).abs() < 1e-10);
        assert!((stats.coalescing_ratio() - 4.0).abs() < 1e-10);
    }

    #[test]
    fn test_rates_empty_run() {
        let stats = PipelineStats::default();
        assert_eq!(stats.records_per_sec(), 0.0);
        assert_eq!(stats.coalescing_ratio(), 0.0);
    }
}
