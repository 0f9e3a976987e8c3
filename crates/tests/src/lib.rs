//! # Integration Tests
//!
//! Cross-crate end-to-end tests.
//!
//! Covers:
//! - configuration file -> session -> dispatcher -> file sink
//! - detachable output while the stream keeps running
//! - mock producers driven through a session into an async consumer
//! - observer ordering relative to the mode-change record

#[cfg(test)]
mod contract_tests {
    use contracts::{StreamConfig, ThrottleConfig};

    #[test]
    fn test_stream_config_maps_to_throttle_config() {
        let stream = StreamConfig {
            throttle_ms: 40,
            low_frequency_ms: 900,
            ..Default::default()
        };
        let throttle = stream.to_throttle_config();
        assert_eq!(throttle.high_frequency_ms, 40);
        assert_eq!(throttle.low_frequency_ms, 900);
        assert_eq!(
            throttle.static_duration_ms,
            ThrottleConfig::default().static_duration_ms
        );
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{
        Record, RecordSink, RateMode, FIELD_MODE_CHANGE, FIELD_THROTTLE_MS, FIELD_TIMESTAMP,
    };
    use dispatcher::{create_dispatcher, CallbackSink, ChannelSink, SwitchableSink};
    use ingestion::{
        LocationSample, MockSensorSource, MotionProfile, OrientationSample, SensorStreamSession,
        FIELD_HEADING, FIELD_LATITUDE,
    };
    use observability::EmissionStatsAggregator;
    use serde_json::Value;
    use tokio::time::{advance, Instant};

    fn madrid() -> LocationSample {
        LocationSample::new(40.4168, -3.7038, 657.0, 5.0)
    }

    /// Config file -> adaptive session -> dispatcher -> JSON-lines file
    #[tokio::test(start_paused = true)]
    async fn test_e2e_config_to_file_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stream.jsonl");
        let content = format!(
            r#"
[stream]
throttleMs = 100
adaptiveThrottling = true
lowFrequencyMs = 1000
staticDurationMs = 2000

[[sinks]]
name = "file"
sink_type = "file"
params = {{ path = "{}" }}
"#,
            path.display()
        );
        let loaded = ConfigLoader::load_from_str(&content, ConfigFormat::Toml).unwrap();
        assert!(!loaded.has_warnings(), "{:?}", loaded.warnings);

        let dispatcher = Arc::new(
            create_dispatcher("e2e", loaded.blueprint.sinks.clone())
                .await
                .unwrap(),
        );
        let session = SensorStreamSession::new(
            loaded.blueprint.stream,
            Arc::clone(&dispatcher) as Arc<dyn RecordSink>,
        )
        .unwrap();

        // t=0: last known location goes out at once
        session.start(Some(madrid()));
        session.on_acceleration(0.0, 0.0, 0.01);

        // t=2000: quiet long enough, mode change emitted at once
        advance(Duration::from_millis(2000)).await;
        assert_eq!(session.mode(), Some(RateMode::Static));

        // Orientation now waits for the 1000 ms static interval
        session.on_orientation(OrientationSample::from_degrees(-90.0, 1.0, 2.0));
        advance(Duration::from_millis(999)).await;
        assert_eq!(session.throttle_metrics().records_emitted, 2);
        advance(Duration::from_millis(1)).await;
        assert_eq!(session.throttle_metrics().records_emitted, 3);

        session.cancel();
        let sinks = dispatcher.shutdown().await;
        assert_eq!(sinks[0].1.write_count, 3);

        let lines: Vec<Value> = std::fs::read_to_string(&path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0][FIELD_LATITUDE], 40.4168);
        assert_eq!(lines[1][FIELD_MODE_CHANGE], "static");
        assert_eq!(lines[1][FIELD_THROTTLE_MS], 1000);
        assert!(lines[1][FIELD_TIMESTAMP].is_i64());
        assert_eq!(lines[2][FIELD_HEADING], 270.0);
    }

    /// Output detached mid-stream: emissions drop, the stream keeps its cadence
    #[tokio::test(start_paused = true)]
    async fn test_e2e_detached_sink_drops_then_resumes() {
        let received = Arc::new(Mutex::new(Vec::<Record>::new()));
        let store = Arc::clone(&received);
        let target: Arc<dyn RecordSink> = Arc::new(CallbackSink::new("store", move |r| {
            store.lock().unwrap().push(r);
            Ok(())
        }));
        let switch = Arc::new(SwitchableSink::attached("switch", Arc::clone(&target)));

        let config = contracts::StreamConfig {
            throttle_ms: 200,
            ..Default::default()
        };
        let session =
            SensorStreamSession::new(config, Arc::clone(&switch) as Arc<dyn RecordSink>).unwrap();

        session.on_location(madrid());
        switch.detach();
        advance(Duration::from_millis(200)).await;
        session.on_location(madrid());
        advance(Duration::from_millis(200)).await;

        switch.attach(target);
        session.on_location(madrid());
        advance(Duration::from_millis(200)).await;

        let metrics = session.throttle_metrics();
        assert_eq!(metrics.records_emitted, 2);
        assert_eq!(metrics.emissions_dropped, 1);
        assert_eq!(received.lock().unwrap().len(), 2);
    }

    /// Mock producers -> session.drive -> async consumer
    #[tokio::test(start_paused = true)]
    async fn test_e2e_mock_source_rate_bound() {
        let (sink, rx) = ChannelSink::bounded("consumer", 1024);
        let config = contracts::StreamConfig {
            throttle_ms: 100,
            adaptive_throttling: true,
            low_frequency_ms: 1000,
            ..Default::default()
        };
        let session = Arc::new(SensorStreamSession::new(config, Arc::new(sink)).unwrap());

        let source = MockSensorSource::with_profile(
            "walker",
            MotionProfile::walk_and_stop(Duration::from_secs(2), Duration::from_secs(6)),
            Some(7),
        );
        let events = source.start(128).unwrap();
        session.start(Some(source.last_known_location()));

        let driver = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.drive(events).await })
        };

        let consumer = tokio::spawn(async move {
            let mut stats = EmissionStatsAggregator::new();
            let started = Instant::now();
            let mut gaps = Vec::new();
            let mut last: Option<Instant> = None;
            while let Ok(record) = rx.recv().await {
                let now = Instant::now();
                if let Some(prev) = last {
                    gaps.push(now - prev);
                }
                last = Some(now);
                stats.update(&record, (now - started).as_secs_f64() * 1000.0);
            }
            (stats.summary(), gaps)
        });

        tokio::time::sleep(Duration::from_secs(8)).await;
        source.stop();
        session.cancel();
        driver.await.unwrap();
        drop(session);

        let (summary, gaps) = consumer.await.unwrap();
        assert!(summary.total_records > 10);
        assert!(summary.transitions_to_static >= 1);
        assert!(gaps.iter().all(|g| *g >= Duration::from_millis(100)), "{gaps:?}");

        // A marker may ride a timer scheduled under the old interval; the
        // records after it wait out the full static interval
        let still = summary.interval("static").unwrap();
        assert!(still.max >= 999.0, "{still:?}");
    }

    /// The observer sees the new mode before the sink sees the marker record
    #[tokio::test(start_paused = true)]
    async fn test_e2e_observer_precedes_mode_change_record() {
        let events = Arc::new(Mutex::new(Vec::<String>::new()));

        let sink_log = Arc::clone(&events);
        let sink: Arc<dyn RecordSink> = Arc::new(CallbackSink::new("log", move |r| {
            if let Some(mode) = r.get(FIELD_MODE_CHANGE).and_then(|v| v.as_str()) {
                sink_log.lock().unwrap().push(format!("record:{mode}"));
            }
            Ok(())
        }));
        let observer_log = Arc::clone(&events);
        let observer: contracts::ModeObserver = Arc::new(move |mode: RateMode| {
            observer_log.lock().unwrap().push(format!("observer:{mode}"));
        });

        let config = contracts::StreamConfig {
            adaptive_throttling: true,
            ..Default::default()
        };
        let session = SensorStreamSession::builder(config, sink)
            .name("ordered")
            .observer(observer)
            .build()
            .unwrap();

        session.on_acceleration(0.0, 0.0, 0.0);
        advance(Duration::from_millis(2000)).await;
        session.on_acceleration(3.0, 0.0, 0.0);
        advance(Duration::from_millis(1000)).await;

        let events = events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                "observer:static",
                "record:static",
                "observer:active",
                "record:active"
            ]
        );
    }
}
