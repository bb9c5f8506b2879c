//! Integration tests for anchored fetches against the mock host.
//!
//! These cover the behaviour callers rely on across calls:
//!
//! - **Coverage**: batches tile `[cutoff - backfill, cutoff)` with no gap or
//!   overlap and never reach into the quarantine window
//! - **Checkpoints**: persisted after every batch, monotonic, resumable
//! - **Failures**: the checkpoint reflects only delivered batches
//! - **Count batching**: threshold flushes, out-of-order delivery, cancellation
//! - **Authorization**: denial is recognised for every host operation

use std::sync::Arc;
use std::time::Duration as StdDuration;

use futures::StreamExt;
use proptest::prelude::*;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use sensorkit_core::{
    Batch, BatchPolicy, Checkpoint, CheckpointKey, Error, HostError, HostErrorCode, ManualClock,
    MemoryBackend, MockHost, ModuleConfig, Operation, SafeSample, Sensor, SensorModule, TimeRange,
};
use sensorkit_types::{
    Device, EcgFragment, EcgStage, EcgVoltageBatch, HeartRateSample, OnWristSample,
    RawFetchResult, RawSample, Scalar,
};

const WATCH: &str = "Watch6,1";
const PHONE: &str = "iPhone14,2";

fn now() -> OffsetDateTime {
    OffsetDateTime::UNIX_EPOCH + Duration::days(20_000)
}

fn cutoff() -> OffsetDateTime {
    now() - Duration::hours(24)
}

fn device(product_type: &str) -> Device {
    Device::builder()
        .model("Test Device")
        .name(product_type)
        .product_type(product_type)
        .build()
}

fn heart_rate(at: OffsetDateTime) -> RawFetchResult {
    RawFetchResult::single(
        at,
        RawSample::HeartRate(HeartRateSample {
            beats_per_minute: Scalar(60.0 + (at.minute() as f64)),
            confidence: Scalar(0.9),
        }),
    )
}

/// A heart-rate result every 30 minutes from eight days before the cutoff
/// until now.
fn half_hourly() -> Vec<RawFetchResult> {
    let start = cutoff() - Duration::days(8);
    (0..)
        .map(|i| start + Duration::minutes(30 * i))
        .take_while(|at| *at < now())
        .map(heart_rate)
        .collect()
}

fn host_with_watch() -> MockHost {
    MockHost::builder()
        .authorize_all()
        .device(Sensor::HeartRate, device(WATCH))
        .results(Sensor::HeartRate, WATCH, half_hourly())
        .build()
}

/// Route core logs through the test harness; `RUST_LOG=sensorkit_core=debug`
/// shows the batch cursors at work.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct Harness {
    host: MockHost,
    backend: Arc<MemoryBackend>,
    clock: Arc<ManualClock>,
    module: SensorModule,
}

impl Harness {
    fn new(host: MockHost, config: ModuleConfig) -> Self {
        init_tracing();
        let backend = Arc::new(MemoryBackend::new());
        let clock = Arc::new(ManualClock::new(now()));
        let module = build(&host, &backend, &clock, config);
        Self {
            host,
            backend,
            clock,
            module,
        }
    }

    /// A fresh module over the same host, backend and clock.
    fn restart(&mut self, config: ModuleConfig) {
        self.module = build(&self.host, &self.backend, &self.clock, config);
    }

    fn checkpoint(&self, sensor: Sensor, product_type: &str) -> Checkpoint {
        self.module
            .checkpoints()
            .get(&CheckpointKey::new(sensor, product_type))
    }
}

fn build(
    host: &MockHost,
    backend: &Arc<MemoryBackend>,
    clock: &Arc<ManualClock>,
    config: ModuleConfig,
) -> SensorModule {
    SensorModule::builder(Arc::new(host.clone()), backend.clone())
        .clock(clock.clone())
        .config(config)
        .build()
        .unwrap()
}

fn one_day() -> ModuleConfig {
    ModuleConfig::default().backfill(Duration::days(1))
}

fn sample_count(batches: &[Batch]) -> usize {
    batches.iter().map(|batch| batch.samples.len()).sum()
}

/// Assert that consecutive batch ranges tile `[from, to]`.
fn assert_contiguous(batches: &[Batch], from: OffsetDateTime, to: OffsetDateTime) {
    assert!(!batches.is_empty());
    assert_eq!(batches[0].info.range.start(), from);
    for pair in batches.windows(2) {
        assert_eq!(pair[0].info.range.end(), pair[1].info.range.start());
    }
    assert_eq!(batches[batches.len() - 1].info.range.end(), to);
}

async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(StdDuration::from_millis(5)).await;
    }
    condition()
}

// ==================== Time-based batches ====================

#[tokio::test]
async fn test_time_batches_cover_backfill_without_gaps() {
    let harness = Harness::new(host_with_watch(), ModuleConfig::default());

    let batches = harness
        .module
        .fetch_anchored(Sensor::HeartRate, None)
        .unwrap()
        .collect()
        .await
        .unwrap();

    // Seven days in two-hour windows.
    assert_eq!(batches.len(), 84);
    assert_contiguous(&batches, cutoff() - Duration::days(7), cutoff());
    assert_eq!(sample_count(&batches), 7 * 48);
    for batch in &batches {
        assert_eq!(batch.info.range.duration(), Duration::hours(2));
        assert_eq!(batch.info.policy, BatchPolicy::EVERY_TWO_HOURS);
        assert_eq!(batch.info.device.product_type, WATCH);
        for sample in &batch.samples {
            assert!(batch.info.range.contains(sample.start()));
            assert!(sample.start() < cutoff());
        }
    }
    assert_eq!(
        harness.checkpoint(Sensor::HeartRate, WATCH),
        Checkpoint::At(cutoff())
    );
}

#[tokio::test]
async fn test_checkpoint_follows_each_batch() {
    let harness = Harness::new(host_with_watch(), one_day());
    let mut fetch = harness
        .module
        .fetch_anchored(Sensor::HeartRate, None)
        .unwrap();

    let mut previous = harness.checkpoint(Sensor::HeartRate, WATCH);
    assert_eq!(previous, Checkpoint::DistantPast);
    let mut count = 0;
    while let Some(batch) = fetch.next().await {
        let batch = batch.unwrap();
        let current = harness.checkpoint(Sensor::HeartRate, WATCH);
        assert_eq!(current, Checkpoint::At(batch.info.range.end()));
        assert!(current > previous);
        previous = current;
        count += 1;
    }
    assert_eq!(count, 12);

    // Exhausted sequences stay exhausted.
    assert!(fetch.next().await.is_none());
}

#[tokio::test]
async fn test_samples_span_reports_sample_starts() {
    let harness = Harness::new(host_with_watch(), one_day());
    let batches = harness
        .module
        .fetch_anchored(Sensor::HeartRate, None)
        .unwrap()
        .collect()
        .await
        .unwrap();

    let first = &batches[0];
    let span = first.info.samples_span.unwrap();
    assert_eq!(span.earliest, first.info.range.start());
    assert_eq!(span.latest, first.info.range.start() + Duration::minutes(90));
    for sample in &first.samples {
        assert!(span.contains(sample.start()));
    }
}

#[tokio::test]
async fn test_caught_up_pass_is_empty() {
    let harness = Harness::new(host_with_watch(), one_day());
    let first = harness
        .module
        .fetch_anchored(Sensor::HeartRate, None)
        .unwrap()
        .collect()
        .await
        .unwrap();
    assert_eq!(first.len(), 12);
    let fetches = harness.host.fetch_count();

    let second = harness
        .module
        .fetch_anchored(Sensor::HeartRate, None)
        .unwrap()
        .collect()
        .await
        .unwrap();
    assert!(second.is_empty());
    assert_eq!(harness.host.fetch_count(), fetches);
}

#[tokio::test]
async fn test_next_pass_picks_up_where_clock_moved() {
    let harness = Harness::new(host_with_watch(), one_day());
    harness
        .module
        .fetch_anchored(Sensor::HeartRate, None)
        .unwrap()
        .collect()
        .await
        .unwrap();

    harness.clock.advance(Duration::hours(3));
    let batches = harness
        .module
        .fetch_anchored(Sensor::HeartRate, None)
        .unwrap()
        .collect()
        .await
        .unwrap();

    let new_cutoff = cutoff() + Duration::hours(3);
    assert_contiguous(&batches, cutoff(), new_cutoff);
    assert_eq!(batches.len(), 2);
    assert_eq!(sample_count(&batches), 6);
}

#[tokio::test]
async fn test_quarantine_respected_while_clock_moves() {
    let harness = Harness::new(
        host_with_watch(),
        ModuleConfig::default().backfill(Duration::hours(6)),
    );
    let mut fetch = harness
        .module
        .fetch_anchored(Sensor::HeartRate, Some(BatchPolicy::ByTime(Duration::minutes(10))))
        .unwrap();

    let mut batches = Vec::new();
    while let Some(batch) = fetch.next().await {
        let batch = batch.unwrap();
        assert!(batch.info.range.end() <= harness.module.quarantine_cutoff(Sensor::HeartRate));
        batches.push(batch);
        harness.clock.advance(Duration::minutes(1));
        assert!(batches.len() < 100, "anchored fetch did not terminate");
    }

    let start = cutoff() - Duration::hours(6);
    let last_end = batches[batches.len() - 1].info.range.end();
    assert_contiguous(&batches, start, last_end);
    assert!(last_end > cutoff());
    for batch in &batches {
        for sample in &batch.samples {
            assert!(sample.start() < last_end);
        }
    }
}

#[tokio::test]
async fn test_resume_after_restart() {
    let mut harness = Harness::new(host_with_watch(), one_day());
    let mut fetch = harness
        .module
        .fetch_anchored(Sensor::HeartRate, None)
        .unwrap();
    let mut delivered = Vec::new();
    for _ in 0..3 {
        delivered.push(fetch.next().await.unwrap().unwrap());
    }
    drop(fetch);

    harness.restart(one_day());
    let rest = harness
        .module
        .fetch_anchored(Sensor::HeartRate, None)
        .unwrap()
        .collect()
        .await
        .unwrap();

    assert_eq!(rest.len(), 9);
    delivered.extend(rest);
    assert_contiguous(&delivered, cutoff() - Duration::days(1), cutoff());
    assert_eq!(sample_count(&delivered), 48);
}

#[tokio::test]
async fn test_into_stream_yields_same_batches() {
    let harness = Harness::new(host_with_watch(), one_day());
    let batches: Vec<Batch> = harness
        .module
        .fetch_anchored(Sensor::HeartRate, None)
        .unwrap()
        .into_stream()
        .map(|batch| batch.unwrap())
        .collect()
        .await;
    assert_eq!(batches.len(), 12);
    assert_contiguous(&batches, cutoff() - Duration::days(1), cutoff());
}

#[tokio::test]
async fn test_devices_have_independent_anchors() {
    let host = MockHost::builder()
        .authorize_all()
        .device(Sensor::HeartRate, device(WATCH))
        .device(Sensor::HeartRate, device(PHONE))
        .results(Sensor::HeartRate, WATCH, half_hourly())
        .results(Sensor::HeartRate, PHONE, half_hourly().into_iter().step_by(2))
        .build();
    let harness = Harness::new(host, ModuleConfig::default().backfill(Duration::days(2)));

    let batches = harness
        .module
        .fetch_anchored(Sensor::HeartRate, Some(BatchPolicy::DAILY))
        .unwrap()
        .collect()
        .await
        .unwrap();

    assert_eq!(batches.len(), 4);
    let (watch, phone): (Vec<Batch>, Vec<Batch>) = batches
        .into_iter()
        .partition(|batch| batch.info.device.product_type == WATCH);
    assert_contiguous(&watch, cutoff() - Duration::days(2), cutoff());
    assert_contiguous(&phone, cutoff() - Duration::days(2), cutoff());
    assert_eq!(sample_count(&watch), 96);
    assert_eq!(sample_count(&phone), 48);

    assert_eq!(
        harness.backend.keys(),
        vec![
            "sensorkit.anchor.heartRate.Watch6,1".to_string(),
            "sensorkit.anchor.heartRate.iPhone14,2".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_no_devices_yields_nothing() {
    let host = MockHost::builder().authorize_all().build();
    let harness = Harness::new(host, ModuleConfig::default());
    let batches = harness
        .module
        .fetch_anchored(Sensor::Visits, None)
        .unwrap()
        .collect()
        .await
        .unwrap();
    assert!(batches.is_empty());
    assert!(harness.backend.keys().is_empty());
}

#[tokio::test]
async fn test_reset_restarts_from_backfill() {
    let harness = Harness::new(host_with_watch(), one_day());
    harness
        .module
        .fetch_anchored(Sensor::HeartRate, None)
        .unwrap()
        .collect()
        .await
        .unwrap();

    assert_eq!(harness.module.reset_query_anchors(Sensor::Visits).unwrap(), 0);
    assert_eq!(harness.module.reset_query_anchors(Sensor::HeartRate).unwrap(), 1);
    assert_eq!(
        harness.checkpoint(Sensor::HeartRate, WATCH),
        Checkpoint::DistantPast
    );

    let batches = harness
        .module
        .fetch_anchored(Sensor::HeartRate, None)
        .unwrap()
        .collect()
        .await
        .unwrap();
    assert_eq!(batches.len(), 12);
    assert_eq!(harness.module.reset_all_query_anchors().unwrap(), 1);
    assert!(harness.backend.keys().is_empty());
}

// ==================== Failures ====================

#[tokio::test]
async fn test_processing_error_leaves_anchor() {
    let seed = cutoff() - Duration::days(1);
    let host = host_with_watch();
    // A sample of the wrong kind inside the third window.
    host.add_results(
        Sensor::HeartRate,
        WATCH,
        [RawFetchResult::single(
            seed + Duration::minutes(5 * 60 + 10),
            RawSample::OnWrist(OnWristSample {
                on_wrist: true,
                wrist_detection_enabled: true,
            }),
        )],
    );
    let mut harness = Harness::new(host, one_day());
    let mut fetch = harness
        .module
        .fetch_anchored(Sensor::HeartRate, None)
        .unwrap();

    fetch.next().await.unwrap().unwrap();
    fetch.next().await.unwrap().unwrap();
    let err = fetch.next().await.unwrap().unwrap_err();
    assert!(matches!(
        err,
        Error::Processing {
            sensor: Sensor::HeartRate,
            ..
        }
    ));
    assert!(fetch.next().await.is_none());
    assert_eq!(
        harness.checkpoint(Sensor::HeartRate, WATCH),
        Checkpoint::At(seed + Duration::hours(4))
    );

    // Resuming retries the same window.
    harness.restart(one_day());
    let mut fetch = harness
        .module
        .fetch_anchored(Sensor::HeartRate, None)
        .unwrap();
    assert!(fetch.next().await.unwrap().is_err());
    assert_eq!(
        harness.checkpoint(Sensor::HeartRate, WATCH),
        Checkpoint::At(seed + Duration::hours(4))
    );
}

#[tokio::test]
async fn test_storage_error_leaves_anchor() {
    let seed = cutoff() - Duration::days(1);
    let harness = Harness::new(host_with_watch(), one_day());
    let mut fetch = harness
        .module
        .fetch_anchored(Sensor::HeartRate, None)
        .unwrap();

    let first = fetch.next().await.unwrap().unwrap();
    assert_eq!(first.info.range.end(), seed + Duration::hours(2));

    harness.backend.set_fail_writes(true);
    let err = fetch.next().await.unwrap().unwrap_err();
    assert!(matches!(err, Error::Storage(_)));
    assert!(fetch.next().await.is_none());
    assert_eq!(
        harness.checkpoint(Sensor::HeartRate, WATCH),
        Checkpoint::At(seed + Duration::hours(2))
    );

    harness.backend.set_fail_writes(false);
    let rest = harness
        .module
        .fetch_anchored(Sensor::HeartRate, None)
        .unwrap()
        .collect()
        .await
        .unwrap();
    assert_eq!(rest.len(), 11);
    assert_eq!(rest[0].info.range.start(), seed + Duration::hours(2));
}

#[tokio::test]
async fn test_host_failure_discards_partial_results() {
    let harness = Harness::new(host_with_watch(), one_day());
    harness.host.fail_fetches(
        1,
        HostError::new(HostErrorCode::FetchFailed, "daemon restarted"),
        2,
    );
    let mut fetch = harness
        .module
        .fetch_anchored(Sensor::HeartRate, None)
        .unwrap();

    let err = fetch.next().await.unwrap().unwrap_err();
    assert!(matches!(
        err,
        Error::Host {
            operation: Operation::Fetch,
            ..
        }
    ));
    assert!(fetch.next().await.is_none());
    // Seeded, but no batch was delivered.
    assert_eq!(
        harness.checkpoint(Sensor::HeartRate, WATCH),
        Checkpoint::At(cutoff() - Duration::days(1))
    );
}

// ==================== Count-based batches ====================

#[tokio::test]
async fn test_count_batches_flush_at_threshold() {
    let harness = Harness::new(host_with_watch(), one_day());
    let batches = harness
        .module
        .fetch_anchored(Sensor::HeartRate, Some(BatchPolicy::ByCount(10)))
        .unwrap()
        .collect()
        .await
        .unwrap();

    let sizes: Vec<usize> = batches.iter().map(|batch| batch.samples.len()).collect();
    assert_eq!(sizes, vec![10, 10, 10, 10, 8]);
    assert_contiguous(&batches, cutoff() - Duration::days(1), cutoff());
    for batch in &batches[..4] {
        // Threshold flushes anchor at the newest sample delivered.
        assert_eq!(
            batch.info.range.end(),
            batch.info.samples_span.unwrap().latest
        );
    }
    assert_eq!(harness.host.fetch_count(), 1);
    assert_eq!(
        harness.checkpoint(Sensor::HeartRate, WATCH),
        Checkpoint::At(cutoff())
    );
}

#[tokio::test]
async fn test_count_batches_with_out_of_order_delivery() {
    let host = host_with_watch();
    host.set_shuffle_seed(Some(42));
    let harness = Harness::new(host, one_day());
    let mut fetch = harness
        .module
        .fetch_anchored(Sensor::HeartRate, Some(BatchPolicy::ByCount(7)))
        .unwrap();

    let mut previous = Checkpoint::DistantPast;
    let mut starts = Vec::new();
    while let Some(batch) = fetch.next().await {
        let batch = batch.unwrap();
        let current = harness.checkpoint(Sensor::HeartRate, WATCH);
        assert!(current >= previous);
        assert_eq!(current, Checkpoint::At(batch.info.range.end()));
        previous = current;
        starts.extend(batch.samples.iter().map(SafeSample::start));
    }

    starts.sort();
    starts.dedup();
    assert_eq!(starts.len(), 48);
    assert_eq!(previous, Checkpoint::At(cutoff()));
}

#[tokio::test]
async fn test_dropping_count_fetch_stops_host() {
    let harness = Harness::new(host_with_watch(), one_day());
    let mut fetch = harness
        .module
        .fetch_anchored(Sensor::HeartRate, Some(BatchPolicy::ByCount(5)))
        .unwrap();

    let first = fetch.next().await.unwrap().unwrap();
    assert_eq!(first.samples.len(), 5);
    drop(fetch);

    assert!(eventually(|| harness.host.stopped_early() == 1).await);
    assert!(eventually(|| harness.host.in_flight() == 0).await);
    assert_eq!(
        harness.checkpoint(Sensor::HeartRate, WATCH),
        Checkpoint::At(first.info.range.end())
    );

    // The reader is usable again once the stream is gone.
    let results = harness
        .module
        .fetch_most_recent(Sensor::HeartRate, &device(WATCH), Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(results.len(), 2);
}

// ==================== Raw fetches ====================

#[tokio::test]
async fn test_fetch_clamps_to_cutoff() {
    let harness = Harness::new(host_with_watch(), ModuleConfig::default());
    let range = TimeRange::new(cutoff() - Duration::hours(2), now()).unwrap();
    let results = harness
        .module
        .fetch(Sensor::HeartRate, &device(WATCH), range)
        .await
        .unwrap();

    assert_eq!(results.len(), 4);
    assert!(results.iter().all(|result| result.timestamp < cutoff()));
    let log = harness.host.fetch_log();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].range.end(), cutoff());
}

#[tokio::test]
async fn test_fetch_most_recent() {
    let harness = Harness::new(host_with_watch(), ModuleConfig::default());
    let results = harness
        .module
        .fetch_most_recent(Sensor::HeartRate, &device(WATCH), Duration::hours(3))
        .await
        .unwrap();
    assert_eq!(results.len(), 6);
    assert_eq!(
        harness.host.fetch_log()[0].range,
        TimeRange::new(cutoff() - Duration::hours(3), cutoff()).unwrap()
    );
}

#[tokio::test]
async fn test_fetch_most_recent_longer_than_history() {
    let harness = Harness::new(host_with_watch(), ModuleConfig::default());
    let results = harness
        .module
        .fetch_most_recent(
            Sensor::HeartRate,
            &device(WATCH),
            Duration::minutes(u32::MAX.into()),
        )
        .await
        .unwrap();
    // Everything before the cutoff: eight days of half-hourly samples.
    assert_eq!(results.len(), 8 * 48);
    assert_eq!(harness.host.fetch_log()[0].range.end(), cutoff());
}

#[tokio::test]
async fn test_window_longer_than_history_is_one_batch() {
    let harness = Harness::new(host_with_watch(), ModuleConfig::default());
    let policy = BatchPolicy::ByTime(Duration::minutes(u32::MAX.into()));
    let batches = harness
        .module
        .fetch_anchored(Sensor::HeartRate, Some(policy))
        .unwrap()
        .collect()
        .await
        .unwrap();
    assert_eq!(batches.len(), 1);
    assert_contiguous(&batches, cutoff() - Duration::days(7), cutoff());
    assert_eq!(sample_count(&batches), 7 * 48);
}

#[tokio::test]
async fn test_unrepresentable_backfill_fails_without_seeding() {
    let harness = Harness::new(
        host_with_watch(),
        ModuleConfig::default().backfill(Duration::MAX),
    );
    let err = harness
        .module
        .fetch_anchored(Sensor::HeartRate, None)
        .unwrap()
        .collect()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)), "{err:?}");
    assert_eq!(
        harness.checkpoint(Sensor::HeartRate, WATCH),
        Checkpoint::DistantPast
    );
    assert_eq!(harness.host.fetch_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_reader_operations_are_single_flight() {
    let host = host_with_watch();
    host.set_delivery_delay(StdDuration::from_millis(10));
    let harness = Harness::new(host, ModuleConfig::default());
    let module = Arc::new(harness.module);

    let mut tasks = Vec::new();
    for i in 0..4 {
        let module = Arc::clone(&module);
        tasks.push(tokio::spawn(async move {
            let start = cutoff() - Duration::hours(4 * (i + 1));
            let range = TimeRange::starting_at(start, Duration::hours(4)).unwrap();
            module.fetch(Sensor::HeartRate, &device(WATCH), range).await
        }));
    }
    tasks.push(tokio::spawn({
        let module = Arc::clone(&module);
        async move {
            module.fetch_devices(Sensor::HeartRate).await.map(|_| Vec::new())
        }
    }));
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(harness.host.fetch_count(), 4);
    assert_eq!(harness.host.max_in_flight(), 1);
}

// ==================== Authorization ====================

#[tokio::test]
async fn test_denied_status_classifies_every_operation() {
    let host = MockHost::builder()
        .denied(Sensor::HeartRate)
        .device(Sensor::HeartRate, device(WATCH))
        .build();
    let harness = Harness::new(host, ModuleConfig::default());
    let module = &harness.module;

    let err = module.fetch_devices(Sensor::HeartRate).await.unwrap_err();
    assert!(matches!(
        err,
        Error::AuthorizationDenied {
            sensor: Sensor::HeartRate,
            operation: Operation::FetchDevices,
        }
    ));

    let err = module
        .fetch_most_recent(Sensor::HeartRate, &device(WATCH), Duration::hours(1))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::AuthorizationDenied {
            operation: Operation::Fetch,
            ..
        }
    ));

    let err = module.start_recording(&[Sensor::HeartRate]).await.unwrap_err();
    assert!(matches!(
        err,
        Error::AuthorizationDenied {
            operation: Operation::StartRecording,
            ..
        }
    ));

    let err = module.stop_recording(&[Sensor::HeartRate]).await.unwrap_err();
    assert!(err.is_authorization());

    let mut fetch = module.fetch_anchored(Sensor::HeartRate, None).unwrap();
    assert!(fetch.next().await.unwrap().unwrap_err().is_authorization());
    assert!(fetch.next().await.is_none());
}

#[tokio::test]
async fn test_denied_error_code_classifies_operations() {
    let harness = Harness::new(host_with_watch(), ModuleConfig::default());
    let denied = || HostError::new(HostErrorCode::AuthorizationDenied, "not allowed");

    harness.host.set_device_error(Some(denied()));
    let err = harness
        .module
        .fetch_devices(Sensor::HeartRate)
        .await
        .unwrap_err();
    assert!(err.is_authorization());
    harness.host.set_device_error(None);

    harness.host.set_recording_error(Some(denied()));
    let err = harness
        .module
        .start_recording(&[Sensor::HeartRate])
        .await
        .unwrap_err();
    assert!(err.is_authorization());
    harness.host.set_recording_error(None);

    harness.host.fail_fetches(1, denied(), 0);
    let err = harness
        .module
        .fetch_most_recent(Sensor::HeartRate, &device(WATCH), Duration::hours(1))
        .await
        .unwrap_err();
    assert!(err.is_authorization());

    // Other failures stay host errors.
    harness
        .host
        .fail_fetches(1, HostError::new(HostErrorCode::FetchFailed, "busy"), 0);
    let err = harness
        .module
        .fetch_most_recent(Sensor::HeartRate, &device(WATCH), Duration::hours(1))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Host { .. }));
}

#[tokio::test]
async fn test_denied_request_outcome() {
    let host = MockHost::builder().grant_on_request(false).build();
    let harness = Harness::new(host, ModuleConfig::default());
    harness
        .module
        .request_authorization(&[Sensor::Visits])
        .await
        .unwrap();
    let err = harness.module.fetch_devices(Sensor::Visits).await.unwrap_err();
    assert!(err.is_authorization());
}

// ==================== Electrocardiogram ====================

#[tokio::test]
async fn test_ecg_sessions_through_anchored_fetch() {
    let session = Uuid::new_v4();
    let start = cutoff() - Duration::hours(5);
    let fragment = |stage: EcgStage, batch_ms: &[i64]| {
        RawSample::EcgFragment(EcgFragment {
            session_id: session,
            stage,
            frequency: Scalar(512.0),
            lead: 1,
            batches: batch_ms
                .iter()
                .map(|&ms| EcgVoltageBatch {
                    timestamp: start + Duration::milliseconds(ms),
                    voltages: vec![Scalar(0.1), Scalar(0.2), Scalar(0.3)],
                })
                .collect(),
        })
    };
    let host = MockHost::builder()
        .authorize_all()
        .device(Sensor::Electrocardiogram, device(WATCH))
        .results(
            Sensor::Electrocardiogram,
            WATCH,
            [
                RawFetchResult::single(start, fragment(EcgStage::Begin, &[])),
                RawFetchResult::single(
                    start + Duration::seconds(1),
                    fragment(EcgStage::Active, &[0, 250, 500]),
                ),
                RawFetchResult::single(
                    start + Duration::seconds(2),
                    fragment(EcgStage::Active, &[750, 1000]),
                ),
                RawFetchResult::single(start + Duration::seconds(30), fragment(EcgStage::End, &[])),
            ],
        )
        .shuffle_seed(3)
        .build();
    let harness = Harness::new(host, one_day());

    let batches = harness
        .module
        .fetch_anchored(Sensor::Electrocardiogram, None)
        .unwrap()
        .collect()
        .await
        .unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].info.policy, BatchPolicy::DAILY);

    let [SafeSample::EcgSession(session_out)] = batches[0].samples.as_slice() else {
        panic!("expected one session, got {:?}", batches[0].samples);
    };
    assert_eq!(session_out.id, session);
    assert_eq!(session_out.start, start);
    assert_eq!(session_out.end, Some(start + Duration::seconds(30)));
    let offsets: Vec<i128> = session_out
        .batches
        .iter()
        .map(|batch| batch.offset.whole_milliseconds())
        .collect();
    assert_eq!(offsets, vec![0, 250, 500, 750, 1000]);
    assert_eq!(session_out.voltage_count(), 15);
}

// ==================== Properties ====================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn prop_time_batches_tile_backfill(minutes in 20i64..=600) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let batches = runtime.block_on(async {
            let harness = Harness::new(host_with_watch(), one_day());
            harness
                .module
                .fetch_anchored(Sensor::HeartRate, Some(BatchPolicy::ByTime(Duration::minutes(minutes))))
                .unwrap()
                .collect()
                .await
                .unwrap()
        });

        prop_assert_eq!(batches[0].info.range.start(), cutoff() - Duration::days(1));
        for pair in batches.windows(2) {
            prop_assert_eq!(pair[0].info.range.end(), pair[1].info.range.start());
        }
        prop_assert_eq!(batches[batches.len() - 1].info.range.end(), cutoff());
        prop_assert_eq!(sample_count(&batches), 48);
    }

    #[test]
    fn prop_count_batches_deliver_every_sample(threshold in 1usize..=60) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let batches = runtime.block_on(async {
            let harness = Harness::new(host_with_watch(), one_day());
            harness
                .module
                .fetch_anchored(Sensor::HeartRate, Some(BatchPolicy::ByCount(threshold)))
                .unwrap()
                .collect()
                .await
                .unwrap()
        });

        prop_assert_eq!(sample_count(&batches), 48);
        for batch in &batches[..batches.len() - 1] {
            prop_assert_eq!(batch.samples.len(), threshold);
        }
        prop_assert_eq!(batches[batches.len() - 1].info.range.end(), cutoff());
    }
}
