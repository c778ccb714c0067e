//! End-to-end pipeline test: a sweep against a `MockReceiver` produces
//! exactly the expected number of published metadata records, with capture
//! files written under a scratch directory.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rf_core::{
    job_channel, run_sweep, spawn_processing_worker, ApplicationInfo, CancelToken, MetadataRecord,
    MockReceiver, Publisher, Receiver, ReceiverConfig, SweepConfig, SweepOutcome, Watchdog,
};

struct RecordingPublisher {
    records: Mutex<Vec<MetadataRecord>>,
    count: AtomicUsize,
}

impl RecordingPublisher {
    fn new() -> Self {
        Self { records: Mutex::new(Vec::new()), count: AtomicUsize::new(0) }
    }
}

impl Publisher for RecordingPublisher {
    fn publish(&self, record: &MetadataRecord) -> anyhow::Result<()> {
        self.count.fetch_add(1, Ordering::SeqCst);
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

#[test]
fn single_frequency_sweep_publishes_one_record_per_capture() {
    let dir = std::env::temp_dir().join(format!("rf-survey-engine-pipeline-test-{}", std::process::id()));

    let sweep = SweepConfig {
        start_hz: 915_000_000,
        end_hz: 915_000_000,
        step_hz: 20_000_000,
        cycles: 1,
        records_per_step: 3,
        interval_sec: 0.01,
        max_jitter_sec: 0.0,
    };
    let receiver_config = ReceiverConfig { bandwidth_hz: 1_000_000, gain_db: 20, duration_sec: 0.001 };

    let receiver = MockReceiver::new(receiver_config);
    receiver.initialize().unwrap();

    let app_info = Arc::new(ApplicationInfo {
        hostname: "test-host".into(),
        organization: "test-org".into(),
        coordinates: "0N0W".into(),
        output_path: dir.clone(),
        group_id: "test-group".into(),
        serial: receiver.serial(),
    });

    let publisher = Arc::new(RecordingPublisher::new());
    let publisher_dyn: Arc<dyn Publisher> = publisher.clone();
    let (tx, rx) = job_channel();
    let pipeline = spawn_processing_worker(Arc::clone(&app_info), publisher_dyn, dir.clone(), rx);

    let watchdog = Watchdog::new(0.0);
    let cancel = CancelToken::new();
    let outcome = run_sweep(&sweep, &receiver, &tx, &watchdog, &cancel);
    assert_eq!(outcome, SweepOutcome::Completed);

    drop(tx);
    pipeline.join();

    assert_eq!(publisher.count.load(Ordering::SeqCst), 3);
    let records = publisher.records.lock().unwrap();
    assert!(records.iter().all(|r| r.frequency == 915_000_000));
    assert!(records.iter().all(|r| r.sampling_rate == 1_000_000));

    let written_files: Vec<_> = std::fs::read_dir(&dir).unwrap().collect();
    assert_eq!(written_files.len(), 3);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn reconfiguration_mid_sweep_swaps_to_the_new_range_before_the_next_cycle() {
    use rf_core::{apply_reconfiguration, ConfigSnapshot, LiveConfig, SurveySupervisor, TargetStatus};
    use std::sync::atomic::AtomicBool;

    let dir = std::env::temp_dir().join(format!("rf-survey-engine-reconfig-test-{}", std::process::id()));

    let original = SweepConfig {
        start_hz: 900_000_000,
        end_hz: 900_000_000,
        step_hz: 1_000_000,
        cycles: 0,
        records_per_step: 1,
        interval_sec: 0.01,
        max_jitter_sec: 0.0,
    };
    let receiver_config = ReceiverConfig { bandwidth_hz: 1_000_000, gain_db: 10, duration_sec: 0.001 };

    let live = Arc::new(LiveConfig::new(original.clone(), receiver_config));
    let shutdown = Arc::new(AtomicBool::new(false));
    let supervisor = SurveySupervisor::new(Arc::clone(&live), Arc::clone(&shutdown), true);
    let receiver = MockReceiver::new(receiver_config);
    receiver.initialize().unwrap();
    let watchdog = Watchdog::new(0.0);

    let new_sweep = SweepConfig { start_hz: 920_000_000, end_hz: 920_000_000, ..original };
    apply_reconfiguration(&supervisor, &receiver, &watchdog, &live, new_sweep.clone(), receiver_config, TargetStatus::Active)
        .unwrap();

    let snapshot: ConfigSnapshot = live.snapshot();
    assert_eq!(snapshot.sweep.start_hz, 920_000_000);
    assert!(supervisor.is_running());

    std::fs::remove_dir_all(&dir).ok();
}
