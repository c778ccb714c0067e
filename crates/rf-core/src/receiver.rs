//! Typed facade over the SDR. The vendor hardware binding itself is out of
//! scope — this module defines only the `Receiver` trait plus the mock
//! implementation the orchestrator and the rest of this crate's tests are
//! built against.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::Utc;
use rand::RngCore;

use crate::error::ReceiverError;
use crate::models::{ReceiverConfig, RawCapture};

/// Maximum time to wait for the local oscillator to settle on a new
/// frequency before giving up and logging a warning.
pub const LO_LOCK_TIMEOUT: Duration = Duration::from_secs(1);

/// One acquisition's result: the raw capture plus the exact receiver config
/// snapshot in effect while it was taken.
pub struct CaptureResult {
    pub raw: RawCapture,
    pub receiver_config: ReceiverConfig,
}

/// Serializes hardware access: exactly one capture or reconfiguration runs
/// at a time. All operations are blocking and must be called off the
/// control-plane thread.
pub trait Receiver: Send + Sync {
    /// Acquires the hardware, sets rate/gain/antenna, and records the
    /// hardware serial. Must be called exactly once before any capture.
    fn initialize(&self) -> Result<(), ReceiverError>;

    /// Hardware serial recorded at `initialize()`.
    fn serial(&self) -> String;

    /// Full tear-down and re-initialize with `new_config` under the
    /// hardware lock. All failures propagate.
    fn reconfigure(&self, new_config: ReceiverConfig) -> Result<(), ReceiverError>;

    /// Captures `config().num_samples()` samples at `center_freq_hz` under
    /// the hardware lock. Returns the sc16 buffer, the timestamp taken
    /// immediately before the blocking receive returns, and the config
    /// snapshot used.
    fn receive_samples(&self, center_freq_hz: u64) -> Result<CaptureResult, ReceiverError>;

    /// Current receiver configuration snapshot.
    fn config(&self) -> ReceiverConfig;
}

/// A drop-in replacement for the USRP-backed receiver that never talks to
/// hardware: `initialize` succeeds immediately with a synthetic serial, and
/// `receive_samples` sleeps for `duration_sec` and returns zeroed sc16 bytes.
/// This is the default receiver for the orchestrator's demonstration
/// configuration and what the supervisor/sweep/pipeline tests run against.
pub struct MockReceiver {
    config: Mutex<ReceiverConfig>,
    hardware_lock: Mutex<()>,
    serial: String,
    initialized: AtomicBool,
    /// When set, `receive_samples` sleeps this long regardless of
    /// `duration_sec` — used by watchdog-timeout tests to simulate a stuck
    /// receiver.
    forced_sleep: Option<Duration>,
}

impl MockReceiver {
    pub fn new(config: ReceiverConfig) -> Self {
        Self {
            config: Mutex::new(config),
            hardware_lock: Mutex::new(()),
            serial: "MOCK-SERIAL-123".to_string(),
            initialized: AtomicBool::new(false),
            forced_sleep: None,
        }
    }

    /// Test hook: force every `receive_samples` call to sleep for `dur`
    /// instead of `duration_sec`, simulating a hung capture.
    pub fn with_forced_sleep(mut self, dur: Duration) -> Self {
        self.forced_sleep = Some(dur);
        self
    }
}

impl Receiver for MockReceiver {
    fn initialize(&self) -> Result<(), ReceiverError> {
        let _guard = self.hardware_lock.lock().unwrap();
        tracing::info!(serial = %self.serial, "mock receiver initialized");
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn serial(&self) -> String {
        self.serial.clone()
    }

    fn reconfigure(&self, new_config: ReceiverConfig) -> Result<(), ReceiverError> {
        new_config
            .validate()
            .map_err(|e| ReceiverError::HardwareUnavailable(e.to_string()))?;
        let _guard = self.hardware_lock.lock().unwrap();
        tracing::info!(?new_config, "mock receiver reconfiguring");
        // Simulate the blocking hard-reset delay a real tear-down would incur.
        std::thread::sleep(Duration::from_millis(100));
        *self.config.lock().unwrap() = new_config;
        Ok(())
    }

    fn receive_samples(&self, center_freq_hz: u64) -> Result<CaptureResult, ReceiverError> {
        let _guard = self.hardware_lock.lock().unwrap();
        let config = *self.config.lock().unwrap();

        // Simulate waiting for the LO to settle.
        let lock_start = Instant::now();
        while lock_start.elapsed() < Duration::from_millis(1) {}
        let _ = LO_LOCK_TIMEOUT;

        let sleep_for = self.forced_sleep.unwrap_or(Duration::from_secs_f64(config.duration_sec));
        std::thread::sleep(sleep_for);

        let capture_timestamp = Utc::now();

        let num_samples = config.num_samples();
        let mut iq_data = vec![0u8; num_samples * 4]; // int16 I + int16 Q per sample
        rand::thread_rng().fill_bytes(&mut iq_data);

        Ok(CaptureResult {
            raw: RawCapture { iq_data, center_freq_hz, capture_timestamp },
            receiver_config: config,
        })
    }

    fn config(&self) -> ReceiverConfig {
        *self.config.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> ReceiverConfig {
        ReceiverConfig { bandwidth_hz: 1_000_000, gain_db: 20, duration_sec: 0.01 }
    }

    #[test]
    fn initialize_then_capture_returns_correct_buffer_size() {
        let r = MockReceiver::new(cfg());
        r.initialize().unwrap();
        let result = r.receive_samples(915_000_000).unwrap();
        assert_eq!(result.raw.iq_data.len(), cfg().num_samples() * 4);
        assert_eq!(result.raw.center_freq_hz, 915_000_000);
    }

    #[test]
    fn reconfigure_replaces_config_for_subsequent_captures() {
        let r = MockReceiver::new(cfg());
        r.initialize().unwrap();
        let new_cfg = ReceiverConfig { bandwidth_hz: 2_000_000, gain_db: 30, duration_sec: 0.01 };
        r.reconfigure(new_cfg).unwrap();
        assert_eq!(r.config(), new_cfg);
        let result = r.receive_samples(920_000_000).unwrap();
        assert_eq!(result.receiver_config, new_cfg);
    }

    #[test]
    fn reconfigure_rejects_invalid_config() {
        let r = MockReceiver::new(cfg());
        let bad = ReceiverConfig { bandwidth_hz: 0, gain_db: 20, duration_sec: 1.0 };
        assert!(r.reconfigure(bad).is_err());
        assert_eq!(r.config(), cfg());
    }
}
