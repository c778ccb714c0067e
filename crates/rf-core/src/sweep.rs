//! Sweep runner (M2): one sweep iterates center frequencies from
//! `start_hz` to `end_hz` in `step_hz` increments, capturing
//! `records_per_step` times at each stop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Sender;

use crate::models::{ProcessingJob, SweepConfig};
use crate::receiver::Receiver;
use crate::scheduler::wait_time_with_jitter;
use crate::watchdog::Watchdog;

/// Cooperative cancellation handle for one in-flight sweep. Checked at every
/// suspension point (interruptible sleep, before each capture, before each
/// enqueue). Reconfiguration and shutdown both cancel through this same
/// mechanism — the sweep doesn't need to know why it was cancelled.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of one complete (or cancelled) sweep.
#[derive(Debug, PartialEq, Eq)]
pub enum SweepOutcome {
    Completed,
    Cancelled,
}

/// Runs one full sweep over `sweep_config`'s frequency range, using the
/// deep-copied `sweep_config` snapshot as the source of truth for each job's
/// receiver configuration (taken from the capture itself, not a separate
/// snapshot). Enqueues one [`ProcessingJob`] per successful capture, pets the
/// watchdog after each successful enqueue, and returns
/// [`SweepOutcome::Cancelled`] the moment `cancel` is observed set at a
/// suspension point.
///
/// Per-frequency transient capture failures are logged and that step is
/// skipped — the sweep does not abort. Queue-full put timeouts drop the
/// single capture and continue, per the documented backpressure policy.
pub fn run_sweep(
    sweep_config: &SweepConfig,
    receiver: &dyn Receiver,
    queue_tx: &Sender<ProcessingJob>,
    watchdog: &Watchdog,
    cancel: &CancelToken,
) -> SweepOutcome {
    for center_freq_hz in sweep_config.frequencies() {
        if cancel.is_cancelled() {
            return SweepOutcome::Cancelled;
        }

        for _ in 0..sweep_config.records_per_step {
            if cancel.is_cancelled() {
                return SweepOutcome::Cancelled;
            }

            if interruptible_sleep(
                wait_time_with_jitter(
                    sweep_config.interval_sec,
                    epoch_now(),
                    sweep_config.max_jitter_sec,
                ),
                cancel,
            ) {
                return SweepOutcome::Cancelled;
            }

            let capture = match receiver.receive_samples(center_freq_hz) {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!(freq_hz = center_freq_hz, error = %e, "capture failed, skipping step");
                    continue;
                }
            };

            let job = ProcessingJob {
                raw: capture.raw,
                receiver_config: capture.receiver_config,
                sweep_config: sweep_config.clone(),
            };

            match queue_tx.send_timeout(job, Duration::from_secs(1)) {
                Ok(()) => {
                    watchdog.pet();
                }
                Err(crossbeam_channel::SendTimeoutError::Timeout(_)) => {
                    tracing::warn!(freq_hz = center_freq_hz, "queue full, dropping capture");
                }
                Err(crossbeam_channel::SendTimeoutError::Disconnected(_)) => {
                    tracing::error!("processing queue disconnected, stopping sweep");
                    return SweepOutcome::Cancelled;
                }
            }
        }
    }

    SweepOutcome::Completed
}

/// Sleeps in short slices so cancellation is observed promptly instead of
/// only after the full wait elapses. Returns `true` if cancelled mid-sleep.
fn interruptible_sleep(total_sec: f64, cancel: &CancelToken) -> bool {
    const SLICE: Duration = Duration::from_millis(100);
    let mut remaining = Duration::from_secs_f64(total_sec.max(0.0));
    while remaining > Duration::ZERO {
        if cancel.is_cancelled() {
            return true;
        }
        let nap = remaining.min(SLICE);
        std::thread::sleep(nap);
        remaining = remaining.saturating_sub(nap);
    }
    cancel.is_cancelled()
}

fn epoch_now() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
