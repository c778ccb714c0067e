//! Survey supervisor (M3): gates on a `running` level-triggered flag,
//! launches sweeps as cancellable children, and counts completed cycles.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;

use crate::models::{ProcessingJob, ReceiverConfig, SweepConfig};
use crate::receiver::Receiver;
use crate::sweep::{run_sweep, CancelToken, SweepOutcome};
use crate::watchdog::Watchdog;

/// Level-triggered gate: clear blocks waiters, set releases all of them.
/// Unlike a one-shot signal, waking a waiter never consumes the set state —
/// the supervisor re-checks `running` on every loop iteration.
struct RunningGate {
    running: Mutex<bool>,
    cv: Condvar,
}

impl RunningGate {
    fn new(initial: bool) -> Self {
        Self { running: Mutex::new(initial), cv: Condvar::new() }
    }

    fn set(&self, value: bool) {
        let mut guard = self.running.lock().unwrap();
        *guard = value;
        self.cv.notify_all();
    }

    fn is_set(&self) -> bool {
        *self.running.lock().unwrap()
    }

    /// Blocks until `running` is set or `shutdown` fires, whichever first.
    /// Returns `false` if woken by shutdown rather than by running.
    fn wait_until_running_or_shutdown(&self, shutdown: &AtomicBool) -> bool {
        let mut guard = self.running.lock().unwrap();
        while !*guard {
            if shutdown.load(Ordering::SeqCst) {
                return false;
            }
            let (g, timeout) = self
                .cv
                .wait_timeout(guard, std::time::Duration::from_millis(200))
                .unwrap();
            guard = g;
            let _ = timeout;
        }
        true
    }
}

/// Snapshot pair a sweep runs against. Deep-copied so the sweep's view of
/// its configuration never changes mid-flight even if the live configs are
/// swapped by a concurrent reconfiguration.
#[derive(Clone)]
pub struct ConfigSnapshot {
    pub sweep: SweepConfig,
    pub receiver: ReceiverConfig,
}

/// Shared, reconfiguration-writable live configuration. The supervisor and
/// sweep runner only ever read via `snapshot()`; the reconfiguration
/// protocol is the sole writer, and only while the supervisor is paused and
/// any in-flight sweep has been cancelled.
pub struct LiveConfig {
    inner: Mutex<ConfigSnapshot>,
}

impl LiveConfig {
    pub fn new(sweep: SweepConfig, receiver: ReceiverConfig) -> Self {
        Self { inner: Mutex::new(ConfigSnapshot { sweep, receiver }) }
    }

    pub fn snapshot(&self) -> ConfigSnapshot {
        self.inner.lock().unwrap().clone()
    }

    pub fn set(&self, snapshot: ConfigSnapshot) {
        *self.inner.lock().unwrap() = snapshot;
    }
}

/// Gates on `running`, launches sweeps, and counts completed cycles. A
/// cancellation on the active sweep is ambiguous by design — the supervisor
/// cannot tell a reconfigure-induced cancel from a shutdown cancel except by
/// checking the shutdown flag itself, which it does before re-looping.
pub struct SurveySupervisor {
    gate: RunningGate,
    shutdown: Arc<AtomicBool>,
    live_config: Arc<LiveConfig>,
    cycles_run: Mutex<u32>,
    active_cancel: Mutex<Option<CancelToken>>,
}

impl SurveySupervisor {
    pub fn new(live_config: Arc<LiveConfig>, shutdown: Arc<AtomicBool>, start_running: bool) -> Arc<Self> {
        Arc::new(Self {
            gate: RunningGate::new(start_running),
            shutdown,
            live_config,
            cycles_run: Mutex::new(0),
            active_cancel: Mutex::new(None),
        })
    }

    pub fn start(&self) {
        self.gate.set(true);
    }

    pub fn pause(&self) {
        self.gate.set(false);
    }

    pub fn is_running(&self) -> bool {
        self.gate.is_set()
    }

    /// Cancels the currently active sweep, if any, and waits briefly for it
    /// to settle. Called by the reconfiguration protocol before swapping
    /// configs. A no-op if no sweep is in flight.
    pub fn cancel_active_sweep(&self) {
        let cancel = self.active_cancel.lock().unwrap().clone();
        if let Some(cancel) = cancel {
            cancel.cancel();
        }
    }

    /// Cancels the currently active sweep and waits up to `max_wait` for the
    /// supervisor loop to observe its termination (cleared `active_cancel`),
    /// per §4.6 step 2's "wait briefly (≤ 1 s) for it to settle". Returns as
    /// soon as settled; a caller that races past `max_wait` without settling
    /// proceeds anyway — the in-flight sweep can still enqueue at most one
    /// more job, which the pipeline will process normally.
    pub fn cancel_active_sweep_and_await_settle(&self, max_wait: Duration) {
        self.cancel_active_sweep();
        let start = Instant::now();
        while start.elapsed() < max_wait {
            if self.active_cancel.lock().unwrap().is_none() {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    pub fn cycles_run(&self) -> u32 {
        *self.cycles_run.lock().unwrap()
    }

    /// Spawns the supervisor loop thread. Runs until `shutdown` is observed
    /// or the configured cycle count is exhausted.
    pub fn spawn(
        self: &Arc<Self>,
        receiver: Arc<dyn Receiver>,
        queue_tx: Sender<ProcessingJob>,
        watchdog: Arc<Watchdog>,
    ) -> JoinHandle<()> {
        let this = Arc::clone(self);
        std::thread::Builder::new()
            .name("survey-supervisor".into())
            .spawn(move || this.run(receiver, queue_tx, watchdog))
            .expect("failed to spawn supervisor thread")
    }

    fn run(&self, receiver: Arc<dyn Receiver>, queue_tx: Sender<ProcessingJob>, watchdog: Arc<Watchdog>) {
        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                tracing::info!("supervisor observed shutdown, exiting");
                return;
            }

            {
                let snapshot = self.live_config.snapshot();
                if snapshot.sweep.cycles > 0 && self.cycles_run() >= snapshot.sweep.cycles {
                    tracing::info!(cycles = self.cycles_run(), "configured cycle count reached, finishing");
                    return;
                }
            }

            if !self.gate.wait_until_running_or_shutdown(&self.shutdown) {
                continue; // loop will observe shutdown at the top
            }

            let snapshot = self.live_config.snapshot();
            let cancel = CancelToken::new();
            *self.active_cancel.lock().unwrap() = Some(cancel.clone());

            let outcome = run_sweep(
                &snapshot.sweep,
                receiver.as_ref(),
                &queue_tx,
                &watchdog,
                &cancel,
            );

            *self.active_cancel.lock().unwrap() = None;

            match outcome {
                SweepOutcome::Completed => {
                    let mut cycles = self.cycles_run.lock().unwrap();
                    *cycles += 1;
                    tracing::info!(cycles = *cycles, "sweep cycle complete");
                }
                SweepOutcome::Cancelled => {
                    if self.shutdown.load(Ordering::SeqCst) {
                        tracing::info!("sweep cancelled for shutdown, propagating");
                        return;
                    }
                    tracing::info!("sweep cancelled for reconfiguration, re-evaluating state");
                    // loop re-checks `running`: if reconfiguration paused us,
                    // the next wait blocks; otherwise it starts immediately
                    // with the newly-swapped snapshot.
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::receiver::MockReceiver;

    fn sweep_cfg(cycles: u32) -> SweepConfig {
        SweepConfig {
            start_hz: 915_000_000,
            end_hz: 915_000_000,
            step_hz: 1,
            cycles,
            records_per_step: 1,
            interval_sec: 0.001,
            max_jitter_sec: 0.0,
        }
    }

    fn recv_cfg() -> ReceiverConfig {
        ReceiverConfig { bandwidth_hz: 1_000_000, gain_db: 10, duration_sec: 0.001 }
    }

    #[test]
    fn bounded_cycles_finish_on_their_own() {
        let live = Arc::new(LiveConfig::new(sweep_cfg(2), recv_cfg()));
        let shutdown = Arc::new(AtomicBool::new(false));
        let supervisor = SurveySupervisor::new(live, shutdown, true);
        let receiver: Arc<dyn Receiver> = Arc::new(MockReceiver::new(recv_cfg()));
        receiver.initialize().unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();
        let watchdog = Watchdog::new(0.0);

        let handle = supervisor.spawn(receiver, tx, watchdog);
        handle.join().unwrap();

        assert_eq!(supervisor.cycles_run(), 2);
        assert_eq!(rx.try_iter().count(), 2);
    }

    #[test]
    fn paused_supervisor_blocks_until_started() {
        let live = Arc::new(LiveConfig::new(sweep_cfg(1), recv_cfg()));
        let shutdown = Arc::new(AtomicBool::new(false));
        let supervisor = SurveySupervisor::new(live, shutdown.clone(), false);
        let receiver: Arc<dyn Receiver> = Arc::new(MockReceiver::new(recv_cfg()));
        receiver.initialize().unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();
        let watchdog = Watchdog::new(0.0);

        let handle = supervisor.spawn(receiver, tx, watchdog);
        std::thread::sleep(std::time::Duration::from_millis(100));
        assert_eq!(rx.try_iter().count(), 0); // nothing happened while paused

        supervisor.start();
        handle.join().unwrap();
        assert_eq!(supervisor.cycles_run(), 1);
    }

    #[test]
    fn shutdown_stops_the_loop_even_mid_wait() {
        let live = Arc::new(LiveConfig::new(sweep_cfg(0), recv_cfg()));
        let shutdown = Arc::new(AtomicBool::new(false));
        let supervisor = SurveySupervisor::new(live, shutdown.clone(), false);
        let receiver: Arc<dyn Receiver> = Arc::new(MockReceiver::new(recv_cfg()));
        receiver.initialize().unwrap();
        let (tx, _rx) = crossbeam_channel::unbounded();
        let watchdog = Watchdog::new(0.0);

        let handle = supervisor.spawn(receiver, tx, watchdog);
        std::thread::sleep(std::time::Duration::from_millis(50));
        shutdown.store(true, Ordering::SeqCst);
        handle.join().unwrap();
    }

    #[test]
    fn cancel_and_settle_returns_once_sweep_clears_active_handle() {
        let live = Arc::new(LiveConfig::new(sweep_cfg(0), recv_cfg()));
        let shutdown = Arc::new(AtomicBool::new(false));
        let supervisor = SurveySupervisor::new(live, shutdown.clone(), true);
        let receiver: Arc<dyn Receiver> = Arc::new(MockReceiver::new(recv_cfg()));
        receiver.initialize().unwrap();
        let (tx, _rx) = crossbeam_channel::unbounded();
        let watchdog = Watchdog::new(0.0);

        let handle = supervisor.spawn(receiver, tx, watchdog);
        std::thread::sleep(Duration::from_millis(20));

        supervisor.cancel_active_sweep_and_await_settle(Duration::from_secs(1));
        assert!(supervisor.active_cancel.lock().unwrap().is_none());

        shutdown.store(true, Ordering::SeqCst);
        handle.join().unwrap();
    }

    #[test]
    fn cancel_and_settle_is_a_no_op_with_nothing_in_flight() {
        let live = Arc::new(LiveConfig::new(sweep_cfg(0), recv_cfg()));
        let shutdown = Arc::new(AtomicBool::new(false));
        let supervisor = SurveySupervisor::new(live, shutdown, false);
        let start = Instant::now();
        supervisor.cancel_active_sweep_and_await_settle(Duration::from_millis(50));
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
