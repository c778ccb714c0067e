//! Reconfiguration protocol (T1, §4.6): a validated config swap while an
//! acquisition may be in flight.
//!
//! ZMS-specific parameter validation (§6's schema) is not this module's
//! concern — it lives in the binary crate alongside the REST/websocket
//! client. This module implements only the generic pause → cancel → swap →
//! resume sequencing, so any future trigger for a reconfiguration (ZMS, a
//! CLI hot-reload, ...) goes through the same atomicity guarantee.

use std::time::Duration;

use crate::error::ReconfigureError;
use crate::models::{ReceiverConfig, SweepConfig};
use crate::receiver::Receiver;
use crate::supervisor::{ConfigSnapshot, LiveConfig, SurveySupervisor};
use crate::watchdog::Watchdog;

/// Upper bound on how long `begin_reconfiguration` waits for an in-flight
/// sweep to observe cancellation before the caller proceeds regardless.
pub const SWEEP_SETTLE_TIMEOUT: Duration = Duration::from_secs(1);

/// Target `op_status` the reconfiguration should leave the survey in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetStatus {
    Active,
    Paused,
}

/// §4.6 steps 1-2: pause the survey, pause the watchdog, and cancel any
/// active sweep, waiting briefly for it to settle. Idempotent and safe to
/// call with nothing in flight. Callers that still need to validate
/// caller-specific parameters (e.g. the ZMS schema) do so between this call
/// and [`finish_reconfiguration`] — the survey stays paused either way.
pub fn begin_reconfiguration(supervisor: &SurveySupervisor, watchdog: &Watchdog) {
    supervisor.pause();
    watchdog.pause();
    supervisor.cancel_active_sweep_and_await_settle(SWEEP_SETTLE_TIMEOUT);
}

/// §4.6 steps 4-7: validates the new config pair, reconfigures the hardware
/// if `new_receiver` differs from the receiver's current config, swaps the
/// live config atomically, and — if `target` is [`TargetStatus::Active`] —
/// resumes the survey and the watchdog.
///
/// Must be preceded by [`begin_reconfiguration`]. On `Err`, no persisted
/// state changes beyond the pause already performed: the live config is
/// untouched and the survey remains paused, matching the "reconfigure
/// atomicity" testable property.
pub fn finish_reconfiguration(
    supervisor: &SurveySupervisor,
    receiver: &dyn Receiver,
    watchdog: &Watchdog,
    live_config: &LiveConfig,
    new_sweep: SweepConfig,
    new_receiver: ReceiverConfig,
    target: TargetStatus,
) -> Result<(), ReconfigureError> {
    new_sweep
        .validate()
        .map_err(|e| ReconfigureError::Validation(e.to_string()))?;
    new_receiver
        .validate()
        .map_err(|e| ReconfigureError::Validation(e.to_string()))?;

    if new_receiver != receiver.config() {
        receiver.reconfigure(new_receiver)?;
    }

    live_config.set(ConfigSnapshot { sweep: new_sweep, receiver: new_receiver });

    if target == TargetStatus::Active {
        supervisor.start();
        watchdog.resume();
    }

    Ok(())
}

/// Runs the full §4.6 sequence in one call: `begin_reconfiguration` followed
/// by `finish_reconfiguration`. Convenient for callers that have already
/// validated any caller-specific parameters before invoking the protocol.
pub fn apply_reconfiguration(
    supervisor: &SurveySupervisor,
    receiver: &dyn Receiver,
    watchdog: &Watchdog,
    live_config: &LiveConfig,
    new_sweep: SweepConfig,
    new_receiver: ReceiverConfig,
    target: TargetStatus,
) -> Result<(), ReconfigureError> {
    begin_reconfiguration(supervisor, watchdog);
    finish_reconfiguration(supervisor, receiver, watchdog, live_config, new_sweep, new_receiver, target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::receiver::MockReceiver;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    fn sweep_cfg(start: u64, end: u64) -> SweepConfig {
        SweepConfig {
            start_hz: start,
            end_hz: end,
            step_hz: 1_000_000,
            cycles: 0,
            records_per_step: 1,
            interval_sec: 1.0,
            max_jitter_sec: 0.0,
        }
    }

    fn recv_cfg(bandwidth_hz: u64) -> ReceiverConfig {
        ReceiverConfig { bandwidth_hz, gain_db: 10, duration_sec: 0.01 }
    }

    struct FailingReceiver(MockReceiver);

    impl Receiver for FailingReceiver {
        fn initialize(&self) -> Result<(), crate::error::ReceiverError> {
            self.0.initialize()
        }
        fn serial(&self) -> String {
            self.0.serial()
        }
        fn reconfigure(&self, _new_config: ReceiverConfig) -> Result<(), crate::error::ReceiverError> {
            Err(crate::error::ReceiverError::HardwareUnavailable("simulated failure".into()))
        }
        fn receive_samples(&self, freq: u64) -> Result<crate::receiver::CaptureResult, crate::error::ReceiverError> {
            self.0.receive_samples(freq)
        }
        fn config(&self) -> ReceiverConfig {
            self.0.config()
        }
    }

    #[test]
    fn successful_reconfiguration_swaps_config_and_resumes() {
        let live = Arc::new(LiveConfig::new(sweep_cfg(900_000_000, 900_000_000), recv_cfg(1_000_000)));
        let shutdown = Arc::new(AtomicBool::new(false));
        let supervisor = SurveySupervisor::new(Arc::clone(&live), shutdown, true);
        let receiver = MockReceiver::new(recv_cfg(1_000_000));
        receiver.initialize().unwrap();
        let watchdog = Watchdog::new(30.0);

        let new_sweep = sweep_cfg(920_000_000, 920_000_000);
        let new_receiver = recv_cfg(2_000_000);

        apply_reconfiguration(&supervisor, &receiver, &watchdog, &live, new_sweep.clone(), new_receiver, TargetStatus::Active)
            .unwrap();

        assert_eq!(live.snapshot().sweep, new_sweep);
        assert_eq!(live.snapshot().receiver, new_receiver);
        assert_eq!(receiver.config(), new_receiver);
        assert!(supervisor.is_running());
    }

    #[test]
    fn paused_target_leaves_survey_paused_after_swap() {
        let live = Arc::new(LiveConfig::new(sweep_cfg(900_000_000, 900_000_000), recv_cfg(1_000_000)));
        let shutdown = Arc::new(AtomicBool::new(false));
        let supervisor = SurveySupervisor::new(Arc::clone(&live), shutdown, true);
        let receiver = MockReceiver::new(recv_cfg(1_000_000));
        receiver.initialize().unwrap();
        let watchdog = Watchdog::new(30.0);

        apply_reconfiguration(
            &supervisor,
            &receiver,
            &watchdog,
            &live,
            sweep_cfg(910_000_000, 910_000_000),
            recv_cfg(1_000_000),
            TargetStatus::Paused,
        )
        .unwrap();

        assert!(!supervisor.is_running());
    }

    #[test]
    fn validation_failure_leaves_live_config_untouched_and_paused() {
        let original_sweep = sweep_cfg(900_000_000, 900_000_000);
        let live = Arc::new(LiveConfig::new(original_sweep.clone(), recv_cfg(1_000_000)));
        let shutdown = Arc::new(AtomicBool::new(false));
        let supervisor = SurveySupervisor::new(Arc::clone(&live), shutdown, true);
        let receiver = MockReceiver::new(recv_cfg(1_000_000));
        receiver.initialize().unwrap();
        let watchdog = Watchdog::new(30.0);

        let bad_sweep = SweepConfig { start_hz: 100, end_hz: 0, ..sweep_cfg(100, 100) };

        let result = apply_reconfiguration(
            &supervisor,
            &receiver,
            &watchdog,
            &live,
            bad_sweep,
            recv_cfg(1_000_000),
            TargetStatus::Active,
        );

        assert!(result.is_err());
        assert_eq!(live.snapshot().sweep, original_sweep);
        assert!(!supervisor.is_running(), "a failed reconfiguration leaves the survey paused");
    }

    #[test]
    fn hardware_failure_propagates_and_leaves_survey_paused() {
        let original = recv_cfg(1_000_000);
        let live = Arc::new(LiveConfig::new(sweep_cfg(900_000_000, 900_000_000), original));
        let shutdown = Arc::new(AtomicBool::new(false));
        let supervisor = SurveySupervisor::new(Arc::clone(&live), shutdown, true);
        let receiver = FailingReceiver(MockReceiver::new(original));
        receiver.initialize().unwrap();
        let watchdog = Watchdog::new(30.0);

        let result = apply_reconfiguration(
            &supervisor,
            &receiver,
            &watchdog,
            &live,
            sweep_cfg(900_000_000, 900_000_000),
            recv_cfg(3_000_000), // differs from `original`, forces reconfigure() to be called
            TargetStatus::Active,
        );

        assert!(matches!(result, Err(ReconfigureError::Hardware(_))));
        assert_eq!(live.snapshot().receiver, original);
        assert!(!supervisor.is_running());
    }
}
