//! ZMS monitor state machine (T2, §4.7): startup reconciliation plus a
//! running loop that reconciles local state with the fleet controller on
//! every pending event or heartbeat deadline.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use crossbeam_channel::{bounded, RecvTimeoutError};
use rf_core::{
    apply_reconfiguration, begin_reconfiguration, finish_reconfiguration, LiveConfig, Receiver,
    SurveySupervisor, TargetStatus, Watchdog,
};

use crate::zms::client::ZmsRestClient;
use crate::zms::events::run_event_listener;
use crate::zms::models::{
    AckOutcome, HeartbeatRequest, MonitorPending, OpStatus, PendingAck,
};
use crate::zms::schema::apply_params;

/// Delay before the next heartbeat attempt after a failed REST call. Matches
/// `original_source/monitor.py`'s state-loop error backoff (10 s) — a
/// failure must not turn the deadline-wait into a busy loop hammering the
/// REST endpoint.
const HEARTBEAT_RETRY_BACKOFF_SEC: i64 = 10;

/// A ZMS monitor implementation. [`LiveZmsMonitor`] runs the full §4.7
/// protocol; [`NullZmsMonitor`] does nothing and lets the survey run
/// continuously under the CLI-supplied configuration (§9 "Null
/// implementations").
pub trait ZmsMonitor: Send + Sync {
    /// Runs until `shutdown` is observed. Blocking call — spawn on its own
    /// thread.
    fn run(
        &self,
        supervisor: Arc<SurveySupervisor>,
        receiver: Arc<dyn Receiver>,
        watchdog: Arc<Watchdog>,
        live_config: Arc<LiveConfig>,
        shutdown: Arc<AtomicBool>,
    );
}

pub struct NullZmsMonitor;

impl ZmsMonitor for NullZmsMonitor {
    fn run(
        &self,
        _supervisor: Arc<SurveySupervisor>,
        _receiver: Arc<dyn Receiver>,
        _watchdog: Arc<Watchdog>,
        _live_config: Arc<LiveConfig>,
        _shutdown: Arc<AtomicBool>,
    ) {
        tracing::info!("ZMS monitor disabled, running under CLI-supplied configuration");
    }
}

pub struct LiveZmsMonitor {
    monitor_id: String,
    ws_url: String,
    api_token: String,
    client: ZmsRestClient,
}

impl LiveZmsMonitor {
    pub fn new(monitor_id: String, ws_url: String, api_token: String, client: ZmsRestClient) -> Self {
        Self { monitor_id, ws_url, api_token, client }
    }
}

/// The outcome of applying a pending, staged until the next heartbeat.
struct StagedAck {
    pending_id: String,
    outcome: AckOutcome,
    message: String,
}

impl ZmsMonitor for LiveZmsMonitor {
    fn run(
        &self,
        supervisor: Arc<SurveySupervisor>,
        receiver: Arc<dyn Receiver>,
        watchdog: Arc<Watchdog>,
        live_config: Arc<LiveConfig>,
        shutdown: Arc<AtomicBool>,
    ) {
        let mut op_status = OpStatus::Active;
        let mut staged_ack: Option<StagedAck> = None;
        let mut status_ack_by = Utc::now();

        match self.client.get_monitor(&self.monitor_id) {
            Ok(elaborated) => {
                let (target_status, target_params, consumed_pending_id) = match &elaborated.pending {
                    Some(pending) if Some(&pending.id) != elaborated.state.last_pending_id.as_ref() => {
                        (pending.op_status, pending.parameters.clone(), Some(pending.id.clone()))
                    }
                    _ => (elaborated.state.op_status, elaborated.state.parameters.clone(), None),
                };

                let outcome = self.reconcile(
                    &supervisor,
                    receiver.as_ref(),
                    &watchdog,
                    &live_config,
                    target_status,
                    &target_params,
                );

                op_status = target_status;
                if let Some(pending_id) = consumed_pending_id {
                    staged_ack = Some(match outcome {
                        Ok(()) => StagedAck {
                            pending_id,
                            outcome: AckOutcome::Success,
                            message: "applied".to_string(),
                        },
                        Err(err) => StagedAck {
                            pending_id,
                            outcome: AckOutcome::Failure,
                            message: err.to_string(),
                        },
                    });
                }
            }
            Err(err) => {
                tracing::error!(error = %err, "initial ZMS monitor fetch failed, starting paused");
                supervisor.pause();
                op_status = OpStatus::Paused;
            }
        }

        self.send_heartbeat(op_status, &live_config, &mut staged_ack, &mut status_ack_by);

        let (pending_tx, pending_rx) = bounded::<MonitorPending>(8);
        let listener_shutdown = Arc::clone(&shutdown);
        let listener_handle = {
            let ws_url = self.ws_url.clone();
            let api_token = self.api_token.clone();
            let monitor_id = self.monitor_id.clone();
            std::thread::Builder::new()
                .name("zms-ws-listener".into())
                .spawn(move || run_event_listener(ws_url, api_token, monitor_id, pending_tx, listener_shutdown))
                .expect("failed to spawn ZMS websocket listener thread")
        };

        while !shutdown.load(Ordering::SeqCst) {
            let now = Utc::now();
            let wait = (status_ack_by - now).to_std().unwrap_or(Duration::from_secs(0));

            match pending_rx.recv_timeout(wait) {
                Ok(pending) => {
                    let outcome = self.reconcile(
                        &supervisor,
                        receiver.as_ref(),
                        &watchdog,
                        &live_config,
                        pending.op_status,
                        &pending.parameters,
                    );
                    op_status = pending.op_status;
                    staged_ack = Some(match outcome {
                        Ok(()) => StagedAck {
                            pending_id: pending.id,
                            outcome: AckOutcome::Success,
                            message: "applied".to_string(),
                        },
                        Err(err) => StagedAck {
                            pending_id: pending.id,
                            outcome: AckOutcome::Failure,
                            message: err.to_string(),
                        },
                    });
                    self.send_heartbeat(op_status, &live_config, &mut staged_ack, &mut status_ack_by);
                }
                Err(RecvTimeoutError::Timeout) => {
                    self.send_heartbeat(op_status, &live_config, &mut staged_ack, &mut status_ack_by);
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        let _ = listener_handle.join();
    }
}

impl LiveZmsMonitor {
    /// Applies a target `(op_status, parameters)` pair via the reconfiguration
    /// protocol. Parameter validation (ZMS's schema) runs after the survey is
    /// paused, matching §4.6 step ordering.
    fn reconcile(
        &self,
        supervisor: &SurveySupervisor,
        receiver: &dyn Receiver,
        watchdog: &Watchdog,
        live_config: &LiveConfig,
        target_status: OpStatus,
        params: &HashMap<String, serde_json::Value>,
    ) -> anyhow::Result<()> {
        let snapshot = live_config.snapshot();
        let target = match target_status {
            OpStatus::Active => TargetStatus::Active,
            OpStatus::Paused => TargetStatus::Paused,
        };

        if params.is_empty() {
            begin_reconfiguration(supervisor, watchdog);
            finish_reconfiguration(
                supervisor,
                receiver,
                watchdog,
                live_config,
                snapshot.sweep,
                snapshot.receiver,
                target,
            )?;
            return Ok(());
        }

        let (new_sweep, new_receiver) = apply_params(params, &snapshot.sweep, &snapshot.receiver)?;
        apply_reconfiguration(supervisor, receiver, watchdog, live_config, new_sweep, new_receiver, target)?;
        Ok(())
    }

    /// Sends a heartbeat and returns the server's next `status_ack_by`, or
    /// `None` if the request failed. `staged` is borrowed, not consumed: an
    /// at-least-once ack must survive a failed PUT so the caller can retry it
    /// on the next heartbeat.
    fn heartbeat(
        &self,
        op_status: OpStatus,
        live_config: &LiveConfig,
        staged: &Option<StagedAck>,
    ) -> Option<chrono::DateTime<Utc>> {
        let snapshot = live_config.snapshot();
        let mut parameters = HashMap::new();
        parameters.insert("gain_db".to_string(), serde_json::json!(snapshot.receiver.gain_db));
        parameters.insert("duration_sec".to_string(), serde_json::json!(snapshot.receiver.duration_sec));
        parameters.insert("bandwidth_hz".to_string(), serde_json::json!(snapshot.receiver.bandwidth_hz));
        parameters.insert("start_freq_hz".to_string(), serde_json::json!(snapshot.sweep.start_hz));
        parameters.insert("end_freq_hz".to_string(), serde_json::json!(snapshot.sweep.end_hz));
        parameters.insert("sample_interval".to_string(), serde_json::json!(snapshot.sweep.interval_sec as i64));

        let ack = staged.as_ref().map(|s| PendingAck {
            last_pending_id: s.pending_id.clone(),
            last_pending_outcome: s.outcome as u8,
            last_pending_message: s.message.clone(),
        });

        let body = HeartbeatRequest { op_status, parameters, ack };

        match self.client.put_op_status(&self.monitor_id, &body) {
            Ok(response) => Some(response.status_ack_by),
            Err(err) => {
                tracing::warn!(error = %err, "ZMS heartbeat failed");
                None
            }
        }
    }

    /// Sends a heartbeat and folds the result into the caller's loop state:
    /// on success, advances `status_ack_by` to the server's deadline and
    /// clears the staged ack (it has now been delivered at least once); on
    /// failure, retains the staged ack for the next attempt and backs off
    /// by [`HEARTBEAT_RETRY_BACKOFF_SEC`] instead of retrying immediately.
    fn send_heartbeat(
        &self,
        op_status: OpStatus,
        live_config: &LiveConfig,
        staged_ack: &mut Option<StagedAck>,
        status_ack_by: &mut chrono::DateTime<Utc>,
    ) {
        match self.heartbeat(op_status, live_config, staged_ack) {
            Some(next) => {
                *status_ack_by = next;
                *staged_ack = None;
            }
            None => {
                *status_ack_by = Utc::now() + chrono::Duration::seconds(HEARTBEAT_RETRY_BACKOFF_SEC);
            }
        }
    }
}
