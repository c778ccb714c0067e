//! Typed error kinds: failures that a caller needs to distinguish carry a
//! `thiserror` enum; everything else propagates as `anyhow::Error` at the
//! orchestration edges.

use thiserror::Error;

/// Failures from the [`crate::receiver::Receiver`] contract.
#[derive(Debug, Error)]
pub enum ReceiverError {
    #[error("SDR hardware unavailable: {0}")]
    HardwareUnavailable(String),

    #[error("capture truncated: expected {expected} samples, got {got}")]
    CaptureTruncated { expected: usize, got: usize },

    #[error("capture error: {0}")]
    CaptureError(String),
}

/// Failures from the reconfiguration protocol.
#[derive(Debug, Error)]
pub enum ReconfigureError {
    #[error("parameter validation failed: {0}")]
    Validation(String),

    #[error("hardware reconfigure failed: {0}")]
    Hardware(#[from] ReceiverError),
}

/// Raised by the liveness watchdog. Fatal — the orchestrator shuts down on
/// receipt.
#[derive(Debug, Error)]
#[error("watchdog timeout: no pet() in {elapsed_sec:.1}s (limit {timeout_sec:.1}s)")]
pub struct WatchdogTimeout {
    pub elapsed_sec: f64,
    pub timeout_sec: f64,
}
