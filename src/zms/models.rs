//! Wire types for the ZMS monitor protocol (§4.7, §6).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Only `code == 2010` is ever acted on — every other event code is
/// ignored by the listener (§4.7, §6).
pub const MONITOR_PENDING_CODE: u32 = 2010;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OpStatus {
    Active,
    Paused,
}

/// A proposed next configuration from the fleet controller.
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorPending {
    pub id: String,
    pub op_status: OpStatus,
    #[serde(default)]
    pub parameters: HashMap<String, Value>,
}

/// The last configuration the server considers acknowledged.
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorState {
    pub op_status: OpStatus,
    #[serde(default)]
    pub parameters: HashMap<String, Value>,
    pub last_pending_id: Option<String>,
    pub status_ack_by: DateTime<Utc>,
}

/// The elaborated form returned by `GET monitor(id)`.
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorElaborated {
    pub state: MonitorState,
    pub pending: Option<MonitorPending>,
}

/// Outcome of a processed pending, carried on the next heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    Success = 0,
    Failure = 1,
}

#[derive(Debug, Clone, Serialize)]
pub struct PendingAck {
    pub last_pending_id: String,
    pub last_pending_outcome: u8,
    pub last_pending_message: String,
}

/// Body of `PUT monitor-state-op-status`.
#[derive(Debug, Clone, Serialize)]
pub struct HeartbeatRequest {
    pub op_status: OpStatus,
    pub parameters: HashMap<String, Value>,
    #[serde(flatten)]
    pub ack: Option<PendingAck>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeartbeatResponse {
    pub status_ack_by: DateTime<Utc>,
}

/// A websocket event envelope. `object` is polymorphic — only decoded once
/// `header.code` identifies it as a [`MonitorPending`].
#[derive(Debug, Clone, Deserialize)]
pub struct WsEvent {
    pub header: WsEventHeader,
    pub object: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WsEventHeader {
    pub code: u32,
    #[serde(default)]
    pub monitor_id: Option<String>,
}
