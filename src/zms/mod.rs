//! Fleet-controller ("ZMS") integration: REST client, websocket event
//! listener, wire schema, and the monitor state machine (§4.7, §6).

pub mod client;
pub mod events;
pub mod models;
pub mod monitor;
pub mod schema;

pub use client::ZmsRestClient;
pub use monitor::{LiveZmsMonitor, NullZmsMonitor, ZmsMonitor};
