//! ZMS websocket event listener (§4.7, §6): subscribes to the fleet
//! controller's event stream and forwards decoded [`MonitorPending`] events
//! (code 2010) to the monitor loop over a channel. Reconnects on a fixed 10s
//! backoff, matching `original_source/src/rf_survey/zms_event_subscriber.py`'s
//! retry loop — no exponential backoff, the server side is assumed to
//! recover quickly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Sender;
use tungstenite::client::IntoClientRequest;
use tungstenite::{connect, Message};

use crate::zms::models::{MonitorPending, WsEvent, MONITOR_PENDING_CODE};

const RECONNECT_BACKOFF: Duration = Duration::from_secs(10);

/// Runs until `shutdown` is observed. Decodes only code-2010 events
/// addressed to `monitor_id`; anything else is logged and dropped.
pub fn run_event_listener(
    ws_url: String,
    api_token: String,
    monitor_id: String,
    pending_tx: Sender<MonitorPending>,
    shutdown: Arc<AtomicBool>,
) {
    while !shutdown.load(Ordering::SeqCst) {
        match connect_once(&ws_url, &api_token) {
            Ok(mut socket) => {
                tracing::info!("ZMS websocket connected");
                loop {
                    if shutdown.load(Ordering::SeqCst) {
                        let _ = socket.close(None);
                        return;
                    }
                    match socket.read() {
                        Ok(Message::Text(text)) => handle_event(&text, &monitor_id, &pending_tx),
                        Ok(Message::Close(_)) => {
                            tracing::warn!("ZMS websocket closed by server");
                            break;
                        }
                        Ok(_) => {}
                        Err(err) => {
                            tracing::warn!(error = %err, "ZMS websocket read failed");
                            break;
                        }
                    }
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "ZMS websocket connect failed");
            }
        }

        if shutdown.load(Ordering::SeqCst) {
            return;
        }
        std::thread::sleep(RECONNECT_BACKOFF);
    }
}

fn connect_once(
    ws_url: &str,
    api_token: &str,
) -> anyhow::Result<tungstenite::WebSocket<tungstenite::stream::MaybeTlsStream<std::net::TcpStream>>> {
    let mut request = ws_url.into_client_request()?;
    request
        .headers_mut()
        .insert("X-Api-Token", api_token.parse()?);
    let (socket, _response) = connect(request)?;
    Ok(socket)
}

fn handle_event(text: &str, monitor_id: &str, pending_tx: &Sender<MonitorPending>) {
    let event: WsEvent = match serde_json::from_str(text) {
        Ok(event) => event,
        Err(err) => {
            tracing::warn!(error = %err, "failed to decode ZMS websocket event");
            return;
        }
    };

    if event.header.code != MONITOR_PENDING_CODE {
        tracing::debug!(code = event.header.code, "ignoring non-pending ZMS event");
        return;
    }

    if let Some(event_monitor_id) = &event.header.monitor_id {
        if event_monitor_id != monitor_id {
            tracing::debug!("ignoring pending event addressed to a different monitor id");
            return;
        }
    }

    match serde_json::from_value::<MonitorPending>(event.object) {
        Ok(pending) => {
            if pending_tx.send(pending).is_err() {
                tracing::warn!("monitor loop gone, dropping pending event");
            }
        }
        Err(err) => tracing::warn!(error = %err, "failed to decode MonitorPending payload"),
    }
}
