//! Message-bus producer (§4.5, §10.6): publishes one [`MetadataRecord`] per
//! finished capture to `jobs.rf.<hostname>` over plain NATS core. Hand-rolls
//! the client-side INFO → CONNECT → PUB exchange rather than pulling in a
//! NATS crate — the agent only ever publishes, it never subscribes, so the
//! full client surface isn't needed.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use rf_core::{MetadataRecord, Publisher};

pub struct NatsProducer {
    connection: Mutex<TcpStream>,
    subject: String,
}

impl NatsProducer {
    /// Connects to `server_addr` (`host:port`) and completes the NATS core
    /// handshake, optionally authenticating with `auth_token`.
    pub fn connect(server_addr: &str, subject: String, auth_token: Option<&str>) -> Result<Self> {
        let stream = TcpStream::connect(server_addr)
            .with_context(|| format!("connecting to NATS server at {server_addr}"))?;
        stream.set_nodelay(true).ok();

        let mut reader = BufReader::new(stream.try_clone().context("cloning NATS stream")?);
        let mut line = String::new();
        reader.read_line(&mut line).context("reading NATS INFO line")?;
        if !line.starts_with("INFO") {
            bail!("unexpected NATS greeting: {line:?}");
        }

        let mut connect_opts = serde_json::json!({
            "verbose": false,
            "pedantic": false,
            "tls_required": false,
            "name": "rf-survey-engine",
            "lang": "rust",
            "version": env!("CARGO_PKG_VERSION"),
        });
        if let Some(token) = auth_token {
            connect_opts["auth_token"] = serde_json::Value::String(token.to_string());
        }

        let mut stream = stream;
        write!(stream, "CONNECT {}\r\n", connect_opts).context("sending NATS CONNECT")?;
        stream.flush().ok();

        Ok(Self { connection: Mutex::new(stream), subject })
    }

    fn publish_raw(&self, payload: &[u8]) -> Result<()> {
        let mut conn = self.connection.lock().unwrap();
        write!(conn, "PUB {} {}\r\n", self.subject, payload.len()).context("writing NATS PUB header")?;
        conn.write_all(payload).context("writing NATS PUB payload")?;
        conn.write_all(b"\r\n").context("writing NATS PUB trailer")?;
        conn.flush().context("flushing NATS connection")
    }
}

impl Publisher for NatsProducer {
    fn publish(&self, record: &MetadataRecord) -> Result<()> {
        let payload = serde_json::to_vec(record).context("encoding metadata record")?;
        self.publish_raw(&payload)
    }
}

/// Discards every published record. Used when no message-bus server address
/// is configured (§9 "Null implementations").
pub struct NullProducer;

impl Publisher for NullProducer {
    fn publish(&self, record: &MetadataRecord) -> Result<()> {
        tracing::debug!(file = %record.file, "no message bus configured, dropping metadata record");
        Ok(())
    }
}
