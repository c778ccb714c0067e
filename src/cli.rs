//! CLI definitions for rf-survey-engine (§6). Every flag doubles as an
//! `RF_<UPPER>` environment variable via clap's `env` feature. Frequency and
//! bandwidth values accept scientific notation by parsing as `f64` first and
//! truncating, matching `original_source/config.py`'s `float()` first-pass.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[clap(
    name = "rf-survey-engine",
    version,
    about = "Per-node RF survey agent: scheduled SDR sweeps, ZMS fleet control, metadata publish",
    long_about = None
)]
pub struct Cli {
    /// Start of the sweep range, in Hz
    #[clap(long = "frequency_start", visible_alias = "f1", env = "RF_FREQUENCY_START", value_parser = parse_hz)]
    pub frequency_start: u64,

    /// End of the sweep range, in Hz (must be >= frequency_start)
    #[clap(long = "frequency_end", visible_alias = "f2", env = "RF_FREQUENCY_END", value_parser = parse_hz)]
    pub frequency_end: u64,

    /// Receiver bandwidth in Hz — doubles as sample rate and sweep step
    #[clap(short = 'b', long = "bandwidth", env = "RF_BANDWIDTH", value_parser = parse_hz)]
    pub bandwidth: u64,

    /// Capture duration in seconds
    #[clap(short = 'd', long = "duration_sec", env = "RF_DURATION_SEC")]
    pub duration_sec: f64,

    /// Receiver gain in dB, in [0, 76]
    #[clap(short = 'g', long = "gain", env = "RF_GAIN")]
    pub gain: u8,

    /// Number of captures per frequency step
    #[clap(short = 'r', long = "records", default_value_t = 1, env = "RF_RECORDS")]
    pub records: u32,

    /// Site organization name, included in published metadata
    #[clap(long = "organization", visible_alias = "o", env = "RF_ORGANIZATION")]
    pub organization: String,

    /// Site coordinates, included in published metadata
    #[clap(long = "coordinates", visible_alias = "gcs", env = "RF_COORDINATES")]
    pub coordinates: String,

    /// Number of sweep cycles to run; 0 = continuous
    #[clap(short = 'c', long = "cycles", default_value_t = 0, env = "RF_CYCLES")]
    pub cycles: u32,

    /// Wall-clock capture interval in seconds
    #[clap(short = 't', long = "timer", env = "RF_TIMER")]
    pub timer: f64,

    /// Maximum random jitter added to the interval wait, in seconds
    #[clap(short = 'j', long = "jitter", default_value_t = 0.0, env = "RF_JITTER")]
    pub jitter: f64,

    /// Liveness watchdog timeout in seconds; <= 0 disables the watchdog
    #[clap(long = "watchdog-timeout-sec", default_value_t = 30.0, env = "RF_WATCHDOG_TIMEOUT_SEC")]
    pub watchdog_timeout_sec: f64,

    /// Enable the ZMS fleet-controller monitor. When unset, a null monitor
    /// runs and the survey starts immediately under the CLI-supplied config.
    #[clap(long = "zms-enabled", env = "RF_ZMS_ENABLED")]
    pub zms_enabled: bool,

    /// ZMS REST base URL (required when --zms-enabled)
    #[clap(long = "zms-rest-base-url", env = "RF_ZMS_REST_BASE_URL")]
    pub zms_rest_base_url: Option<String>,

    /// ZMS websocket event subscription URL (required when --zms-enabled)
    #[clap(long = "zms-ws-url", env = "RF_ZMS_WS_URL")]
    pub zms_ws_url: Option<String>,

    /// ZMS REST bearer token (required when --zms-enabled)
    #[clap(long = "zms-bearer-token", env = "RF_ZMS_BEARER_TOKEN")]
    pub zms_bearer_token: Option<String>,

    /// ZMS websocket `X-Api-Token` header value (required when --zms-enabled)
    #[clap(long = "zms-api-token", env = "RF_ZMS_API_TOKEN")]
    pub zms_api_token: Option<String>,

    /// This agent's ZMS monitor id (required when --zms-enabled)
    #[clap(long = "zms-monitor-id", env = "RF_ZMS_MONITOR_ID")]
    pub zms_monitor_id: Option<String>,

    /// Enable the Prometheus `/metrics` exporter. When unset, a null
    /// exporter runs (§9 "Null implementations").
    #[clap(long = "metrics-enabled", env = "RF_METRICS_ENABLED")]
    pub metrics_enabled: bool,

    /// Bind address for the metrics exporter
    #[clap(long = "metrics-bind-addr", default_value = "127.0.0.1:9090", env = "RF_METRICS_BIND_ADDR")]
    pub metrics_bind_addr: String,

    /// Message-bus (NATS) server address. Omit to run with a null producer
    /// that discards published metadata.
    #[clap(long = "nats-server-addr", env = "RF_NATS_SERVER_ADDR")]
    pub nats_server_addr: Option<String>,

    /// Path to the advisory single-instance lock file
    #[clap(
        long = "lock-path",
        default_value = "/var/run/rf-survey-engine.lock",
        env = "RF_LOCK_PATH"
    )]
    pub lock_path: PathBuf,

    /// Directory for rotating log files. Omit for console-only logging.
    #[clap(long = "log-dir", env = "RF_LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

/// Parses a positive frequency value, accepting scientific notation
/// (`9.15e8`) by parsing as `f64` first and truncating to `u64`.
fn parse_hz(s: &str) -> Result<u64, String> {
    let value: f64 = s.parse().map_err(|_| format!("'{s}' is not a valid frequency"))?;
    if value < 0.0 {
        return Err(format!("frequency must be positive, got {value}"));
    }
    Ok(value as u64)
}
