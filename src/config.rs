//! Application settings (§10.3): combines the parsed [`Cli`] with
//! environment-only values (`STORAGE_PATH`) and the optional ZMS block. There
//! is no `probe.toml`-style file here — every value is a flag or an
//! `RF_<UPPER>` environment variable, per §6.

use std::path::PathBuf;

use anyhow::{Context, Result};
use rf_core::{ReceiverConfig, SweepConfig};

use crate::cli::Cli;

/// Fleet-controller connection settings, present only when
/// `--zms-enabled`/`RF_ZMS_ENABLED` is set.
#[derive(Debug, Clone)]
pub struct ZmsSettings {
    pub rest_base_url: String,
    pub ws_url: String,
    pub bearer_token: String,
    pub api_token: String,
    pub monitor_id: String,
}

/// Fully resolved application configuration, derived from CLI flags plus
/// environment-only settings.
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub storage_path: PathBuf,
    pub hostname: String,
    pub organization: String,
    pub coordinates: String,
    pub sweep: SweepConfig,
    pub receiver: ReceiverConfig,
    pub watchdog_timeout_sec: f64,
    pub nats_server_addr: Option<String>,
    pub nats_subject: String,
    pub metrics_enabled: bool,
    pub metrics_bind_addr: String,
    pub lock_path: PathBuf,
    pub log_dir: Option<PathBuf>,
    pub zms: Option<ZmsSettings>,
}

impl AppSettings {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let storage_path = PathBuf::from(
            std::env::var("STORAGE_PATH").context("STORAGE_PATH environment variable must be set")?,
        );

        let hostname = hostname::get()
            .context("resolving local hostname")?
            .to_string_lossy()
            .into_owned();

        let sweep = SweepConfig {
            start_hz: cli.frequency_start,
            end_hz: cli.frequency_end,
            step_hz: cli.bandwidth,
            cycles: cli.cycles,
            records_per_step: cli.records,
            interval_sec: cli.timer,
            max_jitter_sec: cli.jitter,
        };
        sweep.validate().context("invalid sweep configuration")?;

        let receiver = ReceiverConfig {
            bandwidth_hz: cli.bandwidth,
            gain_db: cli.gain,
            duration_sec: cli.duration_sec,
        };
        receiver.validate().context("invalid receiver configuration")?;

        let zms = if cli.zms_enabled {
            Some(ZmsSettings {
                rest_base_url: cli
                    .zms_rest_base_url
                    .clone()
                    .context("--zms-rest-base-url is required when --zms-enabled is set")?,
                ws_url: cli.zms_ws_url.clone().context("--zms-ws-url is required when --zms-enabled is set")?,
                bearer_token: cli
                    .zms_bearer_token
                    .clone()
                    .context("--zms-bearer-token is required when --zms-enabled is set")?,
                api_token: cli.zms_api_token.clone().context("--zms-api-token is required when --zms-enabled is set")?,
                monitor_id: cli
                    .zms_monitor_id
                    .clone()
                    .context("--zms-monitor-id is required when --zms-enabled is set")?,
            })
        } else {
            None
        };

        let nats_subject = format!("jobs.rf.{hostname}");

        Ok(Self {
            storage_path,
            organization: cli.organization.clone(),
            coordinates: cli.coordinates.clone(),
            hostname,
            sweep,
            receiver,
            watchdog_timeout_sec: cli.watchdog_timeout_sec,
            nats_server_addr: cli.nats_server_addr.clone(),
            nats_subject,
            metrics_enabled: cli.metrics_enabled,
            metrics_bind_addr: cli.metrics_bind_addr.clone(),
            lock_path: cli.lock_path.clone(),
            log_dir: cli.log_dir.clone(),
            zms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_cli() -> Cli {
        Cli {
            frequency_start: 900_000_000,
            frequency_end: 910_000_000,
            bandwidth: 1_000_000,
            duration_sec: 0.1,
            gain: 20,
            records: 1,
            organization: "acme".into(),
            coordinates: "0N0W".into(),
            cycles: 0,
            timer: 5.0,
            jitter: 0.0,
            watchdog_timeout_sec: 30.0,
            zms_enabled: false,
            zms_rest_base_url: None,
            zms_ws_url: None,
            zms_bearer_token: None,
            zms_api_token: None,
            zms_monitor_id: None,
            metrics_enabled: false,
            metrics_bind_addr: "127.0.0.1:9090".into(),
            nats_server_addr: None,
            lock_path: PathBuf::from("/tmp/rf-survey-engine-test.lock"),
            log_dir: None,
        }
    }

    #[test]
    fn zms_disabled_leaves_settings_none() {
        std::env::set_var("STORAGE_PATH", "/tmp");
        let cli = base_cli();
        let settings = AppSettings::from_cli(&cli).unwrap();
        assert!(settings.zms.is_none());
        assert_eq!(settings.nats_subject, format!("jobs.rf.{}", settings.hostname));
    }

    #[test]
    fn zms_enabled_without_required_fields_is_rejected() {
        std::env::set_var("STORAGE_PATH", "/tmp");
        let mut cli = base_cli();
        cli.zms_enabled = true;
        assert!(AppSettings::from_cli(&cli).is_err());
    }

    #[test]
    fn invalid_sweep_range_is_rejected() {
        std::env::set_var("STORAGE_PATH", "/tmp");
        let mut cli = base_cli();
        cli.frequency_end = cli.frequency_start - 1;
        assert!(AppSettings::from_cli(&cli).is_err());
    }
}
