//! Core data model: the immutable configs, per-capture values, and identity
//! records that flow through the survey pipeline.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable sweep parameters. Replaced atomically on reconfiguration;
/// readers must copy before long-running use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    pub start_hz: u64,
    pub end_hz: u64,
    pub step_hz: u64,
    /// 0 = unbounded.
    pub cycles: u32,
    pub records_per_step: u32,
    pub interval_sec: f64,
    pub max_jitter_sec: f64,
}

impl SweepConfig {
    pub fn validate(&self) -> Result<()> {
        if self.end_hz < self.start_hz {
            bail!("end_hz ({}) must be >= start_hz ({})", self.end_hz, self.start_hz);
        }
        if self.step_hz == 0 {
            bail!("step_hz must be > 0");
        }
        if self.records_per_step < 1 {
            bail!("records_per_step must be >= 1");
        }
        if self.interval_sec <= 0.0 {
            bail!("interval_sec must be > 0");
        }
        if self.max_jitter_sec < 0.0 {
            bail!("max_jitter_sec must be >= 0");
        }
        Ok(())
    }

    /// Number of distinct center frequencies visited per cycle:
    /// `⌈(end−start)/step⌉+1`.
    pub fn visits_per_cycle(&self) -> u64 {
        (self.end_hz - self.start_hz).div_ceil(self.step_hz) + 1
    }

    /// Ascending sequence of center frequencies for one sweep.
    pub fn frequencies(&self) -> impl Iterator<Item = u64> + '_ {
        let mut next = Some(self.start_hz);
        std::iter::from_fn(move || {
            let current = next?;
            next = if current < self.end_hz {
                Some((current + self.step_hz).min(self.end_hz))
            } else {
                None
            };
            Some(current)
        })
    }
}

/// Immutable receiver parameters. `bandwidth_hz` doubles as sample rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReceiverConfig {
    pub bandwidth_hz: u64,
    pub gain_db: u8,
    pub duration_sec: f64,
}

impl ReceiverConfig {
    pub fn validate(&self) -> Result<()> {
        if self.bandwidth_hz == 0 {
            bail!("bandwidth_hz must be > 0");
        }
        if self.gain_db > 76 {
            bail!("gain_db must be in [0, 76], got {}", self.gain_db);
        }
        if self.duration_sec <= 0.0 {
            bail!("duration_sec must be > 0");
        }
        Ok(())
    }

    /// `⌊duration_sec · bandwidth_hz⌋`.
    pub fn num_samples(&self) -> usize {
        (self.duration_sec * self.bandwidth_hz as f64).floor() as usize
    }
}

/// One acquisition's raw output: sc16 bytes (interleaved little-endian int16
/// I, int16 Q) plus the frequency and timestamp it was taken at.
#[derive(Debug, Clone)]
pub struct RawCapture {
    pub iq_data: Vec<u8>,
    pub center_freq_hz: u64,
    pub capture_timestamp: DateTime<Utc>,
}

/// A raw capture plus deep-copied config snapshots, so downstream processing
/// reflects the configuration active at capture time even if the live
/// configs change before the job is drained.
#[derive(Debug, Clone)]
pub struct ProcessingJob {
    pub raw: RawCapture,
    pub receiver_config: ReceiverConfig,
    pub sweep_config: SweepConfig,
}

/// Process-wide static identity, created once at startup.
#[derive(Debug, Clone)]
pub struct ApplicationInfo {
    pub hostname: String,
    pub organization: String,
    pub coordinates: String,
    pub output_path: std::path::PathBuf,
    pub group_id: String,
    /// Hardware serial reported by the receiver at `initialize()`.
    pub serial: String,
}

/// Output envelope published per capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub hostname: String,
    pub organization: String,
    pub coordinates: String,
    pub group: String,
    pub serial: String,
    pub bit_depth: u8,
    pub interval: f64,
    pub length: f64,
    pub gain: u8,
    pub sampling_rate: u64,
    pub frequency: u64,
    pub timestamp: DateTime<Utc>,
    pub file: String,
    pub checksum: String,
}

impl MetadataRecord {
    pub fn from_job(app: &ApplicationInfo, job: &ProcessingJob, file: String, checksum: String) -> Self {
        Self {
            hostname: app.hostname.clone(),
            organization: app.organization.clone(),
            coordinates: app.coordinates.clone(),
            group: app.group_id.clone(),
            serial: app.serial.clone(),
            bit_depth: 16,
            interval: job.sweep_config.interval_sec,
            length: job.receiver_config.duration_sec,
            gain: job.receiver_config.gain_db,
            sampling_rate: job.receiver_config.bandwidth_hz,
            frequency: job.raw.center_freq_hz,
            timestamp: job.raw.capture_timestamp,
            file,
            checksum,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(start: u64, end: u64, step: u64) -> SweepConfig {
        SweepConfig {
            start_hz: start,
            end_hz: end,
            step_hz: step,
            cycles: 1,
            records_per_step: 1,
            interval_sec: 1.0,
            max_jitter_sec: 0.0,
        }
    }

    #[test]
    fn single_frequency_sweep_visits_once() {
        let c = cfg(915_000_000, 915_000_000, 20_000_000);
        let freqs: Vec<u64> = c.frequencies().collect();
        assert_eq!(freqs, vec![915_000_000]);
        assert_eq!(c.visits_per_cycle(), 1);
    }

    #[test]
    fn sweep_coverage_matches_ceil_formula() {
        let c = cfg(100, 250, 50);
        let freqs: Vec<u64> = c.frequencies().collect();
        assert_eq!(freqs, vec![100, 150, 200, 250]);
        assert_eq!(freqs.len() as u64, c.visits_per_cycle());
    }

    #[test]
    fn receiver_config_rejects_out_of_range_gain() {
        let bad = ReceiverConfig { bandwidth_hz: 1_000_000, gain_db: 200, duration_sec: 1.0 };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn num_samples_floors() {
        let rc = ReceiverConfig { bandwidth_hz: 1_000_000, gain_db: 10, duration_sec: 0.0015 };
        assert_eq!(rc.num_samples(), 1500);
    }
}
