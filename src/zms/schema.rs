//! ZMS reconfiguration parameter schema (§6, §11.4): validates a server-
//! supplied opaque parameter map against the documented numeric bounds and
//! reduces it to a `SweepConfig`/`ReceiverConfig` pair. Fields ZMS does not
//! control (`cycles`, `records_per_step`, `max_jitter_sec`) always carry
//! over from the current live sweep config untouched, per §4.6 step 4.
//! Bounds are taken verbatim from `original_source/validators.py`.

use std::collections::HashMap;
use std::ops::RangeInclusive;

use anyhow::{anyhow, Result};
use rf_core::{ReceiverConfig, SweepConfig};
use serde_json::Value;

pub const GAIN_DB_RANGE: RangeInclusive<i64> = 0..=76;
pub const DURATION_SEC_RANGE: RangeInclusive<f64> = 0.01..=10.0;
pub const BANDWIDTH_HZ_RANGE: RangeInclusive<u64> = 200_000..=56_000_000;
pub const FREQ_HZ_RANGE: RangeInclusive<u64> = 70_000_000..=6_000_000_000;
pub const SAMPLE_INTERVAL_RANGE: RangeInclusive<i64> = 1..=10;

/// Validates `params` and returns the reduced `(SweepConfig, ReceiverConfig)`
/// pair, starting from the current live snapshot and overriding only the
/// keys present in `params`. A key present but out of range, or of the wrong
/// JSON type, is a validation failure — the whole pending is rejected, none
/// of the present keys are partially applied.
pub fn apply_params(
    params: &HashMap<String, Value>,
    current_sweep: &SweepConfig,
    current_receiver: &ReceiverConfig,
) -> Result<(SweepConfig, ReceiverConfig)> {
    let mut sweep = current_sweep.clone();
    let mut receiver = *current_receiver;

    if let Some(v) = params.get("gain_db") {
        let gain = as_i64(v, "gain_db")?;
        if !GAIN_DB_RANGE.contains(&gain) {
            return Err(anyhow!("gain_db {gain} out of range [0, 76]"));
        }
        receiver.gain_db = gain as u8;
    }

    if let Some(v) = params.get("duration_sec") {
        let duration = as_f64(v, "duration_sec")?;
        if !DURATION_SEC_RANGE.contains(&duration) {
            return Err(anyhow!("duration_sec {duration} out of range [0.01, 10.0]"));
        }
        receiver.duration_sec = duration;
    }

    if let Some(v) = params.get("bandwidth_hz") {
        let bandwidth = as_u64(v, "bandwidth_hz")?;
        if !BANDWIDTH_HZ_RANGE.contains(&bandwidth) {
            return Err(anyhow!("bandwidth_hz {bandwidth} out of range [2e5, 5.6e7]"));
        }
        receiver.bandwidth_hz = bandwidth;
        sweep.step_hz = bandwidth; // step_hz always equals receiver bandwidth, §3
    }

    let start_hz = match params.get("start_freq_hz") {
        Some(v) => {
            let start = as_u64(v, "start_freq_hz")?;
            if !FREQ_HZ_RANGE.contains(&start) {
                return Err(anyhow!("start_freq_hz {start} out of range [7e7, 6e9]"));
            }
            start
        }
        None => sweep.start_hz,
    };
    let end_hz = match params.get("end_freq_hz") {
        Some(v) => {
            let end = as_u64(v, "end_freq_hz")?;
            if !FREQ_HZ_RANGE.contains(&end) {
                return Err(anyhow!("end_freq_hz {end} out of range [7e7, 6e9]"));
            }
            end
        }
        None => sweep.end_hz,
    };
    if end_hz < start_hz {
        return Err(anyhow!("end_freq_hz ({end_hz}) must be >= start_freq_hz ({start_hz})"));
    }
    sweep.start_hz = start_hz;
    sweep.end_hz = end_hz;

    if let Some(v) = params.get("sample_interval") {
        let interval = as_i64(v, "sample_interval")?;
        if !SAMPLE_INTERVAL_RANGE.contains(&interval) {
            return Err(anyhow!("sample_interval {interval} out of range [1, 10]"));
        }
        sweep.interval_sec = interval as f64;
    }

    sweep.validate().map_err(|e| anyhow!(e))?;
    receiver.validate().map_err(|e| anyhow!(e))?;

    Ok((sweep, receiver))
}

fn as_i64(v: &Value, field: &str) -> Result<i64> {
    v.as_i64().ok_or_else(|| anyhow!("{field} must be an integer"))
}

fn as_u64(v: &Value, field: &str) -> Result<u64> {
    v.as_u64().ok_or_else(|| anyhow!("{field} must be a non-negative integer"))
}

fn as_f64(v: &Value, field: &str) -> Result<f64> {
    v.as_f64().ok_or_else(|| anyhow!("{field} must be a number"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sweep() -> SweepConfig {
        SweepConfig {
            start_hz: 900_000_000,
            end_hz: 910_000_000,
            step_hz: 1_000_000,
            cycles: 0,
            records_per_step: 3,
            interval_sec: 5.0,
            max_jitter_sec: 1.5,
        }
    }

    fn receiver() -> ReceiverConfig {
        ReceiverConfig { bandwidth_hz: 1_000_000, gain_db: 20, duration_sec: 0.1 }
    }

    #[test]
    fn empty_params_carries_everything_over() {
        let (s, r) = apply_params(&HashMap::new(), &sweep(), &receiver()).unwrap();
        assert_eq!(s, sweep());
        assert_eq!(r, receiver());
    }

    #[test]
    fn uncontrolled_fields_always_survive_a_full_update() {
        let mut params = HashMap::new();
        params.insert("gain_db".to_string(), json!(40));
        params.insert("duration_sec".to_string(), json!(0.2));
        params.insert("bandwidth_hz".to_string(), json!(2_000_000));
        params.insert("start_freq_hz".to_string(), json!(920_000_000));
        params.insert("end_freq_hz".to_string(), json!(930_000_000));
        params.insert("sample_interval".to_string(), json!(7));

        let (s, r) = apply_params(&params, &sweep(), &receiver()).unwrap();

        assert_eq!(s.cycles, sweep().cycles);
        assert_eq!(s.records_per_step, sweep().records_per_step);
        assert_eq!(s.max_jitter_sec, sweep().max_jitter_sec);
        assert_eq!(s.start_hz, 920_000_000);
        assert_eq!(s.end_hz, 930_000_000);
        assert_eq!(s.step_hz, 2_000_000);
        assert_eq!(s.interval_sec, 7.0);
        assert_eq!(r.gain_db, 40);
        assert_eq!(r.duration_sec, 0.2);
        assert_eq!(r.bandwidth_hz, 2_000_000);
    }

    #[test]
    fn out_of_range_gain_is_rejected() {
        let mut params = HashMap::new();
        params.insert("gain_db".to_string(), json!(200));
        assert!(apply_params(&params, &sweep(), &receiver()).is_err());
    }

    #[test]
    fn end_before_start_is_rejected() {
        let mut params = HashMap::new();
        params.insert("start_freq_hz".to_string(), json!(900_000_000));
        params.insert("end_freq_hz".to_string(), json!(800_000_000));
        assert!(apply_params(&params, &sweep(), &receiver()).is_err());
    }

    #[test]
    fn wrong_json_type_is_rejected() {
        let mut params = HashMap::new();
        params.insert("gain_db".to_string(), json!("not a number"));
        assert!(apply_params(&params, &sweep(), &receiver()).is_err());
    }
}
