//! Wall-clock interval alignment.
//!
//! Captures are aligned to epoch-multiples of the configured interval so a
//! fleet of agents shares a coherent capture cadence rather than drifting
//! apart based on when each process happened to start.

use rand::Rng;

/// Seconds until the next interval boundary strictly after `now_epoch_sec`.
///
/// Always returns a value in `(0, interval_sec]`. When `now_epoch_sec` lands
/// exactly on a boundary the full interval is returned rather than zero —
/// firing immediately would collapse two captures onto the same boundary.
pub fn wait_time(interval_sec: f64, now_epoch_sec: f64) -> f64 {
    debug_assert!(interval_sec > 0.0, "interval_sec must be > 0");
    let remainder = now_epoch_sec.rem_euclid(interval_sec);
    if remainder == 0.0 {
        interval_sec
    } else {
        interval_sec - remainder
    }
}

/// `wait_time` plus a uniform random jitter in `[0, max_jitter_sec]`, used to
/// decorrelate captures across a fleet sharing the same interval.
pub fn wait_time_with_jitter(interval_sec: f64, now_epoch_sec: f64, max_jitter_sec: f64) -> f64 {
    let base = wait_time(interval_sec, now_epoch_sec);
    if max_jitter_sec <= 0.0 {
        return base;
    }
    let jitter = rand::thread_rng().gen_range(0.0..=max_jitter_sec);
    base + jitter
}
