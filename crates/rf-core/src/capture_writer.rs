//! Capture file writer: blocking I/O offloaded from the control plane.
//!
//! Writes raw sc16 bytes to `<output_path>/<serial>-<hostname>-D...T...M....sc16`
//! and computes a checksum over the same bytes, in the same off-loaded call —
//! both are blocking leaves that must never run on the control-plane thread.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Builds the capture filename: `<serial>-<hostname>-DYYYYMMDDTHHMMSSMuuuuuu.sc16`.
pub fn capture_file_name(serial: &str, hostname: &str, timestamp: DateTime<Utc>) -> String {
    format!(
        "{serial}-{hostname}-D{date}T{time}M{micros:06}.sc16",
        date = timestamp.format("%Y%m%d"),
        time = timestamp.format("%H%M%S"),
        micros = timestamp.timestamp_subsec_micros(),
    )
}

/// Writes `iq_data` to `output_path/<filename>` and returns the absolute file
/// path plus a hex-encoded SHA-256 checksum of the bytes written.
pub fn write_capture(
    output_path: &Path,
    serial: &str,
    hostname: &str,
    timestamp: DateTime<Utc>,
    iq_data: &[u8],
) -> Result<(PathBuf, String)> {
    std::fs::create_dir_all(output_path)
        .with_context(|| format!("creating output directory {}", output_path.display()))?;

    let file_name = capture_file_name(serial, hostname, timestamp);
    let file_path = output_path.join(&file_name);

    std::fs::write(&file_path, iq_data)
        .with_context(|| format!("writing capture file {}", file_path.display()))?;

    let checksum = checksum_hex(iq_data);

    Ok((file_path, checksum))
}

/// Hex-encoded SHA-256 of `data`.
pub fn checksum_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn filename_matches_expected_format() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 7, 13, 5, 9).unwrap() + chrono::Duration::microseconds(123456);
        let name = capture_file_name("SER123", "host-a", ts);
        assert_eq!(name, "SER123-host-a-D20240307T130509M123456.sc16");
    }

    #[test]
    fn write_then_checksum_round_trips() {
        let dir = std::env::temp_dir().join(format!("rf-core-test-{}", std::process::id()));
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let data = vec![1u8, 2, 3, 4, 5, 6, 7, 8];

        let (path, checksum) = write_capture(&dir, "SER", "host", ts, &data).unwrap();
        assert!(path.exists());
        let on_disk = std::fs::read(&path).unwrap();
        assert_eq!(on_disk, data);
        assert_eq!(checksum, checksum_hex(&data));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn checksum_is_stable_and_distinct() {
        assert_eq!(checksum_hex(b"abc"), checksum_hex(b"abc"));
        assert_ne!(checksum_hex(b"abc"), checksum_hex(b"abd"));
    }
}
