//! # Compact Duration Parsing
//!
//! Parses the `<int><unit>` form used for command TTLs and for the
//! `JANITOR_INTERVAL` config value, e.g. `10s`, `1m`, `500ms`.

use std::time::Duration;

/// Returned when a duration string does not match `<int><unit>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationParseError;

/// Parses a compact duration string.
///
/// Recognized units: `ns`, `us`, `ms`, `s`, `m`, `h`. An empty string, a
/// missing/unknown unit, or a non-digit magnitude is rejected.
pub fn parse_duration(input: &[u8]) -> Result<Duration, DurationParseError> {
    if input.is_empty() {
        return Err(DurationParseError);
    }

    let split_at = input
        .iter()
        .position(|b| !b.is_ascii_digit())
        .ok_or(DurationParseError)?;

    if split_at == 0 {
        return Err(DurationParseError);
    }

    let (digits, unit) = input.split_at(split_at);
    let magnitude: u64 = std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(DurationParseError)?;

    let duration = match unit {
        b"ns" => Duration::from_nanos(magnitude),
        b"us" => Duration::from_micros(magnitude),
        b"ms" => Duration::from_millis(magnitude),
        b"s" => Duration::from_secs(magnitude),
        b"m" => Duration::from_secs(magnitude.saturating_mul(60)),
        b"h" => Duration::from_secs(magnitude.saturating_mul(3600)),
        _ => return Err(DurationParseError),
    };

    Ok(duration)
}
