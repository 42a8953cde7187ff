//! Timestamp normalization
//!
//! The sensor pipeline writes naive ISO-8601 strings that are always UTC.
//! Anything carrying an explicit zone marker is parsed as given; numbers are
//! epochs. Normalization never fails: garbage falls back to "now".

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

/// Epoch values above this are taken as milliseconds rather than seconds.
const EPOCH_MILLIS_THRESHOLD: f64 = 1e11;

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const ZONED_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
];

/// Normalize a raw feed value to an absolute instant, using the wall clock
/// for missing or unusable input.
pub fn normalize(raw: &Value) -> DateTime<Utc> {
    normalize_at(raw, Utc::now())
}

/// Same as [`normalize`] with an explicit fallback instant.
pub fn normalize_at(raw: &Value, now: DateTime<Utc>) -> DateTime<Utc> {
    match raw {
        Value::Number(n) => n.as_f64().and_then(from_epoch).unwrap_or(now),
        Value::String(s) => parse_str(s).unwrap_or(now),
        _ => now,
    }
}

/// Parse a timestamp string. `None` only when nothing usable was found.
pub fn parse_str(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(n) = s.parse::<f64>() {
        return from_epoch(n);
    }

    if has_zone_marker(s) {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.with_timezone(&Utc));
        }
        // "2025-08-25 14:38:18Z" is not RFC 3339 but is clearly UTC
        if let Some(stripped) = s.strip_suffix('Z').or_else(|| s.strip_suffix('z')) {
            return parse_naive(stripped).map(|naive| naive.and_utc());
        }
        for fmt in ZONED_FORMATS {
            if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
                return Some(dt.with_timezone(&Utc));
            }
        }
    }

    if let Some(naive) = parse_naive(s) {
        return Some(naive.and_utc());
    }

    // Best effort for anything else the producer might hand us
    DateTime::parse_from_rfc2822(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_naive(s: &str) -> Option<NaiveDateTime> {
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// A zone marker is a trailing `Z` or a `+hh:mm`/`-hhmm` offset after the
/// time-of-day part. The date's own dashes do not count.
fn has_zone_marker(s: &str) -> bool {
    if s.ends_with('Z') || s.ends_with('z') {
        return true;
    }
    let Some(time_start) = s.find(&['T', 't', ' '][..]) else {
        return false;
    };
    s[time_start..].contains(&['+', '-'][..])
}

fn from_epoch(n: f64) -> Option<DateTime<Utc>> {
    if !n.is_finite() || n <= 0.0 {
        return None;
    }
    let millis = if n > EPOCH_MILLIS_THRESHOLD { n } else { n * 1000.0 };
    Utc.timestamp_millis_opt(millis as i64).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn naive_string_is_utc() {
        let naive = normalize_at(&json!("2025-08-25T14:38:18"), fixed_now());
        let zulu = normalize_at(&json!("2025-08-25T14:38:18Z"), fixed_now());
        assert_eq!(naive, zulu);
        assert_eq!(naive, Utc.with_ymd_and_hms(2025, 8, 25, 14, 38, 18).unwrap());
    }

    #[test]
    fn explicit_offset_is_respected() {
        let dt = normalize_at(&json!("2025-08-25T16:38:18+02:00"), fixed_now());
        assert_eq!(dt, Utc.with_ymd_and_hms(2025, 8, 25, 14, 38, 18).unwrap());
    }

    #[test]
    fn fractional_seconds_and_space_separator() {
        let dt = parse_str("2025-08-25 14:38:18.250").unwrap();
        assert_eq!(dt.timestamp_millis() % 1000, 250);
        assert!(parse_str("2025-08-25 14:38:18Z").is_some());
    }

    #[test]
    fn epoch_numbers_seconds_and_millis() {
        let secs = normalize_at(&json!(1_756_132_698), fixed_now());
        let millis = normalize_at(&json!(1_756_132_698_000_i64), fixed_now());
        assert_eq!(secs, millis);
        assert_eq!(secs, Utc.with_ymd_and_hms(2025, 8, 25, 14, 38, 18).unwrap());
    }

    #[test]
    fn falsy_and_garbage_fall_back_to_now() {
        let now = fixed_now();
        assert_eq!(normalize_at(&Value::Null, now), now);
        assert_eq!(normalize_at(&json!(""), now), now);
        assert_eq!(normalize_at(&json!(0), now), now);
        assert_eq!(normalize_at(&json!(false), now), now);
        assert_eq!(normalize_at(&json!("not a date"), now), now);
    }

    #[test]
    fn date_dashes_are_not_a_zone_marker() {
        assert!(!has_zone_marker("2025-08-25T14:38:18"));
        assert!(has_zone_marker("2025-08-25T14:38:18-05:00"));
        assert!(has_zone_marker("2025-08-25T14:38:18Z"));
    }
}
