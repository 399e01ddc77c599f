use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Interpret an optional source value.
///
/// Empty strings and the placeholders "NA", "N/A", "null" and "-" mean absent.
pub fn optional_value(s: &str) -> Option<String> {
    let s = s.trim();
    if s.is_empty() || matches!(s.to_lowercase().as_str(), "na" | "n/a" | "null" | "none" | "-") {
        None
    } else {
        Some(s.to_string())
    }
}

/// Largest duration kept, so every stored value fits an SQLite integer.
pub const MAX_DURATION_SECS: u64 = i64::MAX as u64;

/// Parse a duration in whole seconds.
///
/// Handles formats like:
/// - "42" -> 42
/// - "42.7" -> 42 (fractional seconds are truncated)
/// - "-3" -> 0 (negative durations clamp to zero)
/// - "00:01:05" -> 65
/// - "" or garbage -> 0
/// - anything above [`MAX_DURATION_SECS`] -> `MAX_DURATION_SECS`
pub fn parse_duration(s: &str) -> u64 {
    let s = s.trim();
    if s.contains(':') {
        let mut total = 0u64;
        for part in s.split(':') {
            let Ok(v) = part.trim().parse::<u64>() else {
                return 0;
            };
            total = total
                .checked_mul(60)
                .and_then(|t| t.checked_add(v))
                .unwrap_or(u64::MAX);
        }
        return total.min(MAX_DURATION_SECS);
    }
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => (v.trunc() as u64).min(MAX_DURATION_SECS),
        _ => 0,
    }
}

/// Parse a boolean flag column ("true", "yes", "1", "y").
pub fn parse_flag(s: &str) -> bool {
    matches!(s.trim().to_lowercase().as_str(), "true" | "yes" | "y" | "1")
}

/// Parse a source timestamp into an instant.
///
/// Accepts RFC 3339 (`2025-06-24T14:46:31.000Z`), and naive
/// `YYYY-MM-DD HH:MM:SS` / `YYYY-MM-DDTHH:MM:SS` forms taken as UTC.
pub fn parse_instant(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%m/%d/%Y %H:%M:%S",
    ];
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Calendar date of a timestamp, used for date-range filtering.
///
/// Falls back to a leading `YYYY-MM-DD` when the full timestamp does not parse.
pub fn calendar_date(s: &str) -> Option<NaiveDate> {
    if let Some(instant) = parse_instant(s) {
        return Some(instant.date_naive());
    }
    let s = s.trim();
    s.get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
        .or_else(|| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_optional_placeholders() {
        assert_eq!(optional_value("NA"), None);
        assert_eq!(optional_value(" n/a "), None);
        assert_eq!(optional_value(""), None);
        assert_eq!(
            optional_value("2025-06-24T14:46:31Z").as_deref(),
            Some("2025-06-24T14:46:31Z")
        );
    }

    #[test]
    fn test_duration_formats() {
        assert_eq!(parse_duration("42"), 42);
        assert_eq!(parse_duration("42.7"), 42);
        assert_eq!(parse_duration("-3"), 0);
        assert_eq!(parse_duration("00:01:05"), 65);
        assert_eq!(parse_duration("abc"), 0);
        assert_eq!(parse_duration(""), 0);
    }

    #[test]
    fn test_oversized_durations_saturate() {
        assert_eq!(parse_duration("999999999999999999:00"), MAX_DURATION_SECS);
        assert_eq!(parse_duration("1:99999999999999999999"), 0);
        assert_eq!(parse_duration("1e30"), MAX_DURATION_SECS);
        assert_eq!(parse_duration("9223372036854775807"), MAX_DURATION_SECS);
    }

    #[test]
    fn test_flags() {
        assert!(parse_flag("true"));
        assert!(parse_flag("Yes"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(""));
    }

    #[test]
    fn test_parse_instant_rfc3339() {
        let t = parse_instant("2025-06-24T14:46:31.000Z").unwrap();
        assert_eq!(t.hour(), 14);
        let offset = parse_instant("2025-06-24T10:46:31-04:00").unwrap();
        assert_eq!(t, offset);
    }

    #[test]
    fn test_parse_instant_naive() {
        let t = parse_instant("2025-06-24 08:00:00").unwrap();
        assert_eq!(t.day(), 24);
        assert!(parse_instant("not a time").is_none());
    }

    #[test]
    fn test_calendar_date() {
        let d = calendar_date("2025-06-24T23:59:59Z").unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2025, 6, 24).unwrap());
        let prefix = calendar_date("2025-06-24 garbage").unwrap();
        assert_eq!(prefix.month(), 6);
        assert!(calendar_date("").is_none());
    }
}
