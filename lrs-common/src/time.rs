//! Timestamp utilities

use chrono::{DateTime, SecondsFormat, Utc};

use crate::{Error, Result};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Parse an RFC 3339 timestamp into UTC
pub fn parse_rfc3339(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::InvalidInput(format!("Invalid timestamp '{}': {}", value, e)))
}

/// Format a timestamp for storage
///
/// Fixed millisecond precision with a `Z` suffix, so lexical order of the
/// stored text equals chronological order.
pub fn to_storage_string(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        // Should be a reasonable timestamp (after year 2000)
        assert!(timestamp.timestamp() > 946_684_800);
    }

    #[test]
    fn test_parse_offset_timestamp_normalizes_to_utc() {
        let parsed = parse_rfc3339("2024-03-01T10:00:00+02:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(parse_rfc3339("yesterday"), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_storage_string_sorts_chronologically() {
        let early = Utc.with_ymd_and_hms(2024, 1, 1, 9, 59, 59).unwrap();
        let late = early + chrono::Duration::milliseconds(1500);
        let a = to_storage_string(&early);
        let b = to_storage_string(&late);
        assert_eq!(a, "2024-01-01T09:59:59.000Z");
        assert!(a < b);
    }
}
