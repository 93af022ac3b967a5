//! Time utilities.
//!
//! All persisted timestamps in versemark are unix milliseconds. The remote
//! backend speaks RFC 3339 strings; conversion happens at the adapter
//! boundary, never above it.

use chrono::{DateTime, TimeZone, Utc};

use crate::error::{Error, Result};

/// Returns the current Unix timestamp in milliseconds.
pub fn now_timestamp_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Render a millisecond timestamp as an RFC 3339 string (UTC).
pub fn millis_to_rfc3339(millis: i64) -> String {
    let dt: DateTime<Utc> = Utc
        .timestamp_millis_opt(millis)
        .single()
        .unwrap_or_else(|| Utc.timestamp_millis_opt(0).unwrap());
    dt.to_rfc3339()
}

/// Parse an RFC 3339 timestamp into unix milliseconds.
pub fn rfc3339_to_millis(s: &str) -> Result<i64> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.timestamp_millis())
        .map_err(|e| Error::SerializationError(format!("bad timestamp {:?}: {}", s, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_timestamp_is_reasonable() {
        let ts = now_timestamp_millis();
        // Should be after 2024-01-01 in millis
        assert!(ts > 1_704_067_200_000, "Timestamp {} is too old", ts);
        // Should be before 2100-01-01 in millis
        assert!(ts < 4_102_444_800_000, "Timestamp {} is too far in future", ts);
    }

    #[test]
    fn test_rfc3339_round_trip() {
        let millis = 1_700_000_000_123;
        let s = millis_to_rfc3339(millis);
        assert_eq!(rfc3339_to_millis(&s).unwrap(), millis);
    }

    #[test]
    fn test_rfc3339_with_offset() {
        // The backend may return offsets other than Z
        let millis = rfc3339_to_millis("2024-06-01T12:00:00+02:00").unwrap();
        assert_eq!(millis, 1_717_236_000_000);
    }

    #[test]
    fn test_bad_timestamp_is_rejected() {
        assert!(rfc3339_to_millis("yesterday").is_err());
    }
}
