//! Core data types for the Reading Store

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::error::{StorageError, StorageResult};

/// One sensor sample with its assigned identity and acceptance timestamp.
///
/// Readings are immutable once stored. `id` and `created_at` are assigned by
/// the store in the same step as the insert, so their orderings agree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Unique, strictly increasing in insertion order, never reused
    pub id: i64,
    /// Device-reported temperature (°C)
    pub temperature: f64,
    /// Device-reported relative humidity (%)
    pub humidity: f64,
    /// Acceptance time, RFC 3339 UTC with millisecond precision
    pub created_at: String,
}

impl Reading {
    /// Parse `created_at` back into a UTC timestamp
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.created_at)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Format a timestamp the way `created_at` is stored, e.g. `2024-05-01T12:00:00.123Z`.
///
/// Fixed width, so lexicographic order of the strings is chronological order.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Check that both values of a sample are finite numbers
pub fn validate_sample(temperature: f64, humidity: f64) -> StorageResult<()> {
    if !temperature.is_finite() {
        return Err(StorageError::Invalid(
            "temperature must be a finite number".to_string(),
        ));
    }
    if !humidity.is_finite() {
        return Err(StorageError::Invalid(
            "humidity must be a finite number".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_timestamp_millis() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
            + chrono::Duration::milliseconds(123);
        assert_eq!(format_timestamp(ts), "2024-05-01T12:00:00.123Z");
    }

    #[test]
    fn test_created_at_round_trip() {
        let ts = Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap();
        let reading = Reading {
            id: 1,
            temperature: 20.0,
            humidity: 40.0,
            created_at: format_timestamp(ts),
        };
        assert_eq!(reading.created_at_utc(), Some(ts));
    }

    #[test]
    fn test_validate_sample() {
        assert!(validate_sample(31.5, 60.2).is_ok());
        assert!(validate_sample(-40.0, 0.0).is_ok());
        assert!(validate_sample(f64::NAN, 50.0).unwrap_err().is_invalid());
        assert!(validate_sample(20.0, f64::INFINITY).unwrap_err().is_invalid());
    }

    #[test]
    fn test_reading_json_shape() {
        let reading = Reading {
            id: 1,
            temperature: 31.5,
            humidity: 60.2,
            created_at: "2024-05-01T12:00:00.000Z".to_string(),
        };
        let json = serde_json::to_value(&reading).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["temperature"], 31.5);
        assert_eq!(json["humidity"], 60.2);
        assert_eq!(json["created_at"], "2024-05-01T12:00:00.000Z");
    }
}
