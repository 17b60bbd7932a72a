//! UTC wire timestamps to local display strings

use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Timestamp format used by every PTV endpoint
pub const WIRE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// A timestamp rendered in the viewer's zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalTime {
    /// Zone-adjusted ISO-8601 string
    pub iso: String,
    /// 12-hour clock, e.g. `07:45 PM`
    pub human: String,
}

impl LocalTime {
    /// Render a parsed instant in `tz`
    #[must_use]
    pub fn from_instant(instant: DateTime<Utc>, tz: Tz) -> Self {
        let local = instant.with_timezone(&tz);
        Self {
            iso: local.to_rfc3339(),
            human: local.format("%I:%M %p").to_string(),
        }
    }

    /// Echo an unparsable input in both fields
    #[must_use]
    pub fn degraded(raw: &str) -> Self {
        Self {
            iso: raw.to_string(),
            human: raw.to_string(),
        }
    }
}

/// Parse a wire timestamp (`YYYY-MM-DDTHH:MM:SSZ`)
#[must_use]
pub fn parse_utc(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw.trim(), WIRE_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Convert a wire timestamp to `tz`; never fails
#[must_use]
pub fn to_local(raw: &str, tz: Tz) -> LocalTime {
    parse_utc(raw).map_or_else(
        || LocalTime::degraded(raw),
        |instant| LocalTime::from_instant(instant, tz),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Australia::Melbourne;

    #[test]
    fn test_parse_wire_format() {
        let parsed = parse_utc("2024-01-01T00:00:00Z").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_melbourne_daylight_saving_is_eleven_hours_ahead() {
        let local = to_local("2024-01-01T00:00:00Z", Melbourne);
        assert_eq!(local.iso, "2024-01-01T11:00:00+11:00");
        assert_eq!(local.human, "11:00 AM");
    }

    #[test]
    fn test_melbourne_standard_time() {
        let local = to_local("2024-07-01T09:30:00Z", Melbourne);
        assert_eq!(local.iso, "2024-07-01T19:30:00+10:00");
        assert_eq!(local.human, "07:30 PM");
    }

    #[test]
    fn test_malformed_input_is_echoed() {
        let local = to_local("not-a-time", Melbourne);
        assert_eq!(local.iso, "not-a-time");
        assert_eq!(local.human, "not-a-time");

        assert!(parse_utc("2024-01-01 00:00:00").is_none());
        assert!(parse_utc("").is_none());
    }

    #[test]
    fn test_utc_zone() {
        let local = to_local("2024-03-05T23:59:00Z", Tz::UTC);
        assert_eq!(local.human, "11:59 PM");
    }
}
