//! Departure shaping: future-only, one per minute, ascending, capped

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::PtvError;
use crate::models::Departure;
use crate::time::{LocalTime, parse_utc};

/// Number of departures kept when the caller does not say otherwise
pub const DEFAULT_LIMIT: usize = 5;

#[derive(Debug, Deserialize)]
struct RawDeparture {
    #[serde(default)]
    scheduled_departure_utc: Option<String>,
    #[serde(default)]
    estimated_departure_utc: Option<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// Pull the `departures` array out of a response body
pub fn extract_departures(body: &Value) -> Result<&[Value], PtvError> {
    body.get("departures")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .ok_or_else(|| PtvError::ParseError("response has no departures array".to_string()))
}

/// Turn raw API departures into the list view adapters display
///
/// Entries without a usable timestamp, or not strictly after `now`, are
/// dropped. Of several entries in the same minute the first one in API order
/// is kept. The result is ascending and holds at most `limit` entries.
#[must_use]
pub fn process_departures(
    raw: &[Value],
    now: DateTime<Utc>,
    tz: Tz,
    limit: usize,
) -> Vec<Departure> {
    let mut seen_minutes = HashSet::new();
    let mut departures: Vec<Departure> = raw
        .iter()
        .filter_map(|value| normalise(value, tz))
        .filter(|d| d.instant > now)
        .filter(|d| seen_minutes.insert(d.instant.timestamp().div_euclid(60)))
        .collect();

    departures.sort_by_key(|d| d.instant);
    departures.truncate(limit);
    departures
}

fn normalise(value: &Value, tz: Tz) -> Option<Departure> {
    let raw = match RawDeparture::deserialize(value) {
        Ok(raw) => raw,
        Err(e) => {
            debug!(error = %e, "Skipping malformed departure");
            return None;
        },
    };

    // estimated wins over scheduled when it parses
    let estimated = raw.estimated_departure_utc.as_deref().and_then(parse_utc);
    let from_estimate = estimated.is_some();
    let Some(instant) =
        estimated.or_else(|| raw.scheduled_departure_utc.as_deref().and_then(parse_utc))
    else {
        debug!(run_ref = ?raw.extra.get("run_ref"), "Skipping departure without a usable time");
        return None;
    };

    let local = LocalTime::from_instant(instant, tz);
    Some(Departure {
        scheduled_departure_utc: raw.scheduled_departure_utc,
        estimated_departure_utc: raw.estimated_departure_utc,
        departure: local.human,
        departure_iso: local.iso,
        extra: raw.extra,
        instant,
        from_estimate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Australia::Melbourne;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 30).unwrap()
    }

    fn scheduled(ts: &str) -> Value {
        json!({ "scheduled_departure_utc": ts, "estimated_departure_utc": null, "run_ref": ts })
    }

    #[test]
    fn test_same_minute_past_and_future_keeps_future() {
        let raw = vec![
            scheduled("2024-01-01T00:00:10Z"),
            json!({ "estimated_departure_utc": "2024-01-01T00:00:50Z" }),
        ];

        let result = process_departures(&raw, now(), Melbourne, DEFAULT_LIMIT);
        assert_eq!(result.len(), 1);
        assert_eq!(
            result[0].estimated_departure_utc.as_deref(),
            Some("2024-01-01T00:00:50Z")
        );
        assert_eq!(result[0].departure, "11:00 AM");
    }

    #[test]
    fn test_estimated_preferred_over_scheduled() {
        let raw = vec![json!({
            "scheduled_departure_utc": "2024-01-01T00:05:00Z",
            "estimated_departure_utc": "2024-01-01T00:07:00Z"
        })];

        let result = process_departures(&raw, now(), Melbourne, DEFAULT_LIMIT);
        assert_eq!(result[0].departure, "11:07 AM");
        assert_eq!(result[0].departure_iso, "2024-01-01T11:07:00+11:00");
        assert!(result[0].is_estimate());
    }

    #[test]
    fn test_unparsable_estimate_falls_back_to_schedule() {
        let raw = vec![json!({
            "scheduled_departure_utc": "2024-01-01T00:05:00Z",
            "estimated_departure_utc": "soon"
        })];

        let result = process_departures(&raw, now(), Melbourne, DEFAULT_LIMIT);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].departure, "11:05 AM");
    }

    #[test]
    fn test_schedule_fallback_is_not_an_estimate() {
        let raw = vec![
            json!({
                "scheduled_departure_utc": "2024-01-01T00:05:00Z",
                "estimated_departure_utc": "soon"
            }),
            scheduled("2024-01-01T00:09:00Z"),
        ];

        let result = process_departures(&raw, now(), Melbourne, DEFAULT_LIMIT);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].estimated_departure_utc.as_deref(), Some("soon"));
        assert!(!result[0].is_estimate());
        assert!(!result[1].is_estimate());
    }

    #[test]
    fn test_entries_without_time_are_dropped() {
        let raw = vec![
            json!({ "run_ref": "1" }),
            json!({ "scheduled_departure_utc": null, "estimated_departure_utc": null }),
            json!({ "scheduled_departure_utc": "garbage" }),
            json!("not an object"),
            scheduled("2024-01-01T00:10:00Z"),
        ];

        let result = process_departures(&raw, now(), Melbourne, DEFAULT_LIMIT);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].extra["run_ref"], "2024-01-01T00:10:00Z");
    }

    #[test]
    fn test_sorted_deduplicated_and_truncated() {
        let raw = vec![
            scheduled("2024-01-01T00:30:00Z"),
            scheduled("2024-01-01T00:05:00Z"),
            scheduled("2024-01-01T00:05:40Z"),
            scheduled("2024-01-01T00:20:00Z"),
            scheduled("2024-01-01T00:10:00Z"),
            scheduled("2024-01-01T00:15:00Z"),
            scheduled("2024-01-01T00:25:00Z"),
            scheduled("2023-12-31T23:59:00Z"),
        ];

        let result = process_departures(&raw, now(), Melbourne, DEFAULT_LIMIT);
        let times: Vec<_> = result.iter().map(|d| d.departure.as_str()).collect();
        assert_eq!(
            times,
            vec!["11:05 AM", "11:10 AM", "11:15 AM", "11:20 AM", "11:25 AM"]
        );
        // first of the 00:05 pair in API order
        assert_eq!(result[0].extra["run_ref"], "2024-01-01T00:05:00Z");
    }

    #[test]
    fn test_departure_exactly_now_is_dropped() {
        let raw = vec![scheduled("2024-01-01T00:00:30Z")];
        assert!(process_departures(&raw, now(), Melbourne, DEFAULT_LIMIT).is_empty());
    }

    #[test]
    fn test_extract_departures() {
        let body = json!({ "departures": [scheduled("2024-01-01T00:10:00Z")], "stops": {} });
        assert_eq!(extract_departures(&body).unwrap().len(), 1);
        assert!(extract_departures(&json!({ "status": {} })).is_err());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn output_is_future_ascending_unique_minutes_and_capped(
                offsets in proptest::collection::vec(-3_600i64..7_200i64, 0..40),
                limit in 0usize..8,
            ) {
                let base = now();
                let raw: Vec<Value> = offsets
                    .iter()
                    .map(|secs| {
                        let ts = (base + chrono::Duration::seconds(*secs))
                            .format("%Y-%m-%dT%H:%M:%SZ")
                            .to_string();
                        scheduled(&ts)
                    })
                    .collect();

                let result = process_departures(&raw, base, Melbourne, limit);

                prop_assert!(result.len() <= limit);
                for d in &result {
                    prop_assert!(d.instant() > base);
                }
                for pair in result.windows(2) {
                    prop_assert!(pair[0].instant() < pair[1].instant());
                    prop_assert_ne!(
                        pair[0].instant().timestamp().div_euclid(60),
                        pair[1].instant().timestamp().div_euclid(60)
                    );
                }
            }
        }
    }
}
