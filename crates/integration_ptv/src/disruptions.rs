//! Disruption normalisation, route filtering and one-line summaries
//!
//! The disruptions endpoint answers either with a flat list or with a map of
//! category name to list (`general`, `metro_train`, ...). Both are flattened,
//! each entry is normalised on its own, and only entries touching the
//! configured route survive.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Duration, Utc};
use chrono_tz::Tz;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::PtvError;
use crate::models::{Disruption, RouteRef};
use crate::time::{parse_utc, to_local};

/// Every raw disruption in the response, in response order
#[must_use]
pub fn extract_raw(body: &Value) -> Vec<&Value> {
    match body.get("disruptions") {
        Some(Value::Array(list)) => list.iter().collect(),
        Some(Value::Object(categories)) => categories
            .values()
            .filter_map(Value::as_array)
            .flatten()
            .collect(),
        _ => Vec::new(),
    }
}

/// Normalise one raw disruption
pub fn normalise(value: &Value, tz: Tz) -> Result<Disruption, PtvError> {
    let Value::Object(obj) = value else {
        return Err(PtvError::InvalidRecord(
            "disruption is not an object".to_string(),
        ));
    };

    let disruption_id = text(obj, &["disruption_id"])?
        .ok_or_else(|| PtvError::InvalidRecord("disruption has no id".to_string()))?;

    let from_date = text(obj, &["from_date", "from_time"])?;
    let to_date = text(obj, &["to_date", "to_time"])?;

    Ok(Disruption {
        title: text(obj, &["title"])?,
        description: text(obj, &["description"])?,
        disruption_status: text(obj, &["disruption_status"])?,
        from_date_local: from_date.as_deref().map(|ts| to_local(ts, tz)),
        to_date_local: to_date.as_deref().map(|ts| to_local(ts, tz)),
        from_date,
        to_date,
        last_updated: text(obj, &["last_updated"])?,
        url: text(obj, &["url", "url_web"])?,
        severity: text(obj, &["severity", "severity_level"])?,
        category: text(obj, &["category", "disruption_type"])?,
        routes: route_refs(obj.get("routes")),
        stops: stop_ids(obj.get("stops")),
        disruption_id,
    })
}

/// Flatten, normalise and keep the disruptions that touch `route_id`
///
/// A malformed entry is logged and skipped; the rest of the batch goes on.
#[must_use]
pub fn process_disruptions(
    body: &Value,
    route_id: &str,
    route_type: &str,
    tz: Tz,
) -> Vec<Disruption> {
    let raw = extract_raw(body);
    let total = raw.len();

    let kept: Vec<Disruption> = raw
        .into_iter()
        .filter_map(|value| match normalise(value, tz) {
            Ok(disruption) => Some(disruption),
            Err(e) => {
                debug!(error = %e, "Skipping disruption");
                None
            },
        })
        .filter(|d| d.affects_route(route_id, route_type))
        .collect();

    debug!(total, kept = kept.len(), route_id, route_type, "Disruptions filtered");
    kept
}

/// First non-empty scalar among `keys`, stringified
fn text(obj: &Map<String, Value>, keys: &[&str]) -> Result<Option<String>, PtvError> {
    for key in keys {
        match obj.get(*key) {
            None | Some(Value::Null) => {},
            Some(Value::String(s)) if s.is_empty() => {},
            Some(Value::String(s)) => return Ok(Some(s.clone())),
            Some(v @ (Value::Number(_) | Value::Bool(_))) => return Ok(Some(v.to_string())),
            Some(_) => {
                return Err(PtvError::InvalidRecord(format!(
                    "field {key} is not a scalar"
                )));
            },
        }
    }
    Ok(None)
}

pub(crate) fn scalar_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn route_refs(value: Option<&Value>) -> Vec<RouteRef> {
    let Some(Value::Array(routes)) = value else {
        return Vec::new();
    };

    routes
        .iter()
        .filter_map(|route| match route {
            Value::Object(obj) => Some(RouteRef {
                route_id: obj.get("route_id").and_then(scalar_id)?,
                route_type: obj.get("route_type").and_then(scalar_id),
            }),
            other => scalar_id(other).map(|route_id| RouteRef {
                route_id,
                route_type: None,
            }),
        })
        .collect()
}

fn stop_ids(value: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(stops)) = value else {
        return Vec::new();
    };

    stops
        .iter()
        .filter_map(|stop| match stop {
            Value::Object(obj) => obj.get("stop_id").and_then(scalar_id),
            other => scalar_id(other),
        })
        .collect()
}

// --- Summaries ---

static DATE_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)] // Infallible with a valid static pattern
    Regex::new(r"(?i)[\s,:;(\-–]*\bfrom\b[^.;)]*?\b(?:to|until|till)\b[^.;)]*\)?")
        .expect("Failed to compile date range pattern")
});

/// Title with any spelled-out `from … to/until …` range removed
///
/// Best effort: a title that only mentions places (`from A to B`) loses that
/// part too. Falls back to the trimmed title when nothing would remain.
#[must_use]
pub fn simplified_title(title: &str) -> String {
    let stripped = DATE_RANGE.replace_all(title, "");
    let cleaned = stripped
        .trim()
        .trim_end_matches([',', ':', ';', '-', '–'])
        .trim();

    if cleaned.is_empty() {
        title.trim().to_string()
    } else {
        cleaned.to_string()
    }
}

/// Validity window relative to `now`, e.g. `from tomorrow 08:30 PM until Sunday`
#[must_use]
pub fn relative_period(
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    tz: Tz,
) -> Option<String> {
    match (from, to) {
        (None, None) => None,
        (Some(start), end) if start > now => Some(match end {
            Some(end) => format!(
                "from {} until {}",
                describe_day(start, now, tz),
                describe_day(end, now, tz)
            ),
            None => format!("from {}", describe_day(start, now, tz)),
        }),
        (_, Some(end)) if end > now => Some(format!("until {}", describe_day(end, now, tz))),
        (_, Some(end)) => Some(format!("ended {}", describe_day(end, now, tz))),
        (_, None) => Some("until further notice".to_string()),
    }
}

/// `Title (period)` for a detail view line
#[must_use]
pub fn summary(disruption: &Disruption, now: DateTime<Utc>, tz: Tz) -> String {
    let title = disruption
        .title
        .as_deref()
        .map_or_else(|| "Disruption".to_string(), simplified_title);

    let period = relative_period(
        disruption.from_date.as_deref().and_then(parse_utc),
        disruption.to_date.as_deref().and_then(parse_utc),
        now,
        tz,
    );

    match period {
        Some(period) => format!("{title} ({period})"),
        None => title,
    }
}

fn describe_day(instant: DateTime<Utc>, now: DateTime<Utc>, tz: Tz) -> String {
    let local = instant.with_timezone(&tz);
    let today = now.with_timezone(&tz).date_naive();
    let day = local.date_naive();
    let time = local.format("%I:%M %p");

    if day == today {
        format!("today {time}")
    } else if day == today + Duration::days(1) {
        format!("tomorrow {time}")
    } else if day == today - Duration::days(1) {
        format!("yesterday {time}")
    } else if day > today && day < today + Duration::days(7) {
        local.format("%A").to_string()
    } else if day.year() == today.year() {
        local.format("%a %-d %b").to_string()
    } else {
        local.format("%a %-d %b %Y").to_string()
    }
}
