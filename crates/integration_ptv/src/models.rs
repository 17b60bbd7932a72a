//! PTV data models
//!
//! Normalised departures and disruptions as exposed to view adapters, plus the
//! snapshot that bundles the latest of each.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::time::LocalTime;

/// One upcoming service at the configured stop
///
/// Raw API fields are passed through in `extra`; `departure` and
/// `departure_iso` are derived from the estimated (or else scheduled) time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Departure {
    /// Timetabled departure (wire format)
    pub scheduled_departure_utc: Option<String>,
    /// Real-time estimate (wire format), when available
    pub estimated_departure_utc: Option<String>,
    /// Local display string, e.g. `07:45 PM`
    pub departure: String,
    /// Local ISO-8601 string
    pub departure_iso: String,
    /// Every other field the API sent
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    #[serde(skip)]
    pub(crate) instant: DateTime<Utc>,
    #[serde(skip)]
    pub(crate) from_estimate: bool,
}

impl Departure {
    /// The instant this departure was ordered by
    #[must_use]
    pub const fn instant(&self) -> DateTime<Utc> {
        self.instant
    }

    /// Platform number, when the API reports one
    #[must_use]
    pub fn platform_number(&self) -> Option<&str> {
        self.extra.get("platform_number").and_then(Value::as_str)
    }

    /// Whether the time shown is a real-time estimate
    #[must_use]
    pub const fn is_estimate(&self) -> bool {
        self.from_estimate
    }
}

/// Disruption status as used in the `disruption_status` query parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisruptionStatus {
    /// In effect now
    Current,
    /// Announced for the future
    Planned,
}

impl DisruptionStatus {
    /// Numeric code sent to the API (current = 0, planned = 1)
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Current => 0,
            Self::Planned => 1,
        }
    }
}

impl fmt::Display for DisruptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Current => write!(f, "current"),
            Self::Planned => write!(f, "planned"),
        }
    }
}

/// A route referenced by a disruption
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteRef {
    /// Route id (stringified)
    pub route_id: String,
    /// Route type, when the API includes it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_type: Option<String>,
}

impl RouteRef {
    /// Same id, and same type unless this reference carries none
    #[must_use]
    pub fn matches(&self, route_id: &str, route_type: &str) -> bool {
        self.route_id == route_id
            && self
                .route_type
                .as_deref()
                .is_none_or(|kind| kind == route_type)
    }
}

/// A normalised service disruption
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disruption {
    /// Disruption id (stringified)
    pub disruption_id: String,
    /// Headline
    pub title: Option<String>,
    /// Full text
    pub description: Option<String>,
    /// Status as reported by the API (`Current`, `Planned`)
    pub disruption_status: Option<String>,
    /// Start of validity (wire format)
    pub from_date: Option<String>,
    /// End of validity (wire format)
    pub to_date: Option<String>,
    /// Start of validity in the viewer's zone
    pub from_date_local: Option<LocalTime>,
    /// End of validity in the viewer's zone
    pub to_date_local: Option<LocalTime>,
    /// Last modification (wire format)
    pub last_updated: Option<String>,
    /// Link to the public notice
    pub url: Option<String>,
    /// Severity label
    pub severity: Option<String>,
    /// Category / disruption type label
    pub category: Option<String>,
    /// Affected routes
    pub routes: Vec<RouteRef>,
    /// Affected stop ids
    pub stops: Vec<String>,
}

impl Disruption {
    /// Whether any referenced route matches the configured route
    #[must_use]
    pub fn affects_route(&self, route_id: &str, route_type: &str) -> bool {
        self.routes.iter().any(|r| r.matches(route_id, route_type))
    }
}

/// Latest fetched state, handed out as cheap `Arc` clones
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// Upcoming departures, ascending, at most `max_results`
    pub departures: Arc<Vec<Departure>>,
    /// Current disruptions for the configured route
    pub disruptions_current: Arc<Vec<Disruption>>,
    /// Planned disruptions for the configured route
    pub disruptions_planned: Arc<Vec<Disruption>>,
}

impl Snapshot {
    /// Disruptions of one status
    #[must_use]
    pub fn disruptions(&self, status: DisruptionStatus) -> &Arc<Vec<Disruption>> {
        match status {
            DisruptionStatus::Current => &self.disruptions_current,
            DisruptionStatus::Planned => &self.disruptions_planned,
        }
    }
}
