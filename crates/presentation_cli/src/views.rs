//! Read-only views over the latest snapshot
//!
//! Each view is a named state string plus attributes, the shape a dashboard
//! entity would show. Views hold no state of their own.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use integration_ptv::{ConnectorConfig, Departure, Disruption, DisruptionStatus, summary};
use serde::Serialize;
use serde_json::{Map, Value};

/// Data licence notice shown with every view
pub const ATTRIBUTION: &str = "Licensed from Public Transport Victoria under a Creative Commons Attribution 4.0 International Licence";

/// Number of departure slots shown
pub const DEPARTURE_SLOTS: usize = 5;

const NO_DATA: &str = "No data";
const NO_DISRUPTIONS: &str = "No disruptions";

/// One displayable entity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct View {
    /// Display name
    pub name: String,
    /// Stable identifier
    pub unique_id: String,
    /// Primary state
    pub state: String,
    /// Extra attributes
    pub attributes: Map<String, Value>,
}

fn label<'a>(name: Option<&'a str>, id: Option<&'a str>) -> &'a str {
    name.or(id).unwrap_or("Unknown")
}

fn line(config: &ConnectorConfig) -> &str {
    label(config.route_name.as_deref(), config.route.as_deref())
}

fn attribution() -> Map<String, Value> {
    let mut attributes = Map::new();
    attributes.insert("attribution".to_string(), Value::from(ATTRIBUTION));
    attributes
}

const fn status_label(status: DisruptionStatus) -> &'static str {
    match status {
        DisruptionStatus::Current => "current",
        DisruptionStatus::Planned => "planned",
    }
}

/// Departure slot `slot` (zero-based); `No data` when the slot is empty
#[must_use]
pub fn departure_view(config: &ConnectorConfig, departures: &[Departure], slot: usize) -> View {
    let name = format!(
        "{} line to {} from {} {slot}",
        line(config),
        label(config.direction_name.as_deref(), config.direction.as_deref()),
        label(config.stop_name.as_deref(), config.stop.as_deref()),
    );

    let (state, attributes) = match departures.get(slot) {
        Some(departure) => {
            let mut attributes = match serde_json::to_value(departure) {
                Ok(Value::Object(map)) => map,
                _ => Map::new(),
            };
            attributes.insert("attribution".to_string(), Value::from(ATTRIBUTION));
            (departure.departure.clone(), attributes)
        },
        None => (NO_DATA.to_string(), Map::new()),
    };

    View {
        unique_id: name.clone(),
        name,
        state,
        attributes,
    }
}

/// Number of disruptions of one status
#[must_use]
pub fn disruption_count_view(
    config: &ConnectorConfig,
    disruptions: &[Disruption],
    status: DisruptionStatus,
) -> View {
    let label = status_label(status);
    View {
        name: format!("{} line {label} disruptions", line(config)),
        unique_id: format!("{} line {label} disruptions count", line(config)),
        state: disruptions.len().to_string(),
        attributes: attribution(),
    }
}

/// First disruption title plus up to `details_limit` records and summaries
#[must_use]
pub fn disruption_detail_view(
    config: &ConnectorConfig,
    disruptions: &[Disruption],
    status: DisruptionStatus,
    details_limit: usize,
    now: DateTime<Utc>,
    tz: Tz,
) -> View {
    let label = status_label(status);
    let state = disruptions.first().map_or_else(
        || NO_DISRUPTIONS.to_string(),
        |first| {
            first
                .title
                .clone()
                .unwrap_or_else(|| "Disruption".to_string())
        },
    );

    let shown = &disruptions[..disruptions.len().min(details_limit)];
    let mut attributes = attribution();
    attributes.insert(
        "disruptions".to_string(),
        serde_json::to_value(shown).unwrap_or_else(|_| Value::Array(Vec::new())),
    );
    attributes.insert(
        "summaries".to_string(),
        shown
            .iter()
            .map(|d| Value::from(summary(d, now, tz)))
            .collect(),
    );

    View {
        name: format!("{} line {label} disruption details", line(config)),
        unique_id: format!("{} line {label} disruptions detail", line(config)),
        state,
        attributes,
    }
}

/// `on` while any current disruption is published
#[must_use]
pub fn disruption_active_view(config: &ConnectorConfig, current: &[Disruption]) -> View {
    View {
        name: format!("{} line current disruption active", line(config)),
        unique_id: format!(
            "{}-current-disruptions-binary",
            config.route.as_deref().unwrap_or("unknown")
        ),
        state: if current.is_empty() { "off" } else { "on" }.to_string(),
        attributes: attribution(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Australia::Melbourne;
    use integration_ptv::{normalise_disruption, process_departures};
    use serde_json::json;

    fn config() -> ConnectorConfig {
        let mut config =
            ConnectorConfig::new("1000001", "abcdef").with_selection("0", "6", "1", "1071");
        config.route_name = Some("Frankston".to_string());
        config.direction_name = Some("City".to_string());
        config.stop_name = Some("Richmond".to_string());
        config
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn departures() -> Vec<Departure> {
        process_departures(
            &[json!({ "scheduled_departure_utc": "2024-01-01T00:10:00Z", "platform_number": "3" })],
            now(),
            Melbourne,
            5,
        )
    }

    fn disruption(id: u64, title: Option<&str>) -> Disruption {
        normalise_disruption(
            &json!({
                "disruption_id": id,
                "title": title,
                "from_date": "2023-12-31T00:00:00Z",
                "routes": [6]
            }),
            Melbourne,
        )
        .unwrap()
    }

    #[test]
    fn test_departure_slot_with_data() {
        let view = departure_view(&config(), &departures(), 0);
        assert_eq!(view.name, "Frankston line to City from Richmond 0");
        assert_eq!(view.state, "11:10 AM");
        assert_eq!(view.attributes["platform_number"], json!("3"));
        assert_eq!(view.attributes["attribution"], json!(ATTRIBUTION));
        assert!(view.attributes.contains_key("departure_iso"));
    }

    #[test]
    fn test_empty_departure_slot() {
        let view = departure_view(&config(), &departures(), 4);
        assert_eq!(view.state, "No data");
        assert!(view.attributes.is_empty());
    }

    #[test]
    fn test_names_fall_back_to_ids() {
        let config =
            ConnectorConfig::new("1000001", "abcdef").with_selection("0", "6", "1", "1071");
        let view = departure_view(&config, &[], 1);
        assert_eq!(view.name, "6 line to 1 from 1071 1");
    }

    #[test]
    fn test_count_view() {
        let view = disruption_count_view(
            &config(),
            &[disruption(1, Some("A")), disruption(2, None)],
            DisruptionStatus::Planned,
        );
        assert_eq!(view.state, "2");
        assert_eq!(view.name, "Frankston line planned disruptions");
        assert_eq!(view.attributes["attribution"], json!(ATTRIBUTION));
    }

    #[test]
    fn test_detail_view_states() {
        let empty =
            disruption_detail_view(&config(), &[], DisruptionStatus::Current, 5, now(), Melbourne);
        assert_eq!(empty.state, "No disruptions");

        let untitled = disruption_detail_view(
            &config(),
            &[disruption(1, None)],
            DisruptionStatus::Current,
            5,
            now(),
            Melbourne,
        );
        assert_eq!(untitled.state, "Disruption");

        let titled = disruption_detail_view(
            &config(),
            &[disruption(1, Some("Works")), disruption(2, Some("Delays"))],
            DisruptionStatus::Current,
            5,
            now(),
            Melbourne,
        );
        assert_eq!(titled.state, "Works");
    }

    #[test]
    fn test_detail_view_respects_limit() {
        let all: Vec<Disruption> = (1..=4).map(|id| disruption(id, Some("Works"))).collect();
        let view =
            disruption_detail_view(&config(), &all, DisruptionStatus::Current, 2, now(), Melbourne);

        assert_eq!(view.attributes["disruptions"].as_array().unwrap().len(), 2);
        let summaries = view.attributes["summaries"].as_array().unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0], json!("Works (until further notice)"));
    }

    #[test]
    fn test_active_view() {
        assert_eq!(disruption_active_view(&config(), &[]).state, "off");
        let view = disruption_active_view(&config(), &[disruption(1, None)]);
        assert_eq!(view.state, "on");
        assert_eq!(view.unique_id, "6-current-disruptions-binary");
    }
}
