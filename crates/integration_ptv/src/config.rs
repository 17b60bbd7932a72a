//! PTV client and connector configuration

use std::fmt;

use chrono_tz::Tz;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::PtvError;

/// Client settings for the PTV timetable API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PtvConfig {
    /// Base URL for the PTV timetable API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Number of departures requested and kept per refresh
    #[serde(default = "default_max_results")]
    pub max_results: u8,

    /// IANA zone used for local display strings
    #[serde(default = "default_time_zone")]
    pub time_zone: String,

    /// Minimum seconds between two departure fetches
    #[serde(default = "default_min_interval_secs")]
    pub departures_min_interval_secs: u64,

    /// Minimum seconds between two disruption fetches (per status)
    #[serde(default = "default_min_interval_secs")]
    pub disruptions_min_interval_secs: u64,
}

fn default_base_url() -> String {
    "https://timetableapi.ptv.vic.gov.au".to_string()
}

const fn default_timeout_secs() -> u64 {
    10
}

const fn default_max_results() -> u8 {
    5
}

fn default_time_zone() -> String {
    "Australia/Melbourne".to_string()
}

const fn default_min_interval_secs() -> u64 {
    120
}

impl Default for PtvConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            max_results: default_max_results(),
            time_zone: default_time_zone(),
            departures_min_interval_secs: default_min_interval_secs(),
            disruptions_min_interval_secs: default_min_interval_secs(),
        }
    }
}

impl PtvConfig {
    /// Create a configuration suitable for testing (no throttling)
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            timeout_secs: 5,
            departures_min_interval_secs: 0,
            disruptions_min_interval_secs: 0,
            ..Default::default()
        }
    }

    /// Resolve the configured display zone
    pub fn tz(&self) -> Result<Tz, PtvError> {
        self.time_zone
            .parse::<Tz>()
            .map_err(|e| PtvError::ConfigurationError(format!("time_zone: {e}")))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), PtvError> {
        if self.base_url.is_empty() {
            return Err(PtvError::ConfigurationError(
                "base_url must not be empty".to_string(),
            ));
        }

        if self.timeout_secs == 0 {
            return Err(PtvError::ConfigurationError(
                "timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.max_results == 0 {
            return Err(PtvError::ConfigurationError(
                "max_results must be greater than 0".to_string(),
            ));
        }

        self.tz().map(|_| ())
    }
}

/// Identity and selectors for one monitored route/stop/direction
///
/// Built once from the host's entry data. `route_type` and `route` are
/// updated by the discovery calls while a setup flow walks the user
/// through the selection.
#[derive(Clone, Deserialize)]
pub struct ConnectorConfig {
    /// Developer id issued by PTV
    pub device_id: String,

    /// Signing key issued by PTV
    pub api_key: SecretString,

    /// Route type (train, tram, bus, ...)
    #[serde(default)]
    pub route_type: Option<String>,

    /// Route id
    #[serde(default)]
    pub route: Option<String>,

    /// Direction id
    #[serde(default)]
    pub direction: Option<String>,

    /// Stop id
    #[serde(default)]
    pub stop: Option<String>,

    /// Display name of the route type
    #[serde(default)]
    pub route_type_name: Option<String>,

    /// Display name of the route
    #[serde(default)]
    pub route_name: Option<String>,

    /// Display name of the direction
    #[serde(default)]
    pub direction_name: Option<String>,

    /// Display name of the stop
    #[serde(default)]
    pub stop_name: Option<String>,
}

impl fmt::Debug for ConnectorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorConfig")
            .field("device_id", &self.device_id)
            .field("api_key", &"[REDACTED]")
            .field("route_type", &self.route_type)
            .field("route", &self.route)
            .field("direction", &self.direction)
            .field("stop", &self.stop)
            .field("route_name", &self.route_name)
            .field("direction_name", &self.direction_name)
            .field("stop_name", &self.stop_name)
            .finish_non_exhaustive()
    }
}

impl ConnectorConfig {
    /// Credentials only; selectors are filled in by discovery
    #[must_use]
    pub fn new(device_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            api_key: SecretString::from(api_key.into()),
            route_type: None,
            route: None,
            direction: None,
            stop: None,
            route_type_name: None,
            route_name: None,
            direction_name: None,
            stop_name: None,
        }
    }

    /// Set all four selectors at once
    #[must_use]
    pub fn with_selection(
        mut self,
        route_type: impl Into<String>,
        route: impl Into<String>,
        direction: impl Into<String>,
        stop: impl Into<String>,
    ) -> Self {
        self.route_type = Some(route_type.into());
        self.route = Some(route.into());
        self.direction = Some(direction.into());
        self.stop = Some(stop.into());
        self
    }

    /// The signing key bytes
    #[must_use]
    pub fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }

    /// Check that credentials are present
    pub fn validate(&self) -> Result<(), PtvError> {
        if self.device_id.trim().is_empty() {
            return Err(PtvError::ConfigurationError(
                "device_id must not be empty".to_string(),
            ));
        }

        if self.api_key().trim().is_empty() {
            return Err(PtvError::ConfigurationError(
                "api_key must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Selectors required for a departures request
    pub(crate) fn departure_selection(&self) -> Result<(&str, &str, &str, &str), PtvError> {
        Ok((
            required(self.route_type.as_deref(), "route_type")?,
            required(self.stop.as_deref(), "stop")?,
            required(self.route.as_deref(), "route")?,
            required(self.direction.as_deref(), "direction")?,
        ))
    }

    /// Selectors required for a disruptions request
    pub(crate) fn route_selection(&self) -> Result<(&str, &str), PtvError> {
        Ok((
            required(self.route.as_deref(), "route")?,
            required(self.route_type.as_deref(), "route_type")?,
        ))
    }
}

fn required<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str, PtvError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| PtvError::ConfigurationError(format!("{name} is not selected")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PtvConfig::default();
        assert_eq!(config.base_url, "https://timetableapi.ptv.vic.gov.au");
        assert_eq!(config.timeout_secs, 10);
        assert_eq!(config.max_results, 5);
        assert_eq!(config.time_zone, "Australia/Melbourne");
        assert_eq!(config.departures_min_interval_secs, 120);
        assert_eq!(config.disruptions_min_interval_secs, 120);
    }

    #[test]
    fn test_testing_config() {
        let config = PtvConfig::for_testing();
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.departures_min_interval_secs, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_bad_zone() {
        let config = PtvConfig {
            time_zone: "Mars/Olympus_Mons".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_empty_base_url() {
        let config = PtvConfig {
            base_url: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_zero_max_results() {
        let config = PtvConfig {
            max_results: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_connector_config_debug_redacts_key() {
        let config = ConnectorConfig::new("1000001", "super-secret");
        let debug = format!("{config:?}");
        assert!(debug.contains("1000001"));
        assert!(!debug.contains("super-secret"));
    }

    #[test]
    fn test_connector_config_validation() {
        assert!(ConnectorConfig::new("1000001", "abcdef").validate().is_ok());
        assert!(ConnectorConfig::new("", "abcdef").validate().is_err());
        assert!(ConnectorConfig::new("1000001", " ").validate().is_err());
    }

    #[test]
    fn test_departure_selection_requires_all_selectors() {
        let partial = ConnectorConfig::new("1", "k");
        assert!(partial.departure_selection().is_err());

        let full = partial.with_selection("0", "2", "1", "1071");
        assert_eq!(
            full.departure_selection().unwrap(),
            ("0", "1071", "2", "1")
        );
        assert_eq!(full.route_selection().unwrap(), ("2", "0"));
    }

    #[test]
    fn test_connector_config_from_json() {
        let json = r#"{
            "device_id": "1000001",
            "api_key": "abcdef",
            "route_type": "0",
            "route": "6",
            "route_name": "Frankston"
        }"#;
        let config: ConnectorConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.api_key(), "abcdef");
        assert_eq!(config.route.as_deref(), Some("6"));
        assert_eq!(config.route_name.as_deref(), Some("Frankston"));
        assert!(config.stop.is_none());
    }
}
