//! Polling options: scan intervals, detail list size, planned disruptions.

use std::time::Duration;

use integration_ptv::PtvError;
use serde::{Deserialize, Serialize};

use super::default_true;

/// How often each category is polled and what the views show
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingOptions {
    /// Minutes between departure refreshes
    #[serde(default = "default_departures_scan_min")]
    pub departures_scan_min: u64,

    /// Minutes between disruption refreshes (current and planned)
    #[serde(default = "default_disruptions_scan_min")]
    pub disruptions_scan_min: u64,

    /// Maximum number of disruption summaries in the detail view
    #[serde(default = "default_details_limit")]
    pub details_limit: usize,

    /// Whether planned disruptions are fetched at all; applied through
    /// `Connector::with_planned`
    #[serde(default = "default_true")]
    pub planned_enabled: bool,
}

const fn default_departures_scan_min() -> u64 {
    10
}

const fn default_disruptions_scan_min() -> u64 {
    15
}

const fn default_details_limit() -> usize {
    5
}

impl Default for PollingOptions {
    fn default() -> Self {
        Self {
            departures_scan_min: default_departures_scan_min(),
            disruptions_scan_min: default_disruptions_scan_min(),
            details_limit: default_details_limit(),
            planned_enabled: true,
        }
    }
}

impl PollingOptions {
    /// Departure poll interval
    #[must_use]
    pub const fn departures_interval(&self) -> Duration {
        Duration::from_secs(self.departures_scan_min * 60)
    }

    /// Disruption poll interval
    #[must_use]
    pub const fn disruptions_interval(&self) -> Duration {
        Duration::from_secs(self.disruptions_scan_min * 60)
    }

    /// Validate the options
    pub fn validate(&self) -> Result<(), PtvError> {
        if self.departures_scan_min == 0 || self.disruptions_scan_min == 0 {
            return Err(PtvError::ConfigurationError(
                "scan intervals must be at least one minute".to_string(),
            ));
        }

        if self.details_limit == 0 {
            return Err(PtvError::ConfigurationError(
                "details_limit must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = PollingOptions::default();
        assert_eq!(options.departures_scan_min, 10);
        assert_eq!(options.disruptions_scan_min, 15);
        assert_eq!(options.details_limit, 5);
        assert!(options.planned_enabled);
        assert_eq!(options.departures_interval(), Duration::from_secs(600));
        assert_eq!(options.disruptions_interval(), Duration::from_secs(900));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let options: PollingOptions =
            serde_json::from_str(r#"{ "planned_enabled": false, "details_limit": 3 }"#).unwrap();
        assert!(!options.planned_enabled);
        assert_eq!(options.details_limit, 3);
        assert_eq!(options.departures_scan_min, 10);
    }

    #[test]
    fn test_validation() {
        assert!(PollingOptions::default().validate().is_ok());

        let zero_scan = PollingOptions {
            departures_scan_min: 0,
            ..PollingOptions::default()
        };
        assert!(zero_scan.validate().is_err());

        let zero_limit = PollingOptions {
            details_limit: 0,
            ..PollingOptions::default()
        };
        assert!(zero_limit.validate().is_err());
    }
}
