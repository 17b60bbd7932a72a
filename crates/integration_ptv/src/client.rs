//! Signed HTTP client for the PTV timetable API
//!
//! [`PtvApi`] is the seam the connector talks to; [`HttpPtvClient`] is the
//! reqwest implementation that signs each request with the developer key.

use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::config::{ConnectorConfig, PtvConfig};
use crate::error::PtvError;
use crate::models::DisruptionStatus;
use crate::signing::{redact, sign_url};

/// Route types (train, tram, bus, ...)
pub const ROUTE_TYPES_PATH: &str = "/v3/route_types";

/// Routes of one route type
#[must_use]
pub fn routes_path(route_type: &str) -> String {
    format!("/v3/routes?route_types={route_type}")
}

/// Directions of one route
#[must_use]
pub fn directions_path(route: &str) -> String {
    format!("/v3/directions/route/{route}")
}

/// Stops along one route
#[must_use]
pub fn stops_path(route: &str, route_type: &str) -> String {
    format!("/v3/stops/route/{route}/route_type/{route_type}")
}

/// Departures for one route/stop/direction
#[must_use]
pub fn departures_path(
    route_type: &str,
    stop: &str,
    route: &str,
    direction: &str,
    max_results: u8,
) -> String {
    format!(
        "/v3/departures/route_type/{route_type}/stop/{stop}/route/{route}?direction_id={direction}&max_results={max_results}"
    )
}

/// Disruptions for one route, filtered server-side by type and status
#[must_use]
pub fn disruptions_path(route: &str, route_type: &str, status: DisruptionStatus) -> String {
    format!(
        "/v3/disruptions?route_ids={route}&route_types={route_type}&disruption_status={}",
        status.code()
    )
}

/// Trait for PTV API transports
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PtvApi: Send + Sync {
    /// Fetch one request path (with optional query) and return the JSON body
    ///
    /// Only HTTP 200 counts as success.
    async fn get_json(&self, request: &str) -> Result<Value, PtvError>;
}

/// PTV client over reqwest, signing every request
pub struct HttpPtvClient {
    client: Client,
    base_url: String,
    timeout_secs: u64,
    device_id: String,
    api_key: SecretString,
}

impl std::fmt::Debug for HttpPtvClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPtvClient")
            .field("base_url", &self.base_url)
            .field("device_id", &self.device_id)
            .finish_non_exhaustive()
    }
}

impl HttpPtvClient {
    /// Create a new PTV client
    ///
    /// Idle connections are not kept; every request gets a fresh one.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized or the
    /// credentials are missing.
    pub fn new(config: &PtvConfig, connector: &ConnectorConfig) -> Result<Self, PtvError> {
        config.validate()?;
        connector.validate()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(0)
            .user_agent("ptv-departures/0.3")
            .build()
            .map_err(|e| PtvError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            timeout_secs: config.timeout_secs,
            device_id: connector.device_id.clone(),
            api_key: connector.api_key.clone(),
        })
    }

    fn signed(&self, request: &str) -> String {
        sign_url(
            &self.base_url,
            request,
            &self.device_id,
            self.api_key.expose_secret(),
        )
    }
}

#[async_trait]
impl PtvApi for HttpPtvClient {
    #[instrument(skip(self))]
    async fn get_json(&self, request: &str) -> Result<Value, PtvError> {
        let url = self.signed(request);
        debug!(url = redact(&url), "Requesting PTV API");

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                PtvError::Timeout {
                    timeout_secs: self.timeout_secs,
                }
            } else {
                PtvError::ConnectionFailed(e.to_string())
            }
        })?;

        let status = response.status();
        if status != StatusCode::OK {
            warn!(%status, request, "PTV API returned non-200");
            return Err(PtvError::RequestFailed {
                status: status.as_u16(),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| PtvError::ParseError(e.to_string()))
    }
}
