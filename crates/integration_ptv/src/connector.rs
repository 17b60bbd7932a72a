//! Connector: configuration, discovery and the latest snapshot
//!
//! The connector owns one route/stop/direction selection and the snapshot
//! derived from it. Each refresh category is throttled on its own and
//! replaces its snapshot field wholesale; readers only ever see complete
//! vectors.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::Utc;
use chrono_tz::Tz;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::client::{
    HttpPtvClient, PtvApi, ROUTE_TYPES_PATH, departures_path, directions_path, disruptions_path,
    routes_path, stops_path,
};
use crate::config::{ConnectorConfig, PtvConfig};
use crate::departures::{extract_departures, process_departures};
use crate::disruptions::{process_disruptions, scalar_id};
use crate::error::PtvError;
use crate::models::{Departure, Disruption, DisruptionStatus, Snapshot};
use crate::throttle::{Refresh, Throttle};

/// Id to display name, as offered during setup
pub type Choices = BTreeMap<String, String>;

/// Owner of one selection and its snapshot
pub struct Connector<C: PtvApi> {
    api: C,
    config: RwLock<ConnectorConfig>,
    tz: Tz,
    max_results: u8,
    track_planned: bool,
    departures: ArcSwap<Vec<Departure>>,
    disruptions_current: ArcSwap<Vec<Disruption>>,
    disruptions_planned: ArcSwap<Vec<Disruption>>,
    departures_throttle: Throttle,
    current_throttle: Throttle,
    planned_throttle: Throttle,
}

impl<C: PtvApi> std::fmt::Debug for Connector<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connector")
            .field("config", &*self.config.read())
            .field("tz", &self.tz)
            .field("departures", &self.departures.load().len())
            .field("disruptions_current", &self.disruptions_current.load().len())
            .field("disruptions_planned", &self.disruptions_planned.load().len())
            .finish_non_exhaustive()
    }
}

impl Connector<HttpPtvClient> {
    /// Connector backed by the signed reqwest client
    pub fn connect(ptv: &PtvConfig, connector: ConnectorConfig) -> Result<Self, PtvError> {
        let api = HttpPtvClient::new(ptv, &connector)?;
        Self::new(api, ptv, connector)
    }
}

impl<C: PtvApi> Connector<C> {
    /// Create a connector over any transport
    pub fn new(api: C, ptv: &PtvConfig, connector: ConnectorConfig) -> Result<Self, PtvError> {
        ptv.validate()?;
        connector.validate()?;

        let departures_interval = Duration::from_secs(ptv.departures_min_interval_secs);
        let disruptions_interval = Duration::from_secs(ptv.disruptions_min_interval_secs);

        Ok(Self {
            api,
            config: RwLock::new(connector),
            tz: ptv.tz()?,
            max_results: ptv.max_results,
            track_planned: true,
            departures: ArcSwap::from_pointee(Vec::new()),
            disruptions_current: ArcSwap::from_pointee(Vec::new()),
            disruptions_planned: ArcSwap::from_pointee(Vec::new()),
            departures_throttle: Throttle::new(departures_interval),
            current_throttle: Throttle::new(disruptions_interval),
            planned_throttle: Throttle::new(disruptions_interval),
        })
    }

    /// Whether [`Connector::refresh_all`] also fetches planned disruptions
    #[must_use]
    pub fn with_planned(mut self, track_planned: bool) -> Self {
        self.track_planned = track_planned;
        self
    }

    /// Copy of the current selection
    #[must_use]
    pub fn config(&self) -> ConnectorConfig {
        self.config.read().clone()
    }

    /// Zone used for display strings
    #[must_use]
    pub const fn time_zone(&self) -> Tz {
        self.tz
    }

    /// Whether planned disruptions are tracked
    #[must_use]
    pub const fn tracks_planned(&self) -> bool {
        self.track_planned
    }

    // --- Discovery ---

    /// All route types
    #[instrument(skip(self))]
    pub async fn list_route_types(&self) -> Result<Choices, PtvError> {
        self.discover(
            "route types",
            ROUTE_TYPES_PATH,
            "route_types",
            "route_type",
            "route_type_name",
        )
        .await
    }

    /// Routes of `route_type`; remembers the route type
    #[instrument(skip(self))]
    pub async fn list_routes(&self, route_type: &str) -> Result<Choices, PtvError> {
        let routes = self
            .discover("routes", &routes_path(route_type), "routes", "route_id", "route_name")
            .await?;
        self.config.write().route_type = Some(route_type.to_string());
        Ok(routes)
    }

    /// Directions of `route`; remembers the route
    #[instrument(skip(self))]
    pub async fn list_directions(&self, route: &str) -> Result<Choices, PtvError> {
        let directions = self
            .discover(
                "directions",
                &directions_path(route),
                "directions",
                "direction_id",
                "direction_name",
            )
            .await?;
        self.config.write().route = Some(route.to_string());
        Ok(directions)
    }

    /// Stops along `route` for the remembered route type; remembers the route
    #[instrument(skip(self))]
    pub async fn list_stops(&self, route: &str) -> Result<Choices, PtvError> {
        let route_type = self
            .config
            .read()
            .route_type
            .clone()
            .ok_or_else(|| PtvError::DiscoveryFailed {
                what: "stops",
                reason: "route type not selected".to_string(),
            })?;

        let stops = self
            .discover("stops", &stops_path(route, &route_type), "stops", "stop_id", "stop_name")
            .await?;
        self.config.write().route = Some(route.to_string());
        Ok(stops)
    }

    async fn discover(
        &self,
        what: &'static str,
        request: &str,
        list_key: &str,
        id_key: &str,
        name_key: &str,
    ) -> Result<Choices, PtvError> {
        let body = self
            .api
            .get_json(request)
            .await
            .map_err(|e| PtvError::DiscoveryFailed {
                what,
                reason: e.to_string(),
            })?;

        let entries = body
            .get(list_key)
            .and_then(Value::as_array)
            .ok_or_else(|| PtvError::DiscoveryFailed {
                what,
                reason: format!("response has no {list_key} array"),
            })?;

        let choices: Choices = entries
            .iter()
            .filter_map(|entry| {
                let id = entry.get(id_key).and_then(scalar_id)?;
                let name = entry.get(name_key).and_then(Value::as_str)?;
                Some((id, name.to_string()))
            })
            .collect();

        debug!(what, count = choices.len(), "Discovery complete");
        Ok(choices)
    }

    // --- Refresh ---

    /// Fetch and shape departures, unless throttled
    ///
    /// Throttled or concurrent calls return the cached list without a
    /// request. Every request, failed or not, starts the minimum interval;
    /// on error the cached list is left as it was.
    #[instrument(skip(self))]
    pub async fn refresh_departures(&self) -> Result<Refresh<Arc<Vec<Departure>>>, PtvError> {
        let request = {
            let config = self.config.read();
            let (route_type, stop, route, direction) = config.departure_selection()?;
            departures_path(route_type, stop, route, direction, self.max_results)
        };

        let Some(_pass) = self.departures_throttle.try_pass() else {
            debug!(
                min_interval_secs = self.departures_throttle.min_interval().as_secs(),
                "Departures refresh throttled"
            );
            return Ok(Refresh::Cached(self.departures.load_full()));
        };

        let body = self.api.get_json(&request).await?;
        let now = Utc::now();
        let departures = Arc::new(process_departures(
            extract_departures(&body)?,
            now,
            self.tz,
            usize::from(self.max_results),
        ));

        self.departures.store(Arc::clone(&departures));

        info!(count = departures.len(), "Departures refreshed");
        Ok(Refresh::Fetched(departures))
    }

    /// Fetch and filter disruptions of one status, unless throttled
    #[instrument(skip(self))]
    pub async fn refresh_disruptions(
        &self,
        status: DisruptionStatus,
    ) -> Result<Refresh<Arc<Vec<Disruption>>>, PtvError> {
        let (route, route_type) = {
            let config = self.config.read();
            let (route, route_type) = config.route_selection()?;
            (route.to_string(), route_type.to_string())
        };

        let (throttle, slot) = self.disruption_slot(status);
        let Some(_pass) = throttle.try_pass() else {
            debug!(
                %status,
                min_interval_secs = throttle.min_interval().as_secs(),
                "Disruptions refresh throttled"
            );
            return Ok(Refresh::Cached(slot.load_full()));
        };

        let body = self
            .api
            .get_json(&disruptions_path(&route, &route_type, status))
            .await?;
        let disruptions = Arc::new(process_disruptions(&body, &route, &route_type, self.tz));

        slot.store(Arc::clone(&disruptions));

        info!(%status, count = disruptions.len(), "Disruptions refreshed");
        Ok(Refresh::Fetched(disruptions))
    }

    /// Refresh every category and report the first error, if any
    ///
    /// The snapshot counts as fetched when at least one category was.
    #[instrument(skip(self))]
    pub async fn refresh_all(&self) -> Result<Refresh<Snapshot>, PtvError> {
        let mut fetched = false;
        let mut first_error = None;

        match self.refresh_departures().await {
            Ok(refresh) => fetched |= refresh.is_fetched(),
            Err(e) => first_error = Some(e),
        }

        let mut statuses = vec![DisruptionStatus::Current];
        if self.track_planned {
            statuses.push(DisruptionStatus::Planned);
        }
        for status in statuses {
            match self.refresh_disruptions(status).await {
                Ok(refresh) => fetched |= refresh.is_fetched(),
                Err(e) => first_error = first_error.or(Some(e)),
            }
        }

        match first_error {
            Some(e) => Err(e),
            None if fetched => Ok(Refresh::Fetched(self.snapshot())),
            None => Ok(Refresh::Cached(self.snapshot())),
        }
    }

    // --- Reads ---

    /// Latest snapshot; each field is an immutable, shared vector
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            departures: self.departures.load_full(),
            disruptions_current: self.disruptions_current.load_full(),
            disruptions_planned: self.disruptions_planned.load_full(),
        }
    }

    /// Latest departures
    #[must_use]
    pub fn departures(&self) -> Arc<Vec<Departure>> {
        self.departures.load_full()
    }

    /// Latest disruptions of one status
    #[must_use]
    pub fn disruptions(&self, status: DisruptionStatus) -> Arc<Vec<Disruption>> {
        self.disruption_slot(status).1.load_full()
    }

    fn disruption_slot(&self, status: DisruptionStatus) -> (&Throttle, &ArcSwap<Vec<Disruption>>) {
        match status {
            DisruptionStatus::Current => (&self.current_throttle, &self.disruptions_current),
            DisruptionStatus::Planned => (&self.planned_throttle, &self.disruptions_planned),
        }
    }
}
