//! Public Transport Victoria timetable API integration
//!
//! Polls the [PTV Timetable API v3](https://timetableapi.ptv.vic.gov.au) for the
//! next departures of one route/stop/direction and for the disruptions affecting
//! that route. Every request is signed with the developer id and key.
//!
//! # Architecture
//!
//! [`PtvApi`] is the transport seam, implemented by [`HttpPtvClient`].
//! [`Connector`] owns the selected route, stop and direction, offers the
//! setup-time discovery lists and keeps the latest [`Snapshot`]. Each refresh
//! category is rate-limited on its own and replaces its part of the snapshot
//! atomically, so readers never observe a half-updated list.
//!
//! # Example
//!
//! ```rust,ignore
//! use integration_ptv::{Connector, ConnectorConfig, PtvConfig};
//!
//! let selection = ConnectorConfig::new("1000001", "secret-key")
//!     .with_selection("0", "6", "1", "1071");
//! let connector = Connector::connect(&PtvConfig::default(), selection)?;
//!
//! let departures = connector.refresh_departures().await?.into_inner();
//! for departure in departures.iter() {
//!     println!("{}", departure.departure);
//! }
//! ```

mod client;
mod config;
mod connector;
mod departures;
mod disruptions;
mod error;
mod models;
mod signing;
mod throttle;
mod time;

pub use client::{
    HttpPtvClient, PtvApi, ROUTE_TYPES_PATH, departures_path, directions_path, disruptions_path,
    routes_path, stops_path,
};
pub use config::{ConnectorConfig, PtvConfig};
pub use connector::{Choices, Connector};
pub use departures::{DEFAULT_LIMIT, extract_departures, process_departures};
pub use disruptions::{
    extract_raw as extract_disruptions, normalise as normalise_disruption, process_disruptions,
    relative_period, simplified_title, summary,
};
pub use error::PtvError;
pub use models::{Departure, Disruption, DisruptionStatus, RouteRef, Snapshot};
pub use signing::{redact, sign_url, signature};
pub use throttle::{Pass, Refresh, Throttle};
pub use time::{LocalTime, WIRE_FORMAT, parse_utc, to_local};
