//! Infrastructure layer - polling, configuration and tracing
//!
//! Runs the PTV connector refreshes on fixed intervals, loads the
//! application configuration and installs the tracing subscriber.

pub mod config;
pub mod coordinator;
pub mod telemetry;

pub use config::{AppConfig, ENV_PREFIX, PollingOptions, TelemetryAppConfig};
pub use coordinator::{
    CoordinatorError, CoordinatorState, CoordinatorStats, PollingCoordinator, PtvCoordinators,
    combined_coordinator, departures_coordinator, disruptions_coordinator,
};
pub use telemetry::{TelemetryError, init_tracing};
