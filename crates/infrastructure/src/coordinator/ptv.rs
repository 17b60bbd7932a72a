//! Coordinators wired to a PTV connector

use std::{sync::Arc, time::Duration};

use integration_ptv::{
    Connector, Departure, Disruption, DisruptionStatus, PtvApi, Snapshot,
};
use tracing::info;

use super::{CoordinatorError, CoordinatorStats, PollingCoordinator};
use crate::config::PollingOptions;

/// Polls departures
pub fn departures_coordinator<C: PtvApi + 'static>(
    connector: Arc<Connector<C>>,
    interval: Duration,
) -> Result<PollingCoordinator<Arc<Vec<Departure>>>, CoordinatorError> {
    PollingCoordinator::new("departures", interval, move || {
        let connector = Arc::clone(&connector);
        async move { connector.refresh_departures().await }
    })
}

/// Polls disruptions of one status
pub fn disruptions_coordinator<C: PtvApi + 'static>(
    connector: Arc<Connector<C>>,
    status: DisruptionStatus,
    interval: Duration,
) -> Result<PollingCoordinator<Arc<Vec<Disruption>>>, CoordinatorError> {
    PollingCoordinator::new(format!("disruptions_{status}"), interval, move || {
        let connector = Arc::clone(&connector);
        async move { connector.refresh_disruptions(status).await }
    })
}

/// One coordinator for the whole snapshot
///
/// Planned disruptions are included only when the connector tracks them.
pub fn combined_coordinator<C: PtvApi + 'static>(
    connector: Arc<Connector<C>>,
    interval: Duration,
) -> Result<PollingCoordinator<Snapshot>, CoordinatorError> {
    PollingCoordinator::new("snapshot", interval, move || {
        let connector = Arc::clone(&connector);
        async move { connector.refresh_all().await }
    })
}

/// One coordinator per data category
pub struct PtvCoordinators<C: PtvApi + 'static> {
    connector: Arc<Connector<C>>,
    /// Departures
    pub departures: Arc<PollingCoordinator<Arc<Vec<Departure>>>>,
    /// Current disruptions
    pub disruptions_current: Arc<PollingCoordinator<Arc<Vec<Disruption>>>>,
    /// Planned disruptions, absent when not tracked
    pub disruptions_planned: Option<Arc<PollingCoordinator<Arc<Vec<Disruption>>>>>,
}

impl<C: PtvApi + 'static> std::fmt::Debug for PtvCoordinators<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PtvCoordinators")
            .field("departures", &self.departures)
            .field("disruptions_current", &self.disruptions_current)
            .field("disruptions_planned", &self.disruptions_planned)
            .finish_non_exhaustive()
    }
}

impl<C: PtvApi + 'static> PtvCoordinators<C> {
    /// Build the coordinator set from the polling options
    ///
    /// A planned-disruptions coordinator exists only when the connector
    /// tracks planned disruptions.
    pub fn new(
        connector: Arc<Connector<C>>,
        options: &PollingOptions,
    ) -> Result<Self, CoordinatorError> {
        let departures = departures_coordinator(
            Arc::clone(&connector),
            options.departures_interval(),
        )?;
        let disruptions_current = disruptions_coordinator(
            Arc::clone(&connector),
            DisruptionStatus::Current,
            options.disruptions_interval(),
        )?;
        let disruptions_planned = if connector.tracks_planned() {
            Some(Arc::new(disruptions_coordinator(
                Arc::clone(&connector),
                DisruptionStatus::Planned,
                options.disruptions_interval(),
            )?))
        } else {
            None
        };

        Ok(Self {
            connector,
            departures: Arc::new(departures),
            disruptions_current: Arc::new(disruptions_current),
            disruptions_planned,
        })
    }

    /// The shared connector
    #[must_use]
    pub const fn connector(&self) -> &Arc<Connector<C>> {
        &self.connector
    }

    /// Blocking first refresh of every category, in order
    pub async fn first_refresh(&self) -> Result<(), CoordinatorError> {
        self.departures.first_refresh().await?;
        self.disruptions_current.first_refresh().await?;
        if let Some(planned) = &self.disruptions_planned {
            planned.first_refresh().await?;
        }

        info!("Initial PTV refresh complete");
        Ok(())
    }

    /// Start every polling loop
    pub fn start(&self) -> Result<(), CoordinatorError> {
        self.departures.start()?;
        self.disruptions_current.start()?;
        if let Some(planned) = &self.disruptions_planned {
            planned.start()?;
        }
        Ok(())
    }

    /// Stop every polling loop
    pub fn stop(&self) {
        self.departures.stop();
        self.disruptions_current.stop();
        if let Some(planned) = &self.disruptions_planned {
            planned.stop();
        }
    }

    /// Statistics of every coordinator
    #[must_use]
    pub fn stats(&self) -> Vec<CoordinatorStats> {
        let mut stats = vec![self.departures.stats(), self.disruptions_current.stats()];
        if let Some(planned) = &self.disruptions_planned {
            stats.push(planned.stats());
        }
        stats
    }
}
