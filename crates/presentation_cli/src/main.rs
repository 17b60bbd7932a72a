//! PTV CLI
//!
//! Command-line interface for route selection, one-shot queries and polling.

#![allow(clippy::print_stdout)]

mod views;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use infrastructure::{AppConfig, CoordinatorState, PtvCoordinators, init_tracing};
use integration_ptv::{
    Choices, Connector, ConnectorConfig, DisruptionStatus, HttpPtvClient, PtvApi,
};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::views::{
    DEPARTURE_SLOTS, View, departure_view, disruption_active_view, disruption_count_view,
    disruption_detail_view,
};

/// PTV CLI
#[derive(Parser)]
#[command(name = "ptv-cli")]
#[command(author, version, about = "Public Transport Victoria departures and disruptions", long_about = None)]
struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file (default: ./config.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// PTV developer id (overrides the configuration file)
    #[arg(long, env = "PTV_DEVELOPER_ID", global = true)]
    device_id: Option<String>,

    /// PTV developer key (overrides the configuration file)
    #[arg(long, env = "PTV_DEVELOPER_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// Print views as JSON lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Route/stop/direction overrides
#[derive(Args, Debug, Default, Clone)]
struct Selection {
    /// Route type id (0 = train, 1 = tram, 2 = bus, ...)
    #[arg(long)]
    route_type: Option<String>,

    /// Route id
    #[arg(long)]
    route: Option<String>,

    /// Direction id
    #[arg(long)]
    direction: Option<String>,

    /// Stop id
    #[arg(long)]
    stop: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List route types
    RouteTypes,

    /// List routes of a route type
    Routes {
        /// Route type id
        #[arg(long)]
        route_type: String,
    },

    /// List directions of a route
    Directions {
        /// Route id
        #[arg(long)]
        route: String,
    },

    /// List stops along a route
    Stops {
        /// Route type id
        #[arg(long)]
        route_type: String,

        /// Route id
        #[arg(long)]
        route: String,
    },

    /// Show the next departures
    Departures {
        #[command(flatten)]
        selection: Selection,
    },

    /// Show disruptions affecting the route
    Disruptions {
        #[command(flatten)]
        selection: Selection,

        /// Planned instead of current disruptions
        #[arg(long)]
        planned: bool,
    },

    /// Poll continuously and print every update
    ///
    /// The first refresh must succeed; afterwards failures keep the last
    /// published values. Stop with Ctrl-C.
    Watch {
        #[command(flatten)]
        selection: Selection,
    },
}

/// Determine log filter level from verbosity count
const fn log_filter_from_verbosity(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Merge command-line credentials and selection into the configured connector
fn resolve_connector(
    configured: Option<ConnectorConfig>,
    device_id: Option<String>,
    api_key: Option<String>,
    selection: &Selection,
) -> anyhow::Result<ConnectorConfig> {
    let mut connector = match (configured, device_id, api_key) {
        (Some(mut connector), device_id, api_key) => {
            if let Some(device_id) = device_id {
                connector.device_id = device_id;
            }
            if let Some(api_key) = api_key {
                connector.api_key = api_key.into();
            }
            connector
        },
        (None, Some(device_id), Some(api_key)) => ConnectorConfig::new(device_id, api_key),
        (None, _, _) => bail!(
            "PTV credentials missing: set [connector] in the configuration or pass --device-id and --api-key"
        ),
    };

    let Selection {
        route_type,
        route,
        direction,
        stop,
    } = selection.clone();
    connector.route_type = route_type.or(connector.route_type);
    connector.route = route.or(connector.route);
    connector.direction = direction.or(connector.direction);
    connector.stop = stop.or(connector.stop);

    Ok(connector)
}

fn print_choices(choices: &Choices) {
    for (id, name) in choices {
        println!("{id}\t{name}");
    }
}

fn print_views(views: &[View], json: bool) -> anyhow::Result<()> {
    for view in views {
        if json {
            println!("{}", serde_json::to_string(view)?);
        } else {
            println!("{}: {}", view.name, view.state);
        }
    }
    Ok(())
}

fn departure_views<C: PtvApi>(connector: &Connector<C>) -> Vec<View> {
    let config = connector.config();
    let departures = connector.departures();
    (0..DEPARTURE_SLOTS)
        .map(|slot| departure_view(&config, &departures, slot))
        .collect()
}

fn disruption_views<C: PtvApi>(
    connector: &Connector<C>,
    status: DisruptionStatus,
    details_limit: usize,
) -> Vec<View> {
    let config = connector.config();
    let disruptions = connector.disruptions(status);
    let mut views = vec![
        disruption_count_view(&config, &disruptions, status),
        disruption_detail_view(
            &config,
            &disruptions,
            status,
            details_limit,
            Utc::now(),
            connector.time_zone(),
        ),
    ];
    if status == DisruptionStatus::Current {
        views.push(disruption_active_view(&config, &disruptions));
    }
    views
}

fn report_failure<T>(name: &str, state: &CoordinatorState<T>) {
    if !state.last_update_success {
        if let Some(error) = &state.last_error {
            println!("⚠️  {name} update failed, showing last data: {error}");
        }
    }
}

/// Resolves when `rx` changes; never when there is no receiver
async fn changed<T>(rx: Option<&mut watch::Receiver<T>>) -> bool {
    match rx {
        Some(rx) => rx.changed().await.is_ok(),
        None => std::future::pending().await,
    }
}

async fn run_watch(
    connector: Connector<HttpPtvClient>,
    config: &AppConfig,
    json: bool,
) -> anyhow::Result<()> {
    let coordinators = PtvCoordinators::new(Arc::new(connector), &config.polling)?;
    coordinators
        .first_refresh()
        .await
        .context("initial refresh failed")?;
    coordinators.start()?;

    let details_limit = config.polling.details_limit;
    let connector = Arc::clone(coordinators.connector());

    let mut departures_rx = coordinators.departures.subscribe();
    let mut current_rx = coordinators.disruptions_current.subscribe();
    let mut planned_rx = coordinators
        .disruptions_planned
        .as_ref()
        .map(|planned| planned.subscribe());

    print_views(&departure_views(&connector), json)?;
    print_views(&disruption_views(&connector, DisruptionStatus::Current, details_limit), json)?;
    if planned_rx.is_some() {
        print_views(&disruption_views(&connector, DisruptionStatus::Planned, details_limit), json)?;
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping coordinators");
                break;
            },
            ok = changed(Some(&mut departures_rx)) => {
                if !ok { break; }
                report_failure("departures", &departures_rx.borrow_and_update());
                print_views(&departure_views(&connector), json)?;
            },
            ok = changed(Some(&mut current_rx)) => {
                if !ok { break; }
                report_failure("current disruptions", &current_rx.borrow_and_update());
                print_views(
                    &disruption_views(&connector, DisruptionStatus::Current, details_limit),
                    json,
                )?;
            },
            ok = changed(planned_rx.as_mut()) => {
                if !ok { break; }
                if let Some(rx) = planned_rx.as_mut() {
                    report_failure("planned disruptions", &rx.borrow_and_update());
                }
                print_views(
                    &disruption_views(&connector, DisruptionStatus::Planned, details_limit),
                    json,
                )?;
            },
        }
    }

    coordinators.stop();
    for stats in coordinators.stats() {
        info!(
            coordinator = %stats.name,
            success = stats.success_count,
            failure = stats.failure_count,
            throttled = stats.throttled_count,
            avg_duration_ms = stats.avg_duration_ms,
            "Coordinator summary"
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_from(cli.config.as_deref()).context("loading configuration")?;

    let mut telemetry = config.telemetry.clone();
    if cli.verbose > 0 {
        telemetry.log_filter = log_filter_from_verbosity(cli.verbose).to_string();
    }
    init_tracing(&telemetry)?;

    config.validate()?;

    let selection = match &cli.command {
        Commands::Departures { selection }
        | Commands::Disruptions { selection, .. }
        | Commands::Watch { selection } => selection.clone(),
        Commands::Stops { route_type, .. } => Selection {
            route_type: Some(route_type.clone()),
            ..Selection::default()
        },
        Commands::RouteTypes | Commands::Routes { .. } | Commands::Directions { .. } => {
            Selection::default()
        },
    };

    let connector_config =
        resolve_connector(config.connector.clone(), cli.device_id, cli.api_key, &selection)?;
    let connector = Connector::connect(&config.ptv, connector_config)?
        .with_planned(config.polling.planned_enabled);

    match cli.command {
        Commands::RouteTypes => print_choices(&connector.list_route_types().await?),
        Commands::Routes { route_type } => {
            print_choices(&connector.list_routes(&route_type).await?);
        },
        Commands::Directions { route } => {
            print_choices(&connector.list_directions(&route).await?);
        },
        Commands::Stops { route, .. } => print_choices(&connector.list_stops(&route).await?),
        Commands::Departures { .. } => {
            connector.refresh_departures().await?;
            print_views(&departure_views(&connector), cli.json)?;
        },
        Commands::Disruptions { planned, .. } => {
            let status = if planned {
                DisruptionStatus::Planned
            } else {
                DisruptionStatus::Current
            };
            if planned && !connector.tracks_planned() {
                warn!("Planned disruptions are disabled in the polling options");
            }
            connector.refresh_disruptions(status).await?;
            print_views(
                &disruption_views(&connector, status, config.polling.details_limit),
                cli.json,
            )?;
        },
        Commands::Watch { .. } => run_watch(connector, &config, cli.json).await?,
    }

    Ok(())
}
