//! Application configuration
//!
//! Split into focused sub-modules:
//! - `polling`: scan intervals, detail list size, planned disruptions
//! - `telemetry`: console log output
//!
//! Client settings and the connector selection live in `integration_ptv`.

mod polling;
mod telemetry;

use std::path::Path;

use integration_ptv::{ConnectorConfig, PtvConfig, PtvError};
use serde::Deserialize;
use tracing::debug;

pub use polling::PollingOptions;
pub use telemetry::TelemetryAppConfig;

/// Shared default for boolean `true` fields across config structs
pub(crate) const fn default_true() -> bool {
    true
}

/// Environment variable prefix, e.g. `PTV_CONNECTOR__DEVICE_ID`
pub const ENV_PREFIX: &str = "PTV";

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// PTV client settings
    #[serde(default)]
    pub ptv: PtvConfig,

    /// Credentials and selection (optional until setup completes)
    #[serde(default)]
    pub connector: Option<ConnectorConfig>,

    /// Polling options
    #[serde(default)]
    pub polling: PollingOptions,

    /// Log output
    #[serde(default)]
    pub telemetry: TelemetryAppConfig,
}

impl AppConfig {
    /// Load configuration from an explicit file (required) or `config.toml`
    /// (optional), then apply `PTV_` environment overrides
    pub fn load_from(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name("config").required(false),
        };

        let builder = config::Config::builder()
            .add_source(file)
            // Override with environment variables (e.g., PTV_POLLING__DETAILS_LIMIT)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let config: Self = builder.build()?.try_deserialize()?;
        debug!(
            base_url = %config.ptv.base_url,
            has_connector = config.connector.is_some(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Validate every section
    pub fn validate(&self) -> Result<(), PtvError> {
        self.ptv.validate()?;
        self.polling.validate()?;
        if let Some(connector) = &self.connector {
            connector.validate()?;
        }
        Ok(())
    }

    /// The connector section, or a configuration error naming what is missing
    pub fn require_connector(&self) -> Result<&ConnectorConfig, PtvError> {
        self.connector.as_ref().ok_or_else(|| {
            PtvError::ConfigurationError(
                "connector section (device_id, api_key) is missing".to_string(),
            )
        })
    }
}
