//! Tracing subscriber setup
//!
//! Console output on stderr only: human-readable by default, JSON lines on
//! request.
//! `RUST_LOG` takes precedence over the configured filter.

use thiserror::Error;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::TelemetryAppConfig;

/// Telemetry initialization errors
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Failed to initialize tracing subscriber
    #[error("Failed to initialize tracing: {0}")]
    Init(String),
}

/// Install the global tracing subscriber
///
/// Fails if a global subscriber is already set.
///
/// # Example
///
/// ```ignore
/// use infrastructure::{TelemetryAppConfig, init_tracing};
///
/// init_tracing(&TelemetryAppConfig::default())?;
/// ```
pub fn init_tracing(config: &TelemetryAppConfig) -> Result<(), TelemetryError> {
    let env_filter = resolve_filter(&config.log_filter);

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if config.json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_current_span(true),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_line_number(true),
            )
            .try_init()
    };
    result.map_err(|e| TelemetryError::Init(e.to_string()))?;

    info!(json = config.json, "Tracing initialized");
    Ok(())
}

/// `RUST_LOG` if set and valid, else `fallback`, else `info`
fn resolve_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_fallback_does_not_panic() {
        let _filter = resolve_filter("not a [valid filter");
    }

    #[test]
    fn test_second_init_fails() {
        let config = TelemetryAppConfig::default();
        // the first call may lose to another test; the second never wins
        let _ = init_tracing(&config);
        assert!(init_tracing(&config).is_err());
    }
}
