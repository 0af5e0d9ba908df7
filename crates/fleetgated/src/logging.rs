//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

use fleetgate_core::config::{LogFormat, LoggingConfig};

const DEFAULT_FILTER: &str = "info,fleetgated=debug,fleetgate=debug";

/// `RUST_LOG` wins, then the configured filter, then the built-in default.
fn filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| match &config.filter {
            Some(directives) => EnvFilter::try_new(directives),
            None => EnvFilter::try_new(DEFAULT_FILTER),
        })
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

pub fn init(config: &LoggingConfig) {
    let builder = tracing_subscriber::fmt().with_env_filter(filter(config));
    match config.format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
