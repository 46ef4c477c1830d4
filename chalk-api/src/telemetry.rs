/// Tracing subscriber setup
///
/// Called once at startup. `RUST_LOG` takes precedence over the configured
/// filter so a single run can be made noisier without touching config.

use crate::config::{LogFormat, LoggingConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Builds the filter from `RUST_LOG`, falling back to `config.filter`
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter))
}

/// Installs the global subscriber
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init(config: &LoggingConfig) -> anyhow::Result<()> {
    let registry = tracing_subscriber::registry().with(env_filter(config));

    match config.format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).try_init()?,
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init()?,
    }

    Ok(())
}
