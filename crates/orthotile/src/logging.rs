//! Process-wide tracing setup.
//!
//! Library code logs through `tracing` and, in a few places, the `log`
//! facade; both end up in the same subscriber. Filtering follows
//! `RUST_LOG` and defaults to `info`.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Single-line human readable output.
    #[default]
    Compact,
    /// One JSON object per event, for log shippers.
    Json,
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("A global tracing subscriber is already installed: {0}")]
    SubscriberInstalled(#[from] tracing::subscriber::SetGlobalDefaultError),

    #[error("Failed to bridge the log facade: {0}")]
    LogBridge(#[from] tracing_log::log_tracer::SetLoggerError),
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global subscriber. Call once, early in `main`.
pub fn init_logging(format: LogFormat) -> Result<(), LoggingError> {
    let registry = tracing_subscriber::registry().with(env_filter());

    match format {
        LogFormat::Compact => {
            let layer = tracing_subscriber::fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr);
            tracing::subscriber::set_global_default(registry.with(layer))?;
        }
        LogFormat::Json => {
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_writer(std::io::stderr);
            tracing::subscriber::set_global_default(registry.with(layer))?;
        }
    }

    tracing_log::LogTracer::init()?;
    Ok(())
}
