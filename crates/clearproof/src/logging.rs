//! Process-wide tracing setup for hosts embedding the pipeline.
//!
//! The level is read from `CLEARPROOF_LOG` (any `EnvFilter` directive,
//! e.g. `clearproof=debug`), defaulting to `info`. Records emitted through
//! the `log` facade are forwarded into the same subscriber.

use thiserror::Error;
use tracing_log::LogTracer;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter};

pub const LOG_ENV: &str = "CLEARPROOF_LOG";
const DEFAULT_FILTER: &str = "info";

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Failed to bridge log records: {0}")]
    Bridge(#[from] log::SetLoggerError),

    #[error("Failed to install tracing subscriber: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

fn env_filter(value: Option<String>) -> EnvFilter {
    value
        .and_then(|v| EnvFilter::try_new(v).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the global subscriber. Call once, before the pipeline starts.
pub fn init(json: bool) -> Result<(), LoggingError> {
    let filter = env_filter(std::env::var(LOG_ENV).ok());

    let (plain, structured) = if json {
        (
            None,
            Some(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_writer(std::io::stderr),
            ),
        )
    } else {
        (Some(fmt::layer().with_writer(std::io::stderr)), None)
    };

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(plain)
        .with(structured);

    LogTracer::init()?;
    tracing::subscriber::set_global_default(subscriber)?;
    tracing::info!("Logging initialized");
    Ok(())
}
