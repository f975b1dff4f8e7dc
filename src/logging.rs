//! Logging setup.
//!
//! Installs a global tracing subscriber writing to stderr so stdout stays
//! reserved for the URLs the launcher prints. `RUST_LOG` overrides the
//! default `info` filter.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_FILTER: &str = "info";

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),
    #[error("failed to install global tracing subscriber: {0}")]
    SetGlobal(#[from] tracing_subscriber::util::TryInitError),
}

fn build_filter(raw: Option<&str>) -> Result<EnvFilter, LoggingError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(directives) => Ok(EnvFilter::try_new(directives)?),
        None => Ok(EnvFilter::new(DEFAULT_FILTER)),
    }
}

pub fn init() -> Result<(), LoggingError> {
    let raw = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(raw.as_deref())?;
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init()?;
    Ok(())
}
