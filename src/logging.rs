//! `tracing` subscriber setup for the server.
//!
//! `RUST_LOG` wins over the built-in directives.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::{config::LogFormat, errors::AppError};

const DEFAULT_DIRECTIVES: &str = "tunescout=info,tower_http=info";

pub fn init_logging(format: LogFormat) -> Result<(), AppError> {
    let filter = std::env::var("RUST_LOG")
        .ok()
        .map(EnvFilter::new)
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVES));

    let registry = tracing_subscriber::registry().with(filter);
    let result = match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().with_target(true)).try_init(),
    };

    result.map_err(|e| AppError::Config(format!("cannot install logger: {e}")))
}
