//! Structured logging initialization.

use crate::error::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing output: JSON when `RUST_ENV=production`, pretty
/// otherwise. `RUST_LOG` overrides the default filter.
pub fn init_logging() -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,ivc=debug"));
    let registry = tracing_subscriber::registry().with(filter);

    match std::env::var("RUST_ENV").as_deref() {
        Ok("production") => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .init(),
        _ => registry
            .with(fmt::layer().pretty().with_target(true).with_thread_names(true))
            .init(),
    }

    Ok(())
}
