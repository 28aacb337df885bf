//! Tracing subscriber setup
//!
//! Installs a global `tracing-subscriber` fmt layer, human-readable or JSON,
//! filtered by `RUST_LOG` (default `info`). Keystore spans carry scope
//! tokens and table names only; key material never reaches a log field.

use std::sync::OnceLock;

use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

static INSTALLED: OnceLock<LogFormat> = OnceLock::new();

/// Output format of the installed subscriber
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Single-line human-readable output
    #[default]
    Plain,
    /// One JSON object per event
    Json,
}

/// Install the global subscriber.
///
/// Idempotent: the first call wins and later calls, whatever their format,
/// return the format that was installed. If another subscriber was already
/// set outside this function, that one stays in place.
pub fn init_tracing(format: LogFormat) -> LogFormat {
    *INSTALLED.get_or_init(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        let registry = tracing_subscriber::registry().with(filter);

        let result = match format {
            LogFormat::Plain => registry.with(fmt::layer().with_target(true)).try_init(),
            LogFormat::Json => registry.with(fmt::layer().json().with_current_span(true)).try_init(),
        };

        if let Err(err) = result {
            tracing::debug!(error = %err, "global tracing subscriber already set");
        }
        format
    })
}
