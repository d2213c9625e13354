//! Tracing subscriber setup.
//!
//! The library only emits `tracing` events. Applications that have no
//! subscriber of their own can install one here.
//!
//! ```rust,no_run
//! navexpect::logging::init_tracing("navexpect=info").ok();
//! ```

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::error::{ExpectError, Result};

/// Output format of the installed subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Install a text subscriber filtered by `RUST_LOG`, or by
/// `default_directive` when `RUST_LOG` is unset.
///
/// # Errors
///
/// Returns [`ExpectError::Config`] if the directive is invalid or a global
/// subscriber is already installed.
pub fn init_tracing(default_directive: &str) -> Result<()> {
    init_tracing_with(LogFormat::Text, default_directive)
}

/// Install a subscriber in the given format.
///
/// # Errors
///
/// Returns [`ExpectError::Config`] if the directive is invalid or a global
/// subscriber is already installed.
pub fn init_tracing_with(format: LogFormat, default_directive: &str) -> Result<()> {
    let filter = env_filter(default_directive)?;
    let registry = tracing_subscriber::registry().with(filter);
    let installed = match format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_target(true).with_level(true))
            .try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .try_init(),
    };
    installed.map_err(|e| ExpectError::config(format!("cannot install tracing subscriber: {e}")))
}

fn env_filter(default_directive: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(default_directive).map_err(|e| {
            ExpectError::config(format!("invalid log directive '{default_directive}': {e}"))
        }),
    }
}
