//! telemetry
//!
//! Logging setup for applications embedding repoview.
//!
//! The library itself only emits `tracing` events; installing a subscriber is
//! the embedding application's choice. [`init`] installs a formatted
//! subscriber filtered by `REPOVIEW_LOG`, falling back to the configured
//! filter.
//!
//! Credential secrets are never recorded in any event.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::core::config::Config;

/// Environment variable holding the filter directive.
pub const LOG_ENV_VAR: &str = "REPOVIEW_LOG";

/// Build the filter: `REPOVIEW_LOG` when set and valid, else `fallback`.
pub fn filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Install the global subscriber.
///
/// Returns `false` if a global subscriber was already installed (for
/// example by a test harness), in which case nothing changes.
pub fn init(config: &Config) -> bool {
    tracing_subscriber::registry()
        .with(filter(config.log_filter()))
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
        .is_ok()
}
