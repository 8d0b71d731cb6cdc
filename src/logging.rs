//! Log subscriber setup for the CLI
//!
//! The library only emits `tracing` events; installing a subscriber is left to
//! the binary embedding it.

use std::sync::Once;

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::DEFAULT_LOG_FILTER;

static INIT: Once = Once::new();

/// Install a stderr subscriber once per process.
///
/// `RUST_LOG` wins over `filter`; an invalid `filter` falls back to
/// the default directive.
pub fn init_logging(filter: Option<&str>) {
    INIT.call_once(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(filter.unwrap_or(DEFAULT_LOG_FILTER)))
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

        // Another subscriber may already be installed by a host application.
        let _ = fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
            .try_init();
    });
}
