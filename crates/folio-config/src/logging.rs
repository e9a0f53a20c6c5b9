//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

use crate::types::LoggingSettings;

/// Install a global `fmt` subscriber
///
/// `RUST_LOG` takes precedence over `settings.level`. Returns `false` when a
/// global subscriber was already installed, which leaves the existing one in
/// place.
pub fn init(settings: &LoggingSettings) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
