//! Logging setup.

use tracing_subscriber::EnvFilter;

/// Installs a formatted `tracing` subscriber as the global default.
///
/// `RUST_LOG` wins over `filter` when set. Returns `false` if a global
/// subscriber was already installed, so calling this twice is harmless.
pub fn init(filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
