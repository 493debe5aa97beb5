//! Tracing subscriber setup.

use crate::config::LogSettings;
use tracing_subscriber::{EnvFilter, fmt};

/// Installs a `fmt` subscriber filtered by `RUST_LOG`, falling back to the
/// configured filter.
///
/// Returns `false` when a global subscriber was already installed, which
/// leaves the existing one in place.
#[must_use]
pub fn init_tracing(settings: &LogSettings) -> bool {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(env_filter)
        .with_ansi(settings.ansi)
        .with_target(true)
        .try_init()
        .is_ok()
}
