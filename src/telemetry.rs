//! Tracing subscriber set-up for the binary.
//!
//! Library code only emits events; installing a subscriber is left to
//! whoever owns the process.

use tracing_subscriber::EnvFilter;

use crate::settings::LoggingSettings;

/// Install a fmt subscriber. `RUST_LOG` wins over the configured level.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init(settings: &LoggingSettings) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let _ = if settings.json {
        builder.json().with_target(false).try_init()
    } else {
        builder.try_init()
    };
}
