//! Log output for binaries built on this crate.

use tracing_subscriber::{
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter,
};

/// The log level for a debug level between 0 (terse) and 5 (maximal).
pub fn level_for(debug: u8) -> &'static str {
    match debug {
        0 => "info",
        1 | 2 => "debug",
        _ => "trace",
    }
}

/// Install a formatting subscriber for the process. `RUST_LOG` takes precedence over `debug`.
///
/// Fails if a global subscriber is already installed.
pub fn init(debug: u8) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| level_for(debug).into());
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init()
}
