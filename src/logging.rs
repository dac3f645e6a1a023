//! Tracing setup
//!
//! The library only emits `tracing` events; binaries call [`init_tracing`]
//! once to print them to stderr.

use tracing_subscriber::EnvFilter;

/// Environment variable checked first for the log filter
pub const LOG_ENV: &str = "SENSE_LOG";

/// Install a stderr subscriber.
///
/// The filter comes from `SENSE_LOG`, then `RUST_LOG`, then `default_filter`.
/// Calling this again after a subscriber is installed is a no-op.
pub fn init_tracing(default_filter: &str) {
    let filter = std::env::var(LOG_ENV)
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| default_filter.to_string());
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}
