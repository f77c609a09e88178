//! Logging setup
//!
//! One global subscriber: an `EnvFilter` (from `RUST_LOG`, falling back to the
//! configured default) in front of the fmt layer.

use anyhow::{anyhow, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

pub fn build_filter(default_directives: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives))
}

pub fn init_telemetry(default_directives: &str) -> Result<()> {
    Registry::default()
        .with(build_filter(default_directives))
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
        .map_err(|e| anyhow!("Failed to install tracing subscriber: {}", e))
}
