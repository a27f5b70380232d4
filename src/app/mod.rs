//! Application glue module
//!
//! Configuration and logging setup shared by binaries.

mod config;

pub use config::{default_path, Config, ConfigError, FilterConfig, InputMode};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a stderr logger filtered by `RUST_LOG`, or `default_filter` if unset
pub fn init_logging(default_filter: &str) {
    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr));
    if subscriber.try_init().is_err() {
        tracing::debug!("Logging already initialised");
    }
}
