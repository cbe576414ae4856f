//! # Dashboard Runtime
//!
//! Configuration loading, logging setup, and the `Dashboard` facade that
//! wires an upstream, the fetch coordinator, the chart adapter, and the
//! report exporter together.

mod config;
mod dashboard;
mod logging;

pub use config::{
    ConfigError, DashboardConfig, FetchConfig, LoggingConfig, RetryConfig, UpstreamConfig,
    load_config,
};
pub use dashboard::Dashboard;
pub use logging::init_logging;
