//! Engine configuration: defaults, file loading and environment overrides

mod engine;
mod loader;
mod logging_config;
pub mod timeouts;

pub use engine::{BackoffConfig, EngineConfig, TemperatureConfig};
pub use loader::{ConfigLoader, ConfigSource, ENV_PREFIX, apply_overrides};
pub use logging_config::LoggingConfig;
