//! Configuration module for the Hookwire runtime.
//!
//! Configuration is layered with figment: built-in defaults, then a
//! `hookwire.toml` (or YAML) file, then `HOOKWIRE_*` environment variables.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    EventsConfig, HookwireConfig, LogFormat, LogLevel, LogOutput, LoggingConfig, SpanEventConfig,
};
pub use validation::validate_config;
