//! Hookwire Runtime - configuration, logging and lifecycle for Hookwire hosts.
//!
//! This crate provides:
//! - Layered configuration loading (`ConfigLoader`, `HookwireConfig`)
//! - `tracing` subscriber setup (`LoggingBuilder`)
//! - The [`HookRuntime`], which owns an [`EventManager`](hookwire_events::EventManager)
//!   and drives registration, module unloading and teardown
//!
//! ```rust,ignore
//! use hookwire_runtime::HookRuntime;
//!
//! let runtime = HookRuntime::builder()
//!     .config_file("config/hookwire.toml")
//!     .build(engine)?;
//! runtime.start()?;
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{ConfigError, ConfigLoader, ConfigResult, EventsConfig, HookwireConfig, LoggingConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{HookRuntime, RuntimeBuilder};

pub use tracing;
pub use tracing_subscriber;

/// Logging macros for host code.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
