//! # Hookwire
//!
//! Calls into an embedded scripting engine, and named events that scripts
//! hook functions into.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌────────────────────────────────┐
//! │ HookRuntime │────▶│ EventManager │────▶│ Event "Player::Spawn"          │
//! │  (config,   │     │  (lookup,    │     │   hooks ordered by module      │──▶ Callable ──▶ engine
//! │   logging)  │     │   access)    │     │   stop mode, in-call guard     │
//! └─────────────┘     └──────────────┘     └────────────────────────────────┘
//! ```
//!
//! - **core**: engine traits, execution contexts, argument marshaling and the
//!   one-shot [`Callable`](core::Callable) used for every call
//! - **events**: hook sets, events and the event registry
//! - **runtime**: configuration, logging and teardown
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hookwire::prelude::*;
//!
//! let runtime = HookRuntime::load(engine)?;
//! let spawn = runtime.register_event(
//!     Event::new("Player", "Spawn").with_arguments("int id", [ScriptTypeId::INT32]),
//! )?;
//! runtime.start()?;
//!
//! match spawn.call(None, CallFlags::NONE, var_args![player_id]) {
//!     HookCallResult::Handled => { /* a script took over */ }
//!     HookCallResult::NoneHandled => { /* default behavior */ }
//!     HookCallResult::Failed => { /* at least one hook errored */ }
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` (default): read `hookwire.toml`
//! - `yaml-config`: read `hookwire.yaml`
//! - `json-log`: JSON log output
//! - `testing`: the in-memory engine from `hookwire_core::testing`

pub use hookwire_core as core;
pub use hookwire_events as events;
pub use hookwire_runtime as runtime;

/// Commonly used types for host code.
pub mod prelude {
    pub use hookwire_runtime::{HookRuntime, HookwireConfig};

    pub use hookwire_events::{
        Event, EventManager, EventStopMode, HookCallResult, HookError, HookReturnCode, HookValue,
    };

    pub use hookwire_core::{
        AccessMask, ArgumentList, CallError, CallFlags, FunctionRef, ModuleDescriptor, ModuleRef,
        ObjectPtr, ScriptEngine, ScriptModule, ScriptTypeId, ScriptValue, call_function,
        call_method, var_args,
    };
}
