//! # Hookwire Events
//!
//! Named events that scripts hook functions into, and the broadcast protocol
//! that calls those hooks.
//!
//! ## Components
//!
//! - **Hook Set**: ordered, deduplicated hooks grouped by module ([`HookSet`])
//! - **Event**: validation, reentrancy guard and broadcast ([`Event`])
//! - **Event Manager**: registration with the engine and name lookup
//!   ([`EventManager`])
//!
//! ## Broadcast
//!
//! ```text
//! Event::call ──▶ hook (module A) ──▶ hook (module A) ──▶ hook (module B)
//!                    │                    │
//!                    └─ HANDLED? ─────────┴─ stop mode decides whether to go on
//! ```
//!
//! Broadcast results are three-valued ([`HookCallResult`]): `Failed` means at
//! least one hook did not complete cleanly, not that nothing ran.

pub mod error;
pub mod event;
pub mod hook_set;
pub mod manager;
pub mod types;

pub use error::{HookError, HookResult};
pub use event::{Event, EventBinding, HookValue, ValueSlot};
pub use hook_set::{HookEntry, HookSet};
pub use manager::EventManager;
pub use types::{EventStopMode, HookCallResult, HookReturnCode, InCallCounter, InCallGuard};

/// Prelude for common imports.
pub mod prelude {
    pub use super::error::{HookError, HookResult};
    pub use super::event::{Event, HookValue};
    pub use super::manager::EventManager;
    pub use super::types::{EventStopMode, HookCallResult, HookReturnCode};
}
