//! Error types for hooking and event management.

use thiserror::Error;

use hookwire_core::{EngineError, ScriptTypeId};

/// Errors raised while hooking, unhooking or looking up events.
///
/// None of these abort a broadcast; they are returned from the mutating call
/// that caused them.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HookError {
    /// The engine could not resolve the value's type.
    #[error("unknown type {0}")]
    UnknownType(ScriptTypeId),

    /// The value's type is not a function signature type.
    #[error("type '{type_name}' is not a function type")]
    NotCallable {
        /// Name of the offending type.
        type_name: String,
    },

    /// The value, or the handle it refers through, is null.
    #[error("null function value")]
    NullValue,

    /// The function's signature does not match the event.
    #[error("function '{function}' is incompatible with event '{event}'")]
    SignatureMismatch {
        /// Event the function was offered to.
        event: String,
        /// Function, or delegate receiver and method, that was rejected.
        function: String,
    },

    /// The event is broadcasting and its hooks cannot change.
    #[error("cannot {operation} while event '{event}' is being broadcast")]
    InCall {
        /// Event being broadcast.
        event: String,
        /// Rejected operation.
        operation: &'static str,
    },

    /// The event has not been registered with an engine yet.
    #[error("event '{0}' is not registered with an engine")]
    NotRegistered(String),

    /// No event with this name exists.
    #[error("event '{0}' not found")]
    EventNotFound(String),

    /// The calling module may not access this event.
    #[error("module '{module}' may not access event '{event}'")]
    AccessDenied {
        /// Calling module.
        module: String,
        /// Requested event.
        event: String,
    },

    /// The event cannot be managed (e.g. empty access mask).
    #[error("invalid event '{event}': {reason}")]
    InvalidEvent {
        /// Event name.
        event: String,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// The manager cannot hold more events.
    #[error("too many events")]
    TooManyEvents,

    /// The engine rejected a registration.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Result type for hook operations.
pub type HookResult<T> = Result<T, HookError>;
