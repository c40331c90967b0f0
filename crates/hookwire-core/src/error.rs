//! Error types for call dispatch.
//!
//! Every failure here aborts a single call only. Broadcast layers aggregate
//! these into their own result types instead of propagating them.

use thiserror::Error;

use crate::engine::{ExecutionStatus, ScriptTypeId};

/// A raw error code reported by the script engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("engine returned error code {0}")]
pub struct EngineError(pub i32);

/// Errors that can occur while dispatching a single call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CallError {
    /// No function was supplied.
    #[error("no function to call")]
    NullFunction,

    /// The callable could not be used (e.g. a method without a receiver).
    #[error("invalid callable for '{function}'")]
    InvalidCallable {
        /// Qualified name of the function.
        function: String,
    },

    /// The engine's context pool could not supply a context.
    #[error("no execution context available")]
    ContextUnavailable,

    /// The context refused to prepare the function.
    #[error("failed to prepare context: {0}")]
    Prepare(#[source] EngineError),

    /// The receiver could not be bound to the context.
    #[error("failed to bind receiver object: {0}")]
    SetObject(#[source] EngineError),

    /// An argument slot was rejected by the context.
    #[error("failed to set argument {index}: {source}")]
    SetArgument {
        /// Zero-based argument index.
        index: usize,
        /// Engine error code.
        #[source]
        source: EngineError,
    },

    /// An argument did not match the declared parameter type.
    #[error("argument {index} mismatch: expected {expected}, found {}", found_type(.found))]
    ArgumentMismatch {
        /// Zero-based argument index.
        index: usize,
        /// Declared parameter type.
        expected: ScriptTypeId,
        /// Runtime type of the supplied value, if it had one.
        found: Option<ScriptTypeId>,
    },

    /// The function did not run to completion.
    #[error("execution did not finish: {0}")]
    Execution(ExecutionStatus),

    /// The context holds no completed result.
    #[error("no return value available")]
    NoReturnValue,

    /// The requested return type does not match the declared one.
    #[error("return type mismatch: declared {declared}, requested {requested}")]
    ReturnTypeMismatch {
        /// Declared return type of the function.
        declared: ScriptTypeId,
        /// Rust type the caller asked for.
        requested: &'static str,
    },
}

impl CallError {
    /// Returns `true` if this error was raised while staging arguments.
    pub fn is_argument_error(&self) -> bool {
        matches!(
            self,
            Self::ArgumentMismatch { .. } | Self::SetArgument { .. } | Self::SetObject(_)
        )
    }
}

fn found_type(found: &Option<ScriptTypeId>) -> String {
    found.map_or_else(|| "nothing".to_string(), |t| t.to_string())
}

/// Result type for call operations.
pub type CallResult<T> = Result<T, CallError>;
