//! # Hookwire Core
//!
//! Call dispatch for functions living inside an embedded script engine.
//!
//! This crate turns "call this script function with these arguments" into the
//! engine's prepare / set-arguments / execute / read-result protocol, and owns
//! the lifetime of the execution context the call runs on.
//!
//! ## Building Blocks
//!
//! - **Engine Abstractions**: [`ScriptEngine`], [`ScriptFunction`] and
//!   [`ScriptContext`], implemented by the engine integration
//! - **Module Registry**: [`ScriptModule`] descriptors and the hook ordering
//!   relation [`module_cmp`]
//! - **Arguments**: native [`VarArgs`] or typed [`ArgumentList`] sources,
//!   marshaled by [`set_arguments`]
//! - **Context Handle**: borrowed or pooled contexts ([`ContextHandle`])
//! - **Callable**: one function or method bound to one context ([`Callable`])
//! - **Dispatcher**: the generic call path ([`dispatch_with`])
//!
//! ## Call Flow
//!
//! ```text
//! dispatch_with ──▶ ContextHandle ──▶ Callable::call ──▶ complete(&callable)
//!   (validate)      (borrow/acquire)   (stage/execute)     (read result)
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use hookwire_core::{CallFlags, call_function, var_args};
//!
//! // `on_spawn` is a FunctionRef obtained from the engine integration.
//! call_function(Some(&on_spawn), None, CallFlags::NONE, var_args![player_id, true])?;
//! ```

pub mod args;
pub mod callable;
pub mod context;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod module;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use args::{
    ArgSource, ArgumentList, FromScriptValue, ObjectPtr, ScriptValue, VarArgs, set_arguments,
};
pub use callable::{CallFlags, Callable, CallableKind};
pub use context::{ContextHandle, OwnedContext};
pub use dispatch::{call_function, call_function_returning, call_method, dispatch_with};
pub use engine::{
    EngineRef, ExecutionStatus, Funcdef, FunctionRef, RetainedFunction, ScriptContext,
    ScriptEngine, ScriptFunction, ScriptTypeId, Signature, TypeFlags, TypeInfo,
};
pub use error::{CallError, CallResult, EngineError};
pub use module::{
    AccessMask, ModuleDescriptor, ModuleRef, ScriptModule, module_cmp, owning_module, same_module,
};

/// Prelude for common imports.
pub mod prelude {
    pub use super::args::{ArgSource, ArgumentList, ObjectPtr, ScriptValue, VarArgs};
    pub use super::callable::{CallFlags, CallableKind};
    pub use super::dispatch::{call_function, call_method, dispatch_with};
    pub use super::engine::{
        FunctionRef, ScriptContext, ScriptEngine, ScriptFunction, ScriptTypeId,
    };
    pub use super::error::{CallError, CallResult};
    pub use super::module::{ModuleRef, ScriptModule};
    pub use crate::var_args;
}
