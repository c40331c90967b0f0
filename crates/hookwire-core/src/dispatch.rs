//! Generic call dispatch.
//!
//! [`dispatch_with`] is the one call path behind every call surface. It picks
//! the context, builds the [`Callable`], runs it, and hands the completed
//! callable to a closure so the caller can read a result before the context
//! is released.

use tracing::debug;

use crate::args::{ArgSource, FromScriptValue, ObjectPtr};
use crate::callable::{CallFlags, Callable, CallableKind};
use crate::context::ContextHandle;
use crate::engine::{FunctionRef, ScriptContext};
use crate::error::{CallError, CallResult};

/// Calls `function` and passes the completed callable to `complete`.
///
/// Without a caller context one is acquired from the function's engine and
/// returned on every path, including failures.
pub fn dispatch_with<R>(
    function: Option<&FunctionRef>,
    kind: CallableKind,
    context: Option<&mut dyn ScriptContext>,
    flags: CallFlags,
    args: ArgSource<'_>,
    complete: impl FnOnce(&Callable<'_>) -> R,
) -> CallResult<R> {
    let function = function.ok_or(CallError::NullFunction)?;
    let mut handle = ContextHandle::resolve(context, || function.engine())?;

    let mut callable = Callable::new(function.clone(), handle.context()?, kind);
    if !callable.is_valid() {
        return Err(CallError::InvalidCallable {
            function: function.qualified_name(),
        });
    }

    if let Err(err) = callable.call(flags, args) {
        debug!(function = %function.qualified_name(), error = %err, "Script call failed");
        return Err(err);
    }
    Ok(complete(&callable))
}

/// Calls a free function.
pub fn call_function<'a>(
    function: Option<&FunctionRef>,
    context: Option<&mut dyn ScriptContext>,
    flags: CallFlags,
    args: impl Into<ArgSource<'a>>,
) -> CallResult<()> {
    dispatch_with(
        function,
        CallableKind::Function,
        context,
        flags,
        args.into(),
        |_| (),
    )
}

/// Calls a method on `this`.
pub fn call_method<'a>(
    this: ObjectPtr,
    function: Option<&FunctionRef>,
    context: Option<&mut dyn ScriptContext>,
    flags: CallFlags,
    args: impl Into<ArgSource<'a>>,
) -> CallResult<()> {
    dispatch_with(
        function,
        CallableKind::Method { this },
        context,
        flags,
        args.into(),
        |_| (),
    )
}

/// Calls a free function and reads its return value.
pub fn call_function_returning<'a, T: FromScriptValue>(
    function: Option<&FunctionRef>,
    context: Option<&mut dyn ScriptContext>,
    flags: CallFlags,
    args: impl Into<ArgSource<'a>>,
) -> CallResult<T> {
    dispatch_with(
        function,
        CallableKind::Function,
        context,
        flags,
        args.into(),
        |callable| callable.return_value::<T>(),
    )?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::{ArgumentList, ScriptValue};
    use crate::engine::{ExecutionStatus, ScriptTypeId};
    use crate::testing::{MockContext, MockEngine};
    use crate::var_args;

    #[test]
    fn test_null_function() {
        let err = call_function(None, None, CallFlags::NONE, var_args![]).unwrap_err();
        assert_eq!(err, CallError::NullFunction);
    }

    #[test]
    fn test_owned_context_released_after_success() {
        let engine = MockEngine::new();
        let function = engine.function("Ping").build();

        call_function(Some(&function), None, CallFlags::NONE, var_args![]).unwrap();

        assert_eq!(engine.contexts_acquired(), 1);
        assert_eq!(engine.contexts_released(), 1);
    }

    #[test]
    fn test_owned_context_released_after_marshal_failure() {
        let engine = MockEngine::new();
        let function = engine
            .function("Ping")
            .params([ScriptTypeId::INT32, ScriptTypeId::INT32])
            .build();

        let err = call_function(Some(&function), None, CallFlags::NONE, var_args![1i32, "x"])
            .unwrap_err();

        assert!(err.is_argument_error());
        assert_eq!(engine.contexts_acquired(), 1);
        assert_eq!(engine.contexts_released(), 1);
    }

    #[test]
    fn test_owned_context_released_after_execution_failure() {
        let engine = MockEngine::new();
        let function = engine
            .function("Ping")
            .body(|_| Err(ExecutionStatus::Aborted))
            .build();

        let err = call_function(Some(&function), None, CallFlags::NONE, var_args![]).unwrap_err();

        assert_eq!(err, CallError::Execution(ExecutionStatus::Aborted));
        assert_eq!(engine.contexts_acquired(), 1);
        assert_eq!(engine.contexts_released(), 1);
    }

    #[test]
    fn test_borrowed_context_used_as_is() {
        let engine = MockEngine::new();
        let function = engine.function("Ping").build();
        let mut context = MockContext::default();

        call_function(Some(&function), Some(&mut context), CallFlags::NONE, var_args![]).unwrap();

        assert_eq!(engine.contexts_acquired(), 0);
        assert_eq!(context.status(), ExecutionStatus::Finished);
    }

    #[test]
    fn test_method_with_null_receiver() {
        let engine = MockEngine::new();
        let method = engine.function("Tick").build();

        let err = call_method(ObjectPtr::NULL, Some(&method), None, CallFlags::NONE, var_args![])
            .unwrap_err();

        assert!(matches!(err, CallError::InvalidCallable { .. }));
        assert_eq!(engine.contexts_released(), engine.contexts_acquired());
    }

    #[test]
    fn test_structured_list_and_return() {
        let engine = MockEngine::new();
        let double = engine
            .function("Double")
            .params([ScriptTypeId::INT64])
            .returns(ScriptTypeId::INT64)
            .body(|call| match call.args[0] {
                ScriptValue::Int64(v) => Ok(Some(ScriptValue::Int64(v * 2))),
                _ => Ok(None),
            })
            .build();

        let args = ArgumentList::new().with(21i64);
        let result: i64 =
            call_function_returning(Some(&double), None, CallFlags::NONE, &args).unwrap();
        assert_eq!(result, 42);
    }
}
