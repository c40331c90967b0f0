//! A single function or method bound to an execution context.
//!
//! [`Callable`] runs the call sequence shared by free functions and bound
//! methods:
//!
//! 1. prepare the context for the function
//! 2. pre-set-arguments (methods bind their receiver here)
//! 3. marshal the arguments
//! 4. pre-execute
//! 5. execute
//! 6. post-execute
//!
//! The only difference between the two kinds is step 2, so the kinds are a
//! closed enum matched at each extension point.

use std::any::type_name;

use tracing::trace;

use crate::args::{ArgSource, FromScriptValue, ObjectPtr, set_arguments};
use crate::engine::{ExecutionStatus, FunctionRef, ScriptContext, ScriptTypeId};
use crate::error::{CallError, CallResult};

/// Flags passed through to each call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CallFlags(u32);

impl CallFlags {
    pub const NONE: Self = Self(0);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }
}

/// What is being called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallableKind {
    /// A free function.
    Function,
    /// A method invoked on `this`. The receiver is borrowed for one call only.
    Method { this: ObjectPtr },
}

/// One function bound to one context for one call.
pub struct Callable<'c> {
    function: FunctionRef,
    context: &'c mut dyn ScriptContext,
    kind: CallableKind,
    completed: bool,
}

impl<'c> Callable<'c> {
    pub fn new(function: FunctionRef, context: &'c mut dyn ScriptContext, kind: CallableKind) -> Self {
        Self {
            function,
            context,
            kind,
            completed: false,
        }
    }

    pub fn function(&self) -> &FunctionRef {
        &self.function
    }

    pub fn kind(&self) -> CallableKind {
        self.kind
    }

    /// Returns `false` for a method without a receiver.
    pub fn is_valid(&self) -> bool {
        match self.kind {
            CallableKind::Function => true,
            CallableKind::Method { this } => !this.is_null(),
        }
    }

    /// Returns `true` once a call has finished normally.
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Runs the call sequence.
    pub fn call(&mut self, flags: CallFlags, args: ArgSource<'_>) -> CallResult<()> {
        self.completed = false;
        trace!(
            function = %self.function.qualified_name(),
            flags = flags.bits(),
            "Calling script function"
        );

        self.context
            .prepare(&self.function)
            .map_err(CallError::Prepare)?;
        self.pre_set_arguments()?;
        set_arguments(&mut *self.context, &self.function, args)?;
        self.pre_execute();

        let status = self.context.execute();
        self.post_execute(status);

        if !status.is_finished() {
            return Err(CallError::Execution(status));
        }
        self.completed = true;
        Ok(())
    }

    /// Reads the value returned by the completed call.
    pub fn return_value<T: FromScriptValue>(&self) -> CallResult<T> {
        if !self.completed {
            return Err(CallError::NoReturnValue);
        }

        let declared = self.function.signature().return_type;
        let mismatch = CallError::ReturnTypeMismatch {
            declared,
            requested: type_name::<T>(),
        };
        if declared == ScriptTypeId::VOID {
            return Err(mismatch);
        }

        let value = self.context.return_value().ok_or(CallError::NoReturnValue)?;
        if !value.fits(declared) {
            return Err(mismatch);
        }
        T::from_script_value(value).ok_or(mismatch)
    }

    fn pre_set_arguments(&mut self) -> CallResult<()> {
        match self.kind {
            CallableKind::Function => Ok(()),
            CallableKind::Method { this } => self
                .context
                .set_object(this)
                .map_err(CallError::SetObject),
        }
    }

    fn pre_execute(&mut self) {}

    fn post_execute(&mut self, status: ExecutionStatus) {
        if !status.is_finished() {
            trace!(
                function = %self.function.qualified_name(),
                %status,
                "Script function did not finish"
            );
        }
    }
}
