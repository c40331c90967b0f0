//! Execution context ownership.

use std::fmt;

use tracing::trace;

use crate::engine::{EngineRef, ScriptContext};
use crate::error::{CallError, CallResult};

/// A context taken from an engine's pool.
///
/// The context goes back to the engine that supplied it when this value is
/// dropped, whatever happened to the call in between.
pub struct OwnedContext {
    engine: EngineRef,
    /// `None` only once the context has gone back to the pool.
    context: Option<Box<dyn ScriptContext>>,
}

impl OwnedContext {
    /// Requests a context from the engine's pool.
    pub fn acquire(engine: EngineRef) -> CallResult<Self> {
        let context = engine
            .request_context()
            .ok_or(CallError::ContextUnavailable)?;
        trace!("Acquired pooled execution context");
        Ok(Self {
            engine,
            context: Some(context),
        })
    }

    pub fn engine(&self) -> &EngineRef {
        &self.engine
    }

    pub fn context(&mut self) -> CallResult<&mut dyn ScriptContext> {
        match self.context.as_deref_mut() {
            Some(context) => Ok(context),
            None => Err(CallError::ContextUnavailable),
        }
    }
}

impl Drop for OwnedContext {
    fn drop(&mut self) {
        if let Some(context) = self.context.take() {
            self.engine.return_context(context);
            trace!("Returned execution context to pool");
        }
    }
}

impl fmt::Debug for OwnedContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnedContext").finish_non_exhaustive()
    }
}

/// The context a single call sequence runs on.
///
/// A borrowed context belongs to the caller and is left untouched on drop.
/// An owned one is returned to its pool.
pub enum ContextHandle<'a> {
    Borrowed(&'a mut dyn ScriptContext),
    Owned(OwnedContext),
}

impl<'a> ContextHandle<'a> {
    pub fn borrowed(context: &'a mut dyn ScriptContext) -> Self {
        Self::Borrowed(context)
    }

    pub fn acquire(engine: EngineRef) -> CallResult<Self> {
        OwnedContext::acquire(engine).map(Self::Owned)
    }

    /// Uses the caller's context if there is one, otherwise acquires one from
    /// the engine returned by `engine`.
    pub fn resolve(
        context: Option<&'a mut dyn ScriptContext>,
        engine: impl FnOnce() -> EngineRef,
    ) -> CallResult<Self> {
        match context {
            Some(context) => Ok(Self::borrowed(context)),
            None => Self::acquire(engine()),
        }
    }

    pub fn is_owned(&self) -> bool {
        matches!(self, Self::Owned(_))
    }

    pub fn context(&mut self) -> CallResult<&mut dyn ScriptContext> {
        match self {
            Self::Borrowed(context) => Ok(&mut **context),
            Self::Owned(owned) => owned.context(),
        }
    }
}

impl fmt::Debug for ContextHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Borrowed(_) => f.write_str("ContextHandle::Borrowed"),
            Self::Owned(_) => f.write_str("ContextHandle::Owned"),
        }
    }
}
