//! Broadcast policy and result types.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use hookwire_core::{FromScriptValue, ScriptValue};

/// Value a hook returns to tell the broadcaster whether it took the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum HookReturnCode {
    /// Keep going.
    #[default]
    Continue = 0,
    /// The hook handled the event.
    Handled = 1,
}

impl HookReturnCode {
    /// Script-side name of the enum.
    pub const ENUM_NAME: &'static str = "HookReturnCode";

    /// Script-side enum values.
    pub const VALUES: [(&'static str, i32); 2] = [("HOOK_CONTINUE", 0), ("HOOK_HANDLED", 1)];

    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Continue),
            1 => Some(Self::Handled),
            _ => None,
        }
    }
}

impl FromScriptValue for HookReturnCode {
    fn from_script_value(value: ScriptValue) -> Option<Self> {
        match value {
            ScriptValue::Enum { value, .. } | ScriptValue::Int32(value) => Self::from_i32(value),
            _ => None,
        }
    }
}

/// Outcome of broadcasting an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookCallResult {
    /// At least one hook did not complete cleanly. Other hooks may still have run.
    Failed,
    /// A hook returned [`HookReturnCode::Handled`].
    Handled,
    /// Every hook that ran returned [`HookReturnCode::Continue`].
    NoneHandled,
}

impl fmt::Display for HookCallResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Failed => "failed",
            Self::Handled => "handled",
            Self::NoneHandled => "none handled",
        };
        f.write_str(name)
    }
}

/// How far a broadcast continues once a hook has handled the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EventStopMode {
    /// Call every hook.
    #[default]
    Never,
    /// Stop right after the first hook that handles the event.
    OnHandled,
    /// Finish the module that handled the event, then stop.
    ModuleHandled,
}

/// Counts broadcasts in progress on one event.
///
/// While the count is non-zero the event's hooks must not change. This only
/// detects reentrancy within a call stack; it does not serialize threads.
#[derive(Debug, Default)]
pub struct InCallCounter(AtomicUsize);

impl InCallCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }

    pub fn is_idle(&self) -> bool {
        self.count() == 0
    }

    /// Marks a broadcast as running until the guard drops.
    pub fn enter(&self) -> InCallGuard<'_> {
        self.0.fetch_add(1, Ordering::AcqRel);
        InCallGuard { counter: self }
    }
}

/// Decrements an [`InCallCounter`] on drop.
#[derive(Debug)]
pub struct InCallGuard<'a> {
    counter: &'a InCallCounter,
}

impl Drop for InCallGuard<'_> {
    fn drop(&mut self) {
        let previous = self.counter.0.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "in-call counter underflow");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hookwire_core::ScriptTypeId;

    #[test]
    fn test_return_code_from_enum_value() {
        let handled = ScriptValue::Enum {
            type_id: ScriptTypeId(1000),
            value: 1,
        };
        assert_eq!(
            HookReturnCode::from_script_value(handled),
            Some(HookReturnCode::Handled)
        );
        assert_eq!(
            HookReturnCode::from_script_value(ScriptValue::Int32(0)),
            Some(HookReturnCode::Continue)
        );
        assert_eq!(HookReturnCode::from_script_value(ScriptValue::Int32(7)), None);
        assert_eq!(HookReturnCode::from_script_value(ScriptValue::Bool(true)), None);
    }

    #[test]
    fn test_in_call_guard_nesting() {
        let counter = InCallCounter::new();
        assert!(counter.is_idle());
        {
            let _outer = counter.enter();
            {
                let _inner = counter.enter();
                assert_eq!(counter.count(), 2);
            }
            assert_eq!(counter.count(), 1);
        }
        assert!(counter.is_idle());
    }
}
