//! Script modules and their ordering.
//!
//! Every hook function belongs to the module that compiled it. Modules carry a
//! descriptor with an access mask and a priority, which together decide which
//! events a module can see and in which order its hooks run.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::engine::ScriptFunction;

/// Bit mask restricting which events a module may access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AccessMask(pub u32);

impl AccessMask {
    pub const NONE: Self = Self(0);
    pub const ALL: Self = Self(u32::MAX);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if the masks share at least one bit.
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }
}

/// Static description of a module kind (e.g. "gamemode", "plugin").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDescriptor {
    pub name: String,
    pub access_mask: AccessMask,
    /// Higher priority runs first.
    pub priority: i32,
}

impl ModuleDescriptor {
    pub fn new(name: impl Into<String>, access_mask: AccessMask, priority: i32) -> Self {
        Self {
            name: name.into(),
            access_mask,
            priority,
        }
    }
}

/// A loaded script module.
#[derive(Debug)]
pub struct ScriptModule {
    name: String,
    descriptor: ModuleDescriptor,
}

impl ScriptModule {
    pub fn new(name: impl Into<String>, descriptor: ModuleDescriptor) -> Self {
        Self {
            name: name.into(),
            descriptor,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn descriptor(&self) -> &ModuleDescriptor {
        &self.descriptor
    }

    pub fn access_mask(&self) -> AccessMask {
        self.descriptor.access_mask
    }
}

impl fmt::Display for ScriptModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Shared handle to a module. Identity is the allocation.
pub type ModuleRef = Arc<ScriptModule>;

/// Returns `true` if both sides refer to the same module, or both to none.
pub fn same_module(a: Option<&ModuleRef>, b: Option<&ModuleRef>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

/// Total order used to sort hooks.
///
/// Higher descriptor priority sorts first; ties break on descriptor name, then
/// module name, then module identity. Functions without a module sort last.
pub fn module_cmp(a: Option<&ModuleRef>, b: Option<&ModuleRef>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => {
            if Arc::ptr_eq(a, b) {
                return Ordering::Equal;
            }
            b.descriptor
                .priority
                .cmp(&a.descriptor.priority)
                .then_with(|| a.descriptor.name.cmp(&b.descriptor.name))
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| Arc::as_ptr(a).cmp(&Arc::as_ptr(b)))
        }
    }
}

/// Resolves the module a function belongs to.
///
/// Delegates have no module of their own and report the module of their bound
/// method instead.
pub fn owning_module(function: &dyn ScriptFunction) -> Option<ModuleRef> {
    function
        .module()
        .or_else(|| function.delegate_function().and_then(|bound| bound.module()))
}
