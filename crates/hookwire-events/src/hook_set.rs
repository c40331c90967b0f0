//! Ordered, deduplicated hook collections.
//!
//! Entries are kept sorted by owning module (see [`module_cmp`]) with a stable
//! sort, so hooks of one module stay in the order they were added. The set
//! holds a counted reference to every function it contains.

use std::fmt;

use hookwire_core::{
    FunctionRef, ModuleRef, RetainedFunction, module_cmp, owning_module, same_module,
};

/// One hooked function.
///
/// A delegate entry retains both the delegate and the method it is bound to.
pub struct HookEntry {
    function: RetainedFunction,
    bound: Option<RetainedFunction>,
    module: Option<ModuleRef>,
}

impl HookEntry {
    fn new(function: &FunctionRef) -> Self {
        let bound = function.delegate_function().map(|bound| bound.retain());
        Self {
            module: owning_module(&**function),
            bound,
            function: function.retain(),
        }
    }

    /// The hooked function or delegate.
    pub fn function(&self) -> &FunctionRef {
        self.function.function()
    }

    /// The method a delegate is bound to.
    pub fn bound_function(&self) -> Option<&FunctionRef> {
        self.bound.as_ref().map(RetainedFunction::function)
    }

    /// Module the hook is ordered and grouped by.
    pub fn module(&self) -> Option<&ModuleRef> {
        self.module.as_ref()
    }

    /// Returns `true` for delegate entries.
    pub fn is_delegate(&self) -> bool {
        self.bound.is_some()
    }
}

impl fmt::Debug for HookEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookEntry")
            .field("function", self.function())
            .field("module", &self.module.as_ref().map(|m| m.name()))
            .field("delegate", &self.is_delegate())
            .finish()
    }
}

/// The hooks attached to one event.
#[derive(Debug, Default)]
pub struct HookSet {
    entries: Vec<HookEntry>,
}

impl HookSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `function` unless it is already present.
    ///
    /// Returns `true` if a new entry was added.
    pub fn insert(&mut self, function: &FunctionRef) -> bool {
        if self.contains(function) {
            return false;
        }
        self.entries.push(HookEntry::new(function));
        self.entries
            .sort_by(|a, b| module_cmp(a.module.as_ref(), b.module.as_ref()));
        true
    }

    /// Removes `function`, returning `true` if it was present.
    pub fn remove(&mut self, function: &FunctionRef) -> bool {
        match self.position(function) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Removes every hook owned by `module` and returns how many were removed.
    pub fn remove_module(&mut self, module: &ModuleRef) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|entry| !same_module(entry.module.as_ref(), Some(module)));
        before - self.entries.len()
    }

    /// Removes every hook and returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        removed
    }

    pub fn contains(&self, function: &FunctionRef) -> bool {
        self.position(function).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&HookEntry> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &HookEntry> {
        self.entries.iter()
    }

    fn position(&self, function: &FunctionRef) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.function() == function)
    }
}
