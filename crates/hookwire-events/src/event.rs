//! Named broadcast points.
//!
//! An [`Event`] owns the hooks attached to it and broadcasts one logical call
//! to all of them. Each broadcast follows the event's [`EventStopMode`]:
//!
//! 1. Hooks run in hook set order (grouped by module)
//! 2. Every hook's call result is folded into the overall outcome
//! 3. The first [`HookReturnCode::Handled`] is remembered and may end the
//!    broadcast early, depending on the stop mode
//!
//! ```rust,ignore
//! use hookwire_events::{Event, EventStopMode};
//!
//! let spawn = Event::new("Player", "Spawn")
//!     .with_arguments("Player@ player", [player_type.handle()])
//!     .with_stop_mode(EventStopMode::OnHandled);
//!
//! // After registration, scripts hook it and the host broadcasts.
//! spawn.call(None, CallFlags::NONE, var_args![player]);
//! ```
//!
//! While a broadcast is running its hooks cannot change. Attempts to add or
//! remove hooks from inside a hook are rejected with [`HookError::InCall`].

use std::fmt;
use std::sync::OnceLock;

use parking_lot::RwLock;
use tracing::{Level, debug, error, span, warn};

use hookwire_core::{
    AccessMask, ArgSource, CallError, CallFlags, CallableKind, EngineRef, Funcdef, FunctionRef,
    ModuleRef, ObjectPtr, OwnedContext, ScriptContext, ScriptTypeId, dispatch_with, same_module,
};

use crate::error::{HookError, HookResult};
use crate::hook_set::{HookEntry, HookSet};
use crate::types::{EventStopMode, HookCallResult, HookReturnCode, InCallCounter};

// =============================================================================
// Hook values
// =============================================================================

/// What a script value slot holds.
#[derive(Debug, Clone)]
pub enum ValueSlot {
    /// No value at all.
    Null,
    /// A function value.
    Function(FunctionRef),
    /// A handle that may or may not point at a function.
    Handle(Option<FunctionRef>),
    /// Some other object.
    Object(ObjectPtr),
}

/// A script value offered to [`Event::hook`] or [`Event::unhook`].
#[derive(Debug, Clone)]
pub struct HookValue {
    /// Runtime type id reported by the engine.
    pub type_id: ScriptTypeId,
    pub slot: ValueSlot,
}

impl HookValue {
    /// A function passed by value.
    pub fn function(function: &FunctionRef) -> Self {
        Self {
            type_id: function.script_type(),
            slot: ValueSlot::Function(function.clone()),
        }
    }

    /// A handle of funcdef type `type_id`, possibly null.
    pub fn handle(type_id: ScriptTypeId, function: Option<&FunctionRef>) -> Self {
        Self {
            type_id: type_id.handle(),
            slot: ValueSlot::Handle(function.cloned()),
        }
    }

    pub fn null(type_id: ScriptTypeId) -> Self {
        Self {
            type_id,
            slot: ValueSlot::Null,
        }
    }

    pub fn object(type_id: ScriptTypeId, ptr: ObjectPtr) -> Self {
        Self {
            type_id,
            slot: ValueSlot::Object(ptr),
        }
    }
}

// =============================================================================
// Event
// =============================================================================

/// Engine-side identity of a registered event.
#[derive(Clone)]
pub struct EventBinding {
    pub engine: EngineRef,
    pub funcdef: Funcdef,
    pub funcdef_type: ScriptTypeId,
}

impl fmt::Debug for EventBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBinding")
            .field("funcdef", &self.funcdef.declaration)
            .field("funcdef_type", &self.funcdef_type)
            .finish()
    }
}

/// A named, typed broadcast point with an ordered set of hooks.
pub struct Event {
    category: String,
    name: String,
    arguments: String,
    params: Vec<ScriptTypeId>,
    access_mask: AccessMask,
    stop_mode: EventStopMode,
    binding: OnceLock<EventBinding>,
    hooks: RwLock<HookSet>,
    in_call: InCallCounter,
}

impl Event {
    /// Creates an event without parameters, visible to every module.
    pub fn new(category: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            name: name.into(),
            arguments: String::new(),
            params: Vec::new(),
            access_mask: AccessMask::ALL,
            stop_mode: EventStopMode::default(),
            binding: OnceLock::new(),
            hooks: RwLock::new(HookSet::new()),
            in_call: InCallCounter::new(),
        }
    }

    /// Sets the parameter declaration and types (builder pattern).
    ///
    /// `declaration` is the script text used in the hook funcdef and in
    /// diagnostics, e.g. `"Player@ player, int reason"`.
    pub fn with_arguments(
        mut self,
        declaration: impl Into<String>,
        params: impl Into<Vec<ScriptTypeId>>,
    ) -> Self {
        self.arguments = declaration.into();
        self.params = params.into();
        self
    }

    /// Sets the access mask (builder pattern).
    pub fn with_access_mask(mut self, mask: AccessMask) -> Self {
        self.access_mask = mask;
        self
    }

    /// Sets the stop mode (builder pattern).
    pub fn with_stop_mode(mut self, mode: EventStopMode) -> Self {
        self.stop_mode = mode;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    /// Parameter declaration text.
    pub fn arguments(&self) -> &str {
        &self.arguments
    }

    pub fn params(&self) -> &[ScriptTypeId] {
        &self.params
    }

    pub fn access_mask(&self) -> AccessMask {
        self.access_mask
    }

    pub fn stop_mode(&self) -> EventStopMode {
        self.stop_mode
    }

    /// Returns `Category::Name`.
    pub fn qualified_name(&self) -> String {
        format!("{}::{}", self.category, self.name)
    }

    /// Name of the hook funcdef, e.g. `SpawnHook`.
    pub fn funcdef_name(&self) -> String {
        format!("{}Hook", self.name)
    }

    pub fn binding(&self) -> Option<&EventBinding> {
        self.binding.get()
    }

    pub fn is_registered(&self) -> bool {
        self.binding.get().is_some()
    }

    /// Attaches the event to an engine. Only the first binding takes effect.
    pub(crate) fn bind(&self, binding: EventBinding) -> bool {
        self.binding.set(binding).is_ok()
    }

    /// Number of broadcasts currently running.
    pub fn in_call_count(&self) -> usize {
        self.in_call.count()
    }

    pub fn function_count(&self) -> usize {
        self.hooks.read_recursive().len()
    }

    pub fn function_at(&self, index: usize) -> Option<FunctionRef> {
        self.hooks
            .read_recursive()
            .get(index)
            .map(|entry| entry.function().clone())
    }

    pub fn contains_function(&self, function: &FunctionRef) -> bool {
        self.hooks.read_recursive().contains(function)
    }

    // -------------------------------------------------------------------------
    // Hook set mutation
    // -------------------------------------------------------------------------

    /// Adds a hook. Adding a function that is already hooked succeeds.
    pub fn add_function(&self, function: &FunctionRef) -> HookResult<()> {
        self.ensure_idle("add a hook", false)?;
        if self.hooks.write().insert(function) {
            debug!(
                event = %self.qualified_name(),
                function = %function.qualified_name(),
                "Hooked function"
            );
        }
        Ok(())
    }

    /// Removes a hook. Removing a function that is not hooked succeeds.
    pub fn remove_function(&self, function: &FunctionRef) -> HookResult<()> {
        self.ensure_idle("remove a hook", false)?;
        if self.hooks.write().remove(function) {
            debug!(
                event = %self.qualified_name(),
                function = %function.qualified_name(),
                "Unhooked function"
            );
        }
        Ok(())
    }

    /// Removes every hook owned by `module`.
    pub fn remove_functions_of_module(&self, module: &ModuleRef) -> HookResult<usize> {
        self.ensure_idle("remove module hooks", true)?;
        let removed = self.hooks.write().remove_module(module);
        if removed > 0 {
            debug!(
                event = %self.qualified_name(),
                module = %module.name(),
                removed,
                "Removed module hooks"
            );
        }
        Ok(removed)
    }

    /// Removes every hook.
    pub fn remove_all_functions(&self) -> HookResult<usize> {
        self.ensure_idle("remove all hooks", true)?;
        Ok(self.hooks.write().clear())
    }

    fn ensure_idle(&self, operation: &'static str, bulk: bool) -> HookResult<()> {
        if self.in_call.is_idle() {
            return Ok(());
        }
        if bulk {
            error!(
                event = %self.qualified_name(),
                operation,
                "Hooks must not be removed while the event is being broadcast"
            );
        } else {
            warn!(
                event = %self.qualified_name(),
                operation,
                "Rejected hook change during broadcast"
            );
        }
        Err(HookError::InCall {
            event: self.qualified_name(),
            operation,
        })
    }

    // -------------------------------------------------------------------------
    // Validation
    // -------------------------------------------------------------------------

    /// Checks that `value` is a function compatible with this event's funcdef.
    ///
    /// `scope` names the calling operation in diagnostics.
    pub fn validate_hook_function(
        &self,
        value: &HookValue,
        scope: &'static str,
    ) -> HookResult<FunctionRef> {
        self.resolve_hook_function(value).inspect_err(|err| {
            warn!(event = %self.qualified_name(), scope, error = %err, "Invalid hook function");
        })
    }

    fn resolve_hook_function(&self, value: &HookValue) -> HookResult<FunctionRef> {
        let binding = self
            .binding
            .get()
            .ok_or_else(|| HookError::NotRegistered(self.qualified_name()))?;

        let type_info = binding
            .engine
            .type_info(value.type_id.base())
            .ok_or(HookError::UnknownType(value.type_id))?;
        if !type_info.is_funcdef() {
            return Err(HookError::NotCallable {
                type_name: type_info.name,
            });
        }

        let function = match &value.slot {
            ValueSlot::Null | ValueSlot::Handle(None) => return Err(HookError::NullValue),
            ValueSlot::Function(function) | ValueSlot::Handle(Some(function)) => function,
            ValueSlot::Object(ptr) if ptr.is_null() => return Err(HookError::NullValue),
            ValueSlot::Object(_) => {
                return Err(HookError::NotCallable {
                    type_name: type_info.name,
                });
            }
        };

        if !binding
            .engine
            .is_signature_compatible(&binding.funcdef.signature, &**function)
        {
            return Err(HookError::SignatureMismatch {
                event: binding.funcdef.name.clone(),
                function: describe_function(function),
            });
        }

        Ok(function.clone())
    }

    /// Validates and hooks `value`.
    pub fn try_hook(&self, value: &HookValue) -> HookResult<()> {
        let function = self.validate_hook_function(value, "hook")?;
        self.add_function(&function)
    }

    /// Validates and hooks `value`, reporting success.
    pub fn hook(&self, value: &HookValue) -> bool {
        self.try_hook(value).is_ok()
    }

    /// Validates and unhooks `value`.
    pub fn try_unhook(&self, value: &HookValue) -> HookResult<()> {
        let function = self.validate_hook_function(value, "unhook")?;
        self.remove_function(&function)
    }

    /// Validates and unhooks `value`. Failures are only logged.
    pub fn unhook(&self, value: &HookValue) {
        let _ = self.try_unhook(value);
    }

    // -------------------------------------------------------------------------
    // Broadcast
    // -------------------------------------------------------------------------

    /// Broadcasts to every hook.
    ///
    /// Without a caller context, a context is taken from the first hook's
    /// engine for the duration of the broadcast. An event with no hooks
    /// returns [`HookCallResult::NoneHandled`] without touching any engine.
    pub fn call<'a>(
        &self,
        context: Option<&mut dyn ScriptContext>,
        flags: CallFlags,
        args: impl Into<ArgSource<'a>>,
    ) -> HookCallResult {
        let args = args.into();
        if let Some(context) = context {
            return self.broadcast(context, flags, args);
        }

        let engine = match self.hooks.read_recursive().get(0) {
            Some(entry) => entry.function().engine(),
            None => return HookCallResult::NoneHandled,
        };
        let mut owned = match OwnedContext::acquire(engine) {
            Ok(owned) => owned,
            Err(err) => return self.context_failure(err),
        };
        match owned.context() {
            Ok(context) => self.broadcast(context, flags, args),
            Err(err) => self.context_failure(err),
        }
    }

    fn context_failure(&self, err: CallError) -> HookCallResult {
        warn!(event = %self.qualified_name(), error = %err, "Cannot broadcast event");
        HookCallResult::Failed
    }

    fn broadcast(
        &self,
        context: &mut dyn ScriptContext,
        flags: CallFlags,
        args: ArgSource<'_>,
    ) -> HookCallResult {
        let event = self.qualified_name();
        let span = span!(Level::DEBUG, "broadcast", event = %event);
        let _enter = span.enter();

        let _in_call = self.in_call.enter();
        let hooks = self.hooks.read_recursive();

        let mut success = true;
        let mut return_code = HookReturnCode::Continue;
        let mut last_module: Option<&ModuleRef> = None;

        for entry in hooks.iter() {
            if self.stop_mode == EventStopMode::ModuleHandled
                && return_code == HookReturnCode::Handled
                && last_module.is_some_and(|last| !same_module(Some(last), entry.module()))
            {
                debug!("Event handled by previous module, stopping broadcast");
                break;
            }
            last_module = entry.module();

            let outcome = dispatch_with(
                Some(entry.function()),
                CallableKind::Function,
                Some(&mut *context),
                flags,
                args,
                |callable| {
                    (return_code == HookReturnCode::Continue)
                        .then(|| callable.return_value::<HookReturnCode>())
                },
            );

            match outcome {
                Ok(None) => {}
                Ok(Some(Ok(code))) => return_code = code,
                Ok(Some(Err(err))) => {
                    success = false;
                    warn!(
                        function = %entry.function().qualified_name(),
                        error = %err,
                        "Hook returned no usable return code"
                    );
                }
                Err(err) => {
                    success = false;
                    warn!(
                        function = %entry.function().qualified_name(),
                        error = %err,
                        "Hook call failed"
                    );
                }
            }

            if return_code == HookReturnCode::Handled && self.stop_mode == EventStopMode::OnHandled
            {
                debug!(
                    function = %entry.function().qualified_name(),
                    "Event handled, stopping broadcast"
                );
                break;
            }
        }

        let result = if !success {
            HookCallResult::Failed
        } else if return_code == HookReturnCode::Handled {
            HookCallResult::Handled
        } else {
            HookCallResult::NoneHandled
        };
        debug!(%result, "Broadcast finished");
        result
    }

    // -------------------------------------------------------------------------
    // Diagnostics
    // -------------------------------------------------------------------------

    /// Writes the event and its hooks, one per line.
    pub fn dump_hooked_functions(&self, out: &mut impl fmt::Write) -> fmt::Result {
        writeln!(
            out,
            "Event \"{}::{}({})\"",
            self.category, self.name, self.arguments
        )?;
        for entry in self.hooks.read_recursive().iter() {
            write_entry(out, entry)?;
        }
        writeln!(out, "End functions")
    }
}

fn write_entry(out: &mut impl fmt::Write, entry: &HookEntry) -> fmt::Result {
    let Some(module) = entry.module() else {
        return writeln!(out, "Null module!");
    };
    let function = entry.bound_function().unwrap_or(entry.function());
    writeln!(
        out,
        "Module \"{}\", \"{}::{}\"",
        module.name(),
        function.namespace(),
        function.name()
    )
}

/// Names a function for diagnostics; delegates are named by receiver type and method.
fn describe_function(function: &FunctionRef) -> String {
    match (function.delegate_function(), function.delegate_object_type()) {
        (Some(method), Some(object_type)) => format!(
            "{}::{}::{}",
            object_type.namespace,
            object_type.name,
            method.name()
        ),
        _ => format!("{}::{}", function.namespace(), function.name()),
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("name", &self.qualified_name())
            .field("arguments", &self.arguments)
            .field("stop_mode", &self.stop_mode)
            .field("hooks", &self.function_count())
            .field("in_call", &self.in_call.count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use hookwire_core::testing::{MockContext, MockEngine, MockFunction};
    use hookwire_core::{
        ArgumentList, ExecutionStatus, ModuleDescriptor, ScriptEngine, ScriptModule, ScriptValue,
        Signature, TypeFlags, TypeInfo, var_args,
    };

    type CallLog = Arc<Mutex<Vec<&'static str>>>;

    struct Fixture {
        engine: Arc<MockEngine>,
        return_code: ScriptTypeId,
        log: CallLog,
    }

    impl Fixture {
        fn new() -> Self {
            let engine = MockEngine::new();
            let return_code = engine
                .register_enum(HookReturnCode::ENUM_NAME, &HookReturnCode::VALUES)
                .unwrap();
            Self {
                engine,
                return_code,
                log: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn bind(&self, event: Event) -> Arc<Event> {
            let funcdef = Funcdef {
                namespace: String::new(),
                name: event.funcdef_name(),
                declaration: format!("HookReturnCode {}({})", event.funcdef_name(), event.arguments()),
                signature: Signature::new(self.return_code, event.params().to_vec()),
            };
            let funcdef_type = self.engine.register_funcdef(&funcdef).unwrap();
            assert!(event.bind(EventBinding {
                engine: self.engine.clone(),
                funcdef,
                funcdef_type,
            }));
            Arc::new(event)
        }

        fn event(&self, mode: EventStopMode) -> Arc<Event> {
            self.bind(
                Event::new("Player", "Spawn")
                    .with_arguments("int id", [ScriptTypeId::INT32])
                    .with_stop_mode(mode),
            )
        }

        /// A hook taking one int that logs its name and returns `code`.
        fn hook(&self, name: &'static str, module: &ModuleRef, code: HookReturnCode) -> FunctionRef {
            let log = self.log.clone();
            let return_code = self.return_code;
            self.engine
                .function(name)
                .module(module)
                .params([ScriptTypeId::INT32])
                .returns(return_code)
                .body(move |_| {
                    log.lock().push(name);
                    Ok(Some(ScriptValue::Enum {
                        type_id: return_code,
                        value: code as i32,
                    }))
                })
                .build()
        }

        fn calls(&self) -> Vec<&'static str> {
            self.log.lock().clone()
        }
    }

    fn module(name: &str) -> ModuleRef {
        Arc::new(ScriptModule::new(
            name,
            ModuleDescriptor::new("plugin", AccessMask::ALL, 0),
        ))
    }

    fn three_hooks(fixture: &Fixture, event: &Event) {
        let owner = module("x");
        for (name, code) in [
            ("hook1", HookReturnCode::Continue),
            ("hook2", HookReturnCode::Handled),
            ("hook3", HookReturnCode::Continue),
        ] {
            event.add_function(&fixture.hook(name, &owner, code)).unwrap();
        }
    }

    #[test]
    fn test_stop_mode_never_calls_every_hook() {
        let fixture = Fixture::new();
        let event = fixture.event(EventStopMode::Never);
        three_hooks(&fixture, &event);

        let result = event.call(None, CallFlags::NONE, var_args![7i32]);

        assert_eq!(result, HookCallResult::Handled);
        assert_eq!(fixture.calls(), ["hook1", "hook2", "hook3"]);
    }

    #[test]
    fn test_stop_mode_on_handled_stops_after_handler() {
        let fixture = Fixture::new();
        let event = fixture.event(EventStopMode::OnHandled);
        three_hooks(&fixture, &event);

        let result = event.call(None, CallFlags::NONE, var_args![7i32]);

        assert_eq!(result, HookCallResult::Handled);
        assert_eq!(fixture.calls(), ["hook1", "hook2"]);
    }

    #[test]
    fn test_stop_mode_module_handled_finishes_module() {
        let fixture = Fixture::new();
        let event = fixture.event(EventStopMode::ModuleHandled);
        let module_x = module("x");
        let module_y = module("y");

        event
            .add_function(&fixture.hook("hook3", &module_y, HookReturnCode::Continue))
            .unwrap();
        event
            .add_function(&fixture.hook("hook1", &module_x, HookReturnCode::Handled))
            .unwrap();
        event
            .add_function(&fixture.hook("hook4", &module_y, HookReturnCode::Continue))
            .unwrap();
        event
            .add_function(&fixture.hook("hook2", &module_x, HookReturnCode::Continue))
            .unwrap();

        let result = event.call(None, CallFlags::NONE, var_args![7i32]);

        assert_eq!(result, HookCallResult::Handled);
        assert_eq!(fixture.calls(), ["hook1", "hook2"]);
    }

    #[test]
    fn test_failed_hook_taints_result() {
        let fixture = Fixture::new();
        let event = fixture.event(EventStopMode::Never);
        let owner = module("x");

        let bad_params = fixture
            .engine
            .function("hook2")
            .module(&owner)
            .params([ScriptTypeId::BOOL])
            .returns(fixture.return_code)
            .build();
        event
            .add_function(&fixture.hook("hook1", &owner, HookReturnCode::Continue))
            .unwrap();
        event.add_function(&bad_params).unwrap();
        event
            .add_function(&fixture.hook("hook3", &owner, HookReturnCode::Handled))
            .unwrap();

        let result = event.call(None, CallFlags::NONE, var_args![7i32]);

        assert_eq!(result, HookCallResult::Failed);
        assert_eq!(fixture.calls(), ["hook1", "hook3"]);
    }

    #[test]
    fn test_missing_return_code_taints_result() {
        let fixture = Fixture::new();
        let event = fixture.event(EventStopMode::Never);
        let silent = fixture
            .engine
            .function("silent")
            .params([ScriptTypeId::INT32])
            .returns(fixture.return_code)
            .build();
        event.add_function(&silent).unwrap();

        assert_eq!(
            event.call(None, CallFlags::NONE, var_args![1i32]),
            HookCallResult::Failed
        );
    }

    #[test]
    fn test_execution_failure_does_not_stop_broadcast() {
        let fixture = Fixture::new();
        let event = fixture.event(EventStopMode::Never);
        let owner = module("x");
        let throwing = fixture
            .engine
            .function("throwing")
            .module(&owner)
            .params([ScriptTypeId::INT32])
            .returns(fixture.return_code)
            .body(|_| Err(ExecutionStatus::Exception))
            .build();
        event.add_function(&throwing).unwrap();
        event
            .add_function(&fixture.hook("after", &owner, HookReturnCode::Continue))
            .unwrap();

        assert_eq!(
            event.call(None, CallFlags::NONE, var_args![1i32]),
            HookCallResult::Failed
        );
        assert_eq!(fixture.calls(), ["after"]);
    }

    #[test]
    fn test_broadcast_context_lifecycle() {
        let fixture = Fixture::new();
        let event = fixture.event(EventStopMode::Never);

        assert_eq!(
            event.call(None, CallFlags::NONE, var_args![1i32]),
            HookCallResult::NoneHandled
        );
        assert_eq!(fixture.engine.contexts_acquired(), 0);

        event
            .add_function(&fixture.hook("hook1", &module("x"), HookReturnCode::Continue))
            .unwrap();
        let result = event.call(None, CallFlags::NONE, var_args![true]);

        assert_eq!(result, HookCallResult::Failed);
        assert_eq!(fixture.engine.contexts_acquired(), 1);
        assert_eq!(fixture.engine.contexts_released(), 1);
    }

    #[test]
    fn test_broadcast_without_pooled_context_fails() {
        let fixture = Fixture::new();
        let event = fixture.event(EventStopMode::Never);
        event
            .add_function(&fixture.hook("hook1", &module("x"), HookReturnCode::Continue))
            .unwrap();
        fixture.engine.set_pool_exhausted(true);

        assert_eq!(
            event.call(None, CallFlags::NONE, var_args![1i32]),
            HookCallResult::Failed
        );
        assert!(fixture.calls().is_empty());
    }

    #[test]
    fn test_broadcast_with_caller_context_and_list() {
        let fixture = Fixture::new();
        let event = fixture.event(EventStopMode::Never);
        event
            .add_function(&fixture.hook("hook1", &module("x"), HookReturnCode::Continue))
            .unwrap();

        let mut context = MockContext::default();
        let args = ArgumentList::new().with(3i32);
        let result = event.call(Some(&mut context), CallFlags::NONE, &args);

        assert_eq!(result, HookCallResult::NoneHandled);
        assert_eq!(fixture.engine.contexts_acquired(), 0);
        assert_eq!(context.arguments(), vec![Some(ScriptValue::Int32(3))]);
    }

    #[test]
    fn test_mutation_rejected_during_broadcast() {
        let fixture = Fixture::new();
        let event = fixture.event(EventStopMode::Never);
        let owner = module("x");
        let first = fixture.hook("first", &owner, HookReturnCode::Continue);
        let extra = fixture.hook("extra", &owner, HookReturnCode::Continue);

        let slot: Arc<std::sync::OnceLock<Arc<Event>>> = Arc::default();
        let rejections = Arc::new(Mutex::new(Vec::new()));
        let reentrant = {
            let slot = slot.clone();
            let rejections = rejections.clone();
            let first = first.clone();
            let owner = owner.clone();
            let return_code = fixture.return_code;
            fixture
                .engine
                .function("reentrant")
                .module(&owner)
                .params([ScriptTypeId::INT32])
                .returns(return_code)
                .body(move |_| {
                    if let Some(event) = slot.get() {
                        let mut rejections = rejections.lock();
                        rejections.push(event.add_function(&extra));
                        rejections.push(event.remove_function(&first));
                        rejections.push(event.remove_functions_of_module(&owner).map(|_| ()));
                        rejections.push(event.remove_all_functions().map(|_| ()));
                    }
                    Ok(Some(ScriptValue::Enum {
                        type_id: return_code,
                        value: 0,
                    }))
                })
                .build()
        };
        event.add_function(&first).unwrap();
        event.add_function(&reentrant).unwrap();
        assert!(slot.set(event.clone()).is_ok());

        let result = event.call(None, CallFlags::NONE, var_args![1i32]);

        assert_eq!(result, HookCallResult::NoneHandled);
        let rejections = rejections.lock();
        assert_eq!(rejections.len(), 4);
        assert!(
            rejections
                .iter()
                .all(|r| matches!(r, Err(HookError::InCall { .. })))
        );
        assert_eq!(event.function_count(), 2);
        assert_eq!(event.function_at(0), Some(first.clone()));
        assert_eq!(event.function_at(1), Some(reentrant.clone()));
        assert_eq!(event.in_call_count(), 0);
    }

    #[test]
    fn test_hook_validates_and_dedups() {
        let fixture = Fixture::new();
        let event = fixture.event(EventStopMode::Never);
        let function = fixture.hook("hook1", &module("x"), HookReturnCode::Continue);

        assert!(event.hook(&HookValue::function(&function)));
        assert!(event.hook(&HookValue::function(&function)));

        assert_eq!(event.function_count(), 1);
        assert_eq!(MockFunction::of(&function).unwrap().ref_count(), 1);

        event.unhook(&HookValue::function(&function));
        assert_eq!(event.function_count(), 0);
        assert_eq!(MockFunction::of(&function).unwrap().ref_count(), 0);
    }

    #[test]
    fn test_hook_through_handle() {
        let fixture = Fixture::new();
        let event = fixture.event(EventStopMode::Never);
        let function = fixture.hook("hook1", &module("x"), HookReturnCode::Continue);
        let funcdef_type = event.binding().unwrap().funcdef_type;

        assert_eq!(
            event.try_hook(&HookValue::handle(funcdef_type, None)),
            Err(HookError::NullValue)
        );
        assert!(event.hook(&HookValue::handle(funcdef_type, Some(&function))));
        assert!(event.contains_function(&function));
    }

    #[test]
    fn test_hook_rejects_non_function() {
        let fixture = Fixture::new();
        let event = fixture.event(EventStopMode::Never);
        let player = fixture.engine.register_type("Player", TypeFlags::REF);

        let value = HookValue::object(player, ObjectPtr::new(0x40));
        assert!(!event.hook(&value));
        assert_eq!(
            event.try_hook(&value),
            Err(HookError::NotCallable {
                type_name: "Player".to_string()
            })
        );
        assert_eq!(event.function_count(), 0);
    }

    #[test]
    fn test_hook_rejects_unknown_and_null() {
        let fixture = Fixture::new();
        let event = fixture.event(EventStopMode::Never);
        let funcdef_type = event.binding().unwrap().funcdef_type;

        assert_eq!(
            event.try_hook(&HookValue::null(ScriptTypeId(9999))),
            Err(HookError::UnknownType(ScriptTypeId(9999)))
        );
        assert_eq!(
            event.try_hook(&HookValue::null(funcdef_type)),
            Err(HookError::NullValue)
        );
    }

    #[test]
    fn test_hook_rejects_signature_mismatch() {
        let fixture = Fixture::new();
        let event = fixture.event(EventStopMode::Never);
        let wrong = fixture
            .engine
            .function("OnSpawn")
            .namespace("Game")
            .params([ScriptTypeId::BOOL])
            .returns(fixture.return_code)
            .build();

        assert_eq!(
            event.try_hook(&HookValue::function(&wrong)),
            Err(HookError::SignatureMismatch {
                event: "SpawnHook".to_string(),
                function: "Game::OnSpawn".to_string(),
            })
        );
        assert_eq!(event.function_count(), 0);
    }

    #[test]
    fn test_signature_mismatch_names_delegate_receiver() {
        let fixture = Fixture::new();
        let event = fixture.event(EventStopMode::Never);
        let method = fixture.engine.function("OnTick").build();
        let timer = fixture.engine.register_type("Timer", TypeFlags::REF);
        let delegate = fixture.engine.delegate(
            &method,
            ObjectPtr::new(0x10),
            TypeInfo::new(timer, "Timer", TypeFlags::REF).in_namespace("Util"),
        );

        assert_eq!(
            event.try_hook(&HookValue::function(&delegate)),
            Err(HookError::SignatureMismatch {
                event: "SpawnHook".to_string(),
                function: "Util::Timer::OnTick".to_string(),
            })
        );
    }

    #[test]
    fn test_hook_before_registration() {
        let fixture = Fixture::new();
        let event = Event::new("Player", "Spawn");
        let function = fixture.hook("hook1", &module("x"), HookReturnCode::Continue);

        assert_eq!(
            event.try_hook(&HookValue::function(&function)),
            Err(HookError::NotRegistered("Player::Spawn".to_string()))
        );
    }

    #[test]
    fn test_delegate_hook_runs_bound_method() {
        let fixture = Fixture::new();
        let event = fixture.event(EventStopMode::Never);
        let owner = module("x");
        let method = fixture.hook("method", &owner, HookReturnCode::Handled);
        let timer = fixture.engine.register_type("Timer", TypeFlags::REF);
        let delegate = fixture.engine.delegate(
            &method,
            ObjectPtr::new(0x10),
            TypeInfo::new(timer, "Timer", TypeFlags::REF),
        );

        assert!(event.hook(&HookValue::function(&delegate)));
        assert_eq!(
            event.call(None, CallFlags::NONE, var_args![1i32]),
            HookCallResult::Handled
        );
        assert_eq!(fixture.calls(), ["method"]);

        assert_eq!(event.remove_all_functions(), Ok(1));
        assert_eq!(MockFunction::of(&delegate).unwrap().ref_count(), 0);
        assert_eq!(MockFunction::of(&method).unwrap().ref_count(), 0);
    }

    #[test]
    fn test_stop_mode_module_handled_delegate_in_same_module() {
        let fixture = Fixture::new();
        let event = fixture.event(EventStopMode::ModuleHandled);
        let module_x = module("x");
        let module_y = module("y");
        let method = fixture.hook("meth", &module_x, HookReturnCode::Continue);
        let timer = fixture.engine.register_type("Timer", TypeFlags::REF);
        let delegate = fixture.engine.delegate(
            &method,
            ObjectPtr::new(0x20),
            TypeInfo::new(timer, "Timer", TypeFlags::REF),
        );

        event
            .add_function(&fixture.hook("h1", &module_x, HookReturnCode::Handled))
            .unwrap();
        assert!(event.hook(&HookValue::function(&delegate)));
        event
            .add_function(&fixture.hook("h3", &module_y, HookReturnCode::Continue))
            .unwrap();

        let result = event.call(None, CallFlags::NONE, var_args![7i32]);

        assert_eq!(result, HookCallResult::Handled);
        assert_eq!(fixture.calls(), ["h1", "meth"]);
    }

    #[test]
    fn test_dump_hooked_functions() {
        let fixture = Fixture::new();
        let event = fixture.event(EventStopMode::Never);
        let owner = module("maps/de_dust");
        let function = fixture
            .engine
            .function("OnSpawn")
            .namespace("Game")
            .module(&owner)
            .params([ScriptTypeId::INT32])
            .returns(fixture.return_code)
            .build();
        let loose = fixture
            .engine
            .function("Loose")
            .params([ScriptTypeId::INT32])
            .returns(fixture.return_code)
            .build();
        event.add_function(&function).unwrap();
        event.add_function(&loose).unwrap();

        let mut out = String::new();
        event.dump_hooked_functions(&mut out).unwrap();

        assert_eq!(
            out,
            "Event \"Player::Spawn(int id)\"\n\
             Module \"maps/de_dust\", \"Game::OnSpawn\"\n\
             Null module!\n\
             End functions\n"
        );
    }
}
