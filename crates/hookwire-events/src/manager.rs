//! Event registry.
//!
//! The [`EventManager`] owns every event exposed to scripts. It registers the
//! hook funcdefs with the engine, resolves event names for script callers, and
//! removes hooks in bulk when modules unload.

use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use tracing::{debug, error, info};

use hookwire_core::{AccessMask, EngineRef, Funcdef, ModuleRef, ScriptTypeId, Signature};

use crate::error::{HookError, HookResult};
use crate::event::{Event, EventBinding, HookValue};
use crate::types::HookReturnCode;

pub struct EventManager {
    engine: EngineRef,
    namespace: String,
    events: RwLock<Vec<Arc<Event>>>,
    return_code_type: OnceLock<ScriptTypeId>,
}

impl EventManager {
    /// Creates a manager whose events live under `namespace` in scripts.
    pub fn new(engine: EngineRef, namespace: &str) -> Self {
        Self {
            engine,
            namespace: namespace.trim().to_string(),
            events: RwLock::new(Vec::new()),
            return_code_type: OnceLock::new(),
        }
    }

    pub fn engine(&self) -> &EngineRef {
        &self.engine
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Type id of the registered `HookReturnCode` enum.
    pub fn return_code_type(&self) -> Option<ScriptTypeId> {
        self.return_code_type.get().copied()
    }

    /// Adds an event. Adding the same event twice is a no-op.
    pub fn add_event(&self, event: Arc<Event>) -> HookResult<()> {
        if event.access_mask().is_empty() {
            return Err(HookError::InvalidEvent {
                event: event.qualified_name(),
                reason: "access mask is empty",
            });
        }

        let mut events = self.events.write();
        if events.iter().any(|known| Arc::ptr_eq(known, &event)) {
            return Ok(());
        }
        if events.len() >= u32::MAX as usize {
            return Err(HookError::TooManyEvents);
        }

        debug!(event = %event.qualified_name(), "Added event");
        events.push(event);
        Ok(())
    }

    pub fn event_count(&self) -> usize {
        self.events.read().len()
    }

    /// Snapshot of all events in insertion order.
    pub fn events(&self) -> Vec<Arc<Event>> {
        self.events.read().clone()
    }

    /// Registers the hook return code enum and one hook funcdef per event.
    ///
    /// Events that are already registered are skipped, so this can be called
    /// again after adding more events.
    pub fn register_events(&self) -> HookResult<()> {
        // Held for the whole pass so concurrent callers register the enum and
        // each funcdef exactly once.
        let events = self.events.write();
        let return_code = match self.return_code_type.get() {
            Some(id) => *id,
            None => {
                let id = self
                    .engine
                    .register_enum(HookReturnCode::ENUM_NAME, &HookReturnCode::VALUES)?;
                let _ = self.return_code_type.set(id);
                id
            }
        };

        let mut registered = 0usize;
        for event in events.iter().filter(|event| !event.is_registered()) {
            let name = event.funcdef_name();
            let funcdef = Funcdef {
                namespace: String::new(),
                declaration: format!(
                    "{} {}({})",
                    HookReturnCode::ENUM_NAME,
                    name,
                    event.arguments()
                ),
                name,
                signature: Signature::new(return_code, event.params().to_vec()),
            };
            let funcdef_type = self.engine.register_funcdef(&funcdef)?;
            debug!(
                event = %event.qualified_name(),
                funcdef = %funcdef.declaration,
                "Registered event"
            );
            event.bind(EventBinding {
                engine: self.engine.clone(),
                funcdef,
                funcdef_type,
            });
            registered += 1;
        }

        info!(registered, total = events.len(), "Events registered");
        Ok(())
    }

    /// Looks up an event by position.
    ///
    /// `caller` is the module asking; its access mask must overlap the
    /// event's. Without a caller every event is accessible.
    pub fn event_by_index(&self, index: usize, caller: Option<&ModuleRef>) -> HookResult<Arc<Event>> {
        let event = self
            .events
            .read()
            .get(index)
            .cloned()
            .ok_or_else(|| HookError::EventNotFound(format!("#{index}")))?;
        self.check_access(&event, caller)?;
        Ok(event)
    }

    /// Looks up an event by `[Namespace::]Category::Name`.
    ///
    /// The manager's own namespace may be omitted.
    pub fn find_event_by_name(&self, name: &str, caller: Option<&ModuleRef>) -> HookResult<Arc<Event>> {
        let (namespace, event_name) = name.rsplit_once("::").unwrap_or(("", name));
        let category = self.strip_namespace(namespace);

        let event = self
            .events
            .read()
            .iter()
            .find(|event| event.category() == category && event.name() == event_name)
            .cloned()
            .ok_or_else(|| HookError::EventNotFound(name.to_string()))?;
        self.check_access(&event, caller)?;
        Ok(event)
    }

    /// Finds `name` and hooks `value` to it.
    pub fn hook_event(&self, name: &str, value: &HookValue, caller: Option<&ModuleRef>) -> HookResult<()> {
        self.find_for_hooking(name, caller)?.try_hook(value)
    }

    /// Finds `name` and unhooks `value` from it.
    pub fn unhook_event(&self, name: &str, value: &HookValue, caller: Option<&ModuleRef>) -> HookResult<()> {
        self.find_for_hooking(name, caller)?.try_unhook(value)
    }

    /// Removes `module`'s hooks from every event and returns how many were removed.
    pub fn unhook_module_functions(&self, module: &ModuleRef) -> usize {
        self.events
            .read()
            .iter()
            .filter_map(|event| event.remove_functions_of_module(module).ok())
            .sum()
    }

    /// Removes every hook from every event.
    pub fn unhook_all_functions(&self) -> usize {
        self.events
            .read()
            .iter()
            .filter_map(|event| event.remove_all_functions().ok())
            .sum()
    }

    /// Writes every event and its hooks.
    pub fn dump_hooked_functions(&self, out: &mut impl fmt::Write) -> fmt::Result {
        for event in self.events.read().iter() {
            event.dump_hooked_functions(out)?;
        }
        Ok(())
    }

    fn find_for_hooking(&self, name: &str, caller: Option<&ModuleRef>) -> HookResult<Arc<Event>> {
        self.find_event_by_name(name, caller).inspect_err(|err| {
            if matches!(err, HookError::EventNotFound(_)) {
                error!(event = name, "Couldn't find event");
            }
        })
    }

    fn strip_namespace<'n>(&self, namespace: &'n str) -> &'n str {
        if self.namespace.is_empty() {
            return namespace;
        }
        if namespace == self.namespace {
            return "";
        }
        namespace
            .strip_prefix(self.namespace.as_str())
            .and_then(|rest| rest.strip_prefix("::"))
            .unwrap_or(namespace)
    }

    fn check_access(&self, event: &Event, caller: Option<&ModuleRef>) -> HookResult<()> {
        let mask = caller.map_or(AccessMask::ALL, |module| module.access_mask());
        if event.access_mask().intersects(mask) {
            return Ok(());
        }

        let module = caller.map(|m| m.name().to_string()).unwrap_or_default();
        debug!(
            event = %event.qualified_name(),
            module = %module,
            "Access denied for event"
        );
        Err(HookError::AccessDenied {
            module,
            event: event.qualified_name(),
        })
    }
}

impl Drop for EventManager {
    fn drop(&mut self) {
        self.unhook_all_functions();
    }
}

impl fmt::Debug for EventManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventManager")
            .field("namespace", &self.namespace)
            .field("event_count", &self.event_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hookwire_core::testing::{MockEngine, MockFunction};
    use hookwire_core::{
        CallFlags, FunctionRef, ModuleDescriptor, ScriptModule, ScriptValue, var_args,
    };

    use crate::types::{EventStopMode, HookCallResult};

    fn module(name: &str, mask: u32) -> ModuleRef {
        Arc::new(ScriptModule::new(
            name,
            ModuleDescriptor::new("plugin", AccessMask(mask), 0),
        ))
    }

    fn manager_with_events(engine: &Arc<MockEngine>) -> EventManager {
        let manager = EventManager::new(engine.clone(), "  Events ");
        manager
            .add_event(Arc::new(
                Event::new("Player", "Spawn").with_arguments("int id", [ScriptTypeId::INT32]),
            ))
            .unwrap();
        manager
            .add_event(Arc::new(
                Event::new("Admin", "Kick")
                    .with_access_mask(AccessMask(0b10))
                    .with_stop_mode(EventStopMode::OnHandled),
            ))
            .unwrap();
        manager.register_events().unwrap();
        manager
    }

    fn spawn_hook(engine: &Arc<MockEngine>, manager: &EventManager, owner: &ModuleRef) -> FunctionRef {
        let return_code = manager.return_code_type().unwrap();
        engine
            .function("OnSpawn")
            .module(owner)
            .params([ScriptTypeId::INT32])
            .returns(return_code)
            .body(move |_| {
                Ok(Some(ScriptValue::Enum {
                    type_id: return_code,
                    value: 1,
                }))
            })
            .build()
    }

    #[test]
    fn test_namespace_is_trimmed() {
        let engine = MockEngine::new();
        let manager = EventManager::new(engine, " Events\t");
        assert_eq!(manager.namespace(), "Events");
    }

    #[test]
    fn test_add_event_is_idempotent() {
        let engine = MockEngine::new();
        let manager = EventManager::new(engine, "Events");
        let event = Arc::new(Event::new("Player", "Spawn"));

        manager.add_event(event.clone()).unwrap();
        manager.add_event(event).unwrap();

        assert_eq!(manager.event_count(), 1);
    }

    #[test]
    fn test_add_event_rejects_empty_mask() {
        let engine = MockEngine::new();
        let manager = EventManager::new(engine, "Events");
        let event = Arc::new(Event::new("Player", "Spawn").with_access_mask(AccessMask::NONE));

        assert!(matches!(
            manager.add_event(event),
            Err(HookError::InvalidEvent { .. })
        ));
    }

    #[test]
    fn test_register_events_declares_funcdefs() {
        let engine = MockEngine::new();
        let manager = manager_with_events(&engine);

        let enums = engine.registered_enums();
        assert_eq!(enums.len(), 1);
        assert_eq!(enums[0].0, "HookReturnCode");
        assert_eq!(
            enums[0].1,
            vec![("HOOK_CONTINUE".to_string(), 0), ("HOOK_HANDLED".to_string(), 1)]
        );

        let spawn = manager.find_event_by_name("Player::Spawn", None).unwrap();
        let binding = spawn.binding().unwrap();
        assert_eq!(binding.funcdef.declaration, "HookReturnCode SpawnHook(int id)");
        assert_eq!(
            binding.funcdef.signature,
            Signature::new(manager.return_code_type().unwrap(), vec![ScriptTypeId::INT32])
        );
        assert!(engine.funcdef_type("KickHook").is_some());

        // A second call registers nothing new.
        manager.register_events().unwrap();
        assert_eq!(engine.registered_enums().len(), 1);
        assert_eq!(engine.registered_funcdefs().len(), 2);
    }

    #[test]
    fn test_concurrent_register_events_registers_once() {
        let engine = MockEngine::new();
        let manager = EventManager::new(engine.clone(), "Events");
        manager
            .add_event(Arc::new(Event::new("Player", "Spawn")))
            .unwrap();

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| manager.register_events().unwrap());
            }
        });

        assert_eq!(engine.registered_enums().len(), 1);
        assert_eq!(engine.registered_funcdefs().len(), 1);
        assert!(manager.return_code_type().is_some());
    }

    #[test]
    fn test_find_event_by_name_namespaces() {
        let engine = MockEngine::new();
        let manager = manager_with_events(&engine);

        for name in ["Player::Spawn", "Events::Player::Spawn"] {
            let event = manager.find_event_by_name(name, None).unwrap();
            assert_eq!(event.qualified_name(), "Player::Spawn");
        }
        assert_eq!(
            manager.find_event_by_name("Spawn", None).unwrap_err(),
            HookError::EventNotFound("Spawn".to_string())
        );
        assert!(manager.find_event_by_name("Other::Player::Spawn", None).is_err());
    }

    #[test]
    fn test_access_mask_filters_callers() {
        let engine = MockEngine::new();
        let manager = manager_with_events(&engine);
        let plugin = module("plugin", 0b01);
        let admin = module("admin", 0b10);

        assert!(matches!(
            manager.find_event_by_name("Admin::Kick", Some(&plugin)),
            Err(HookError::AccessDenied { .. })
        ));
        assert!(manager.find_event_by_name("Admin::Kick", Some(&admin)).is_ok());
        assert!(manager.event_by_index(1, Some(&plugin)).is_err());
        assert!(manager.event_by_index(0, Some(&plugin)).is_ok());
        assert!(matches!(
            manager.event_by_index(5, None),
            Err(HookError::EventNotFound(_))
        ));
    }

    #[test]
    fn test_hook_event_by_name() {
        let engine = MockEngine::new();
        let manager = manager_with_events(&engine);
        let owner = module("plugin", u32::MAX);
        let function = spawn_hook(&engine, &manager, &owner);
        let value = HookValue::function(&function);

        manager
            .hook_event("Events::Player::Spawn", &value, Some(&owner))
            .unwrap();
        let spawn = manager.find_event_by_name("Player::Spawn", None).unwrap();
        assert_eq!(spawn.function_count(), 1);
        assert_eq!(
            spawn.call(None, CallFlags::NONE, var_args![1i32]),
            HookCallResult::Handled
        );

        assert_eq!(
            manager.hook_event("Player::Missing", &value, None),
            Err(HookError::EventNotFound("Player::Missing".to_string()))
        );

        manager.unhook_event("Player::Spawn", &value, None).unwrap();
        assert_eq!(spawn.function_count(), 0);
    }

    #[test]
    fn test_unhook_module_functions() {
        let engine = MockEngine::new();
        let manager = manager_with_events(&engine);
        let leaving = module("leaving", u32::MAX);
        let staying = module("staying", u32::MAX);
        let spawn = manager.find_event_by_name("Player::Spawn", None).unwrap();

        spawn.add_function(&spawn_hook(&engine, &manager, &leaving)).unwrap();
        spawn.add_function(&spawn_hook(&engine, &manager, &staying)).unwrap();

        assert_eq!(manager.unhook_module_functions(&leaving), 1);
        assert_eq!(spawn.function_count(), 1);
        assert_eq!(manager.unhook_all_functions(), 1);
        assert_eq!(spawn.function_count(), 0);
    }

    #[test]
    fn test_drop_releases_hooks() {
        let engine = MockEngine::new();
        let manager = manager_with_events(&engine);
        let owner = module("plugin", u32::MAX);
        let function = spawn_hook(&engine, &manager, &owner);

        manager
            .hook_event("Player::Spawn", &HookValue::function(&function), None)
            .unwrap();
        assert_eq!(MockFunction::of(&function).unwrap().ref_count(), 1);

        drop(manager);
        assert_eq!(MockFunction::of(&function).unwrap().ref_count(), 0);
    }

    #[test]
    fn test_dump_lists_every_event() {
        let engine = MockEngine::new();
        let manager = manager_with_events(&engine);

        let mut out = String::new();
        manager.dump_hooked_functions(&mut out).unwrap();

        assert_eq!(
            out,
            "Event \"Player::Spawn(int id)\"\nEnd functions\n\
             Event \"Admin::Kick()\"\nEnd functions\n"
        );
    }
}
