//! Runtime wiring: configuration, logging and the event registry lifecycle.
//!
//! ```rust,ignore
//! use hookwire_runtime::HookRuntime;
//!
//! let runtime = HookRuntime::load(engine)?;
//! let spawn = runtime.register_event(
//!     Event::new("Player", "Spawn").with_arguments("int id", [ScriptTypeId::INT32]),
//! )?;
//! runtime.start()?;
//!
//! // scripts hook through runtime.events().hook_event(..)
//! spawn.call(None, CallFlags::NONE, var_args![7i32]);
//!
//! runtime.shutdown();
//! ```

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};

use hookwire_core::{EngineRef, ModuleRef};
use hookwire_events::{Event, EventManager};

use crate::config::{ConfigLoader, HookwireConfig};
use crate::error::RuntimeResult;
use crate::logging;

/// Owns the event registry for one script engine.
///
/// Events are added with [`register_event`](Self::register_event) and
/// declared to the engine by [`start`](Self::start). Events added after
/// `start` are declared immediately.
pub struct HookRuntime {
    config: HookwireConfig,
    events: EventManager,
    started: AtomicBool,
}

impl HookRuntime {
    /// Creates a runtime from an already loaded configuration.
    ///
    /// Installs the configured logging subscriber unless one is already set.
    pub fn new(config: HookwireConfig, engine: EngineRef) -> Self {
        logging::init_from_config(&config.logging);

        let events = EventManager::new(engine, &config.events.namespace);
        info!(
            namespace = %events.namespace(),
            log_level = %config.logging.level,
            "Runtime initialized from configuration"
        );

        Self {
            config,
            events,
            started: AtomicBool::new(false),
        }
    }

    /// Loads configuration from the current directory and environment.
    pub fn load(engine: EngineRef) -> RuntimeResult<Self> {
        Self::builder().build(engine)
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    pub fn config(&self) -> &HookwireConfig {
        &self.config
    }

    /// The event registry scripts hook into.
    pub fn events(&self) -> &EventManager {
        &self.events
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Adds an event and returns the shared handle the host broadcasts through.
    pub fn register_event(&self, event: Event) -> RuntimeResult<Arc<Event>> {
        let event = Arc::new(event);
        self.events.add_event(event.clone())?;
        if self.is_started() {
            self.events.register_events()?;
        }
        Ok(event)
    }

    /// Declares the hook return code and every event's funcdef to the engine.
    pub fn start(&self) -> RuntimeResult<()> {
        if self.started.swap(true, Ordering::AcqRel) {
            warn!("Runtime is already started");
            return Ok(());
        }

        if let Err(err) = self.events.register_events() {
            self.started.store(false, Ordering::Release);
            return Err(err.into());
        }

        info!(events = self.events.event_count(), "Runtime started");
        Ok(())
    }

    /// Removes every hook owned by `module`. Call before the module is discarded.
    pub fn unload_module(&self, module: &ModuleRef) -> usize {
        let removed = self.events.unhook_module_functions(module);
        info!(module = %module.name(), removed, "Unhooked module functions");
        removed
    }

    /// Unhooks everything, first writing the hook table to the log if
    /// `events.dump_on_teardown` is set.
    ///
    /// Returns how many hooks were removed.
    pub fn shutdown(&self) -> usize {
        if self.config.events.dump_on_teardown {
            let mut dump = String::new();
            if self.events.dump_hooked_functions(&mut dump).is_ok() {
                info!("Hooked functions at shutdown:\n{dump}");
            }
        }

        let removed = self.events.unhook_all_functions();
        self.started.store(false, Ordering::Release);
        info!(removed, "Runtime stopped");
        removed
    }
}

/// Builder for a [`HookRuntime`] with custom configuration sources.
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
        }
    }

    /// Loads exactly this file instead of searching.
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges configuration values on top of the defaults.
    pub fn config(mut self, config: HookwireConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    pub fn build(self, engine: EngineRef) -> RuntimeResult<HookRuntime> {
        let config = self.config_loader.load()?;
        Ok(HookRuntime::new(config, engine))
    }
}
