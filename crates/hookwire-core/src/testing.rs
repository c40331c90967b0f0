//! In-memory engine for tests.
//!
//! [`MockEngine`] implements the engine traits with closures standing in for
//! compiled script code. It counts context pool traffic and per-function
//! reference counts so tests can check lifetimes exactly.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicIsize, AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::args::{ObjectPtr, ScriptValue};
use crate::engine::{
    EngineRef, ExecutionStatus, Funcdef, FunctionRef, ScriptContext, ScriptEngine, ScriptFunction,
    ScriptTypeId, Signature, TypeFlags, TypeInfo,
};
use crate::error::EngineError;
use crate::module::ModuleRef;

/// Error code for operations on a context with nothing prepared.
pub const ERR_NOT_PREPARED: i32 = -1;
/// Error code for argument slots past the declared parameters.
pub const ERR_INVALID_ARG: i32 = -5;
/// Error code for preparing a function that did not come from a [`MockEngine`].
pub const ERR_FOREIGN_FUNCTION: i32 = -10;

const FIRST_USER_TYPE: i32 = 1000;

/// Script code stand-in: receives the call and returns a value or a failed status.
pub type MockBody =
    Arc<dyn Fn(&MockInvocation) -> Result<Option<ScriptValue>, ExecutionStatus> + Send + Sync>;

/// What a mock function body sees when it runs.
#[derive(Debug, Clone, PartialEq)]
pub struct MockInvocation {
    pub this: Option<ObjectPtr>,
    pub args: Vec<ScriptValue>,
}

// =============================================================================
// Engine
// =============================================================================

pub struct MockEngine {
    types: Mutex<HashMap<ScriptTypeId, TypeInfo>>,
    funcdefs: Mutex<HashMap<ScriptTypeId, Funcdef>>,
    enums: Mutex<Vec<(String, Vec<(String, i32)>)>>,
    next_type_id: AtomicI32,
    pool: Mutex<Vec<Box<dyn ScriptContext>>>,
    pool_exhausted: AtomicBool,
    acquired: AtomicUsize,
    released: AtomicUsize,
}

impl MockEngine {
    pub fn new() -> Arc<Self> {
        let primitives = [
            ScriptTypeId::BOOL,
            ScriptTypeId::INT8,
            ScriptTypeId::INT16,
            ScriptTypeId::INT32,
            ScriptTypeId::INT64,
            ScriptTypeId::UINT8,
            ScriptTypeId::UINT16,
            ScriptTypeId::UINT32,
            ScriptTypeId::UINT64,
            ScriptTypeId::FLOAT,
            ScriptTypeId::DOUBLE,
        ];
        let types = primitives
            .into_iter()
            .filter_map(|id| {
                id.primitive_name()
                    .map(|name| (id, TypeInfo::new(id, name, TypeFlags::VALUE)))
            })
            .collect();

        Arc::new(Self {
            types: Mutex::new(types),
            funcdefs: Mutex::new(HashMap::new()),
            enums: Mutex::new(Vec::new()),
            next_type_id: AtomicI32::new(FIRST_USER_TYPE),
            pool: Mutex::new(Vec::new()),
            pool_exhausted: AtomicBool::new(false),
            acquired: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
        })
    }

    /// Registers a type in the global namespace.
    pub fn register_type(&self, name: &str, flags: TypeFlags) -> ScriptTypeId {
        self.insert_type(TypeInfo::new(ScriptTypeId::VOID, name, flags))
    }

    /// Registers a funcdef type with the given signature.
    pub fn register_funcdef_type(&self, name: &str, signature: Signature) -> ScriptTypeId {
        self.insert_funcdef(Funcdef {
            namespace: String::new(),
            name: name.to_string(),
            declaration: name.to_string(),
            signature,
        })
    }

    /// Starts building a function.
    pub fn function(self: &Arc<Self>, name: &str) -> MockFunctionBuilder {
        MockFunctionBuilder {
            engine: self.clone(),
            name: name.to_string(),
            namespace: String::new(),
            module: None,
            signature: Signature::default(),
            script_type: None,
            body: Arc::new(|_| Ok(None)),
        }
    }

    /// Creates a delegate binding `bound` to `object`.
    pub fn delegate(
        self: &Arc<Self>,
        bound: &FunctionRef,
        object: ObjectPtr,
        object_type: TypeInfo,
    ) -> FunctionRef {
        let signature = bound.signature().clone();
        let script_type = self.funcdef_type_for(&signature);
        let function = MockFunction {
            engine: self.clone(),
            name: bound.name().to_string(),
            namespace: String::new(),
            module: None,
            signature,
            script_type,
            body: Arc::new(|_| Ok(None)),
            delegate: Some(MockDelegate {
                bound: bound.clone(),
                object,
                object_type,
            }),
            add_refs: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
            live_refs: AtomicIsize::new(0),
        };
        FunctionRef::new(Arc::new(function))
    }

    /// Makes [`ScriptEngine::request_context`] fail.
    pub fn set_pool_exhausted(&self, exhausted: bool) {
        self.pool_exhausted.store(exhausted, Ordering::SeqCst);
    }

    pub fn contexts_acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn contexts_released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Funcdefs registered so far, in no particular order.
    pub fn registered_funcdefs(&self) -> Vec<Funcdef> {
        self.funcdefs.lock().values().cloned().collect()
    }

    /// Looks up a registered funcdef type by name.
    pub fn funcdef_type(&self, name: &str) -> Option<ScriptTypeId> {
        self.funcdefs
            .lock()
            .iter()
            .find(|(_, funcdef)| funcdef.name == name)
            .map(|(id, _)| *id)
    }

    /// Names and values of registered enums, in registration order.
    pub fn registered_enums(&self) -> Vec<(String, Vec<(String, i32)>)> {
        self.enums.lock().clone()
    }

    fn insert_type(&self, mut info: TypeInfo) -> ScriptTypeId {
        let id = ScriptTypeId(self.next_type_id.fetch_add(1, Ordering::SeqCst));
        info.id = id;
        self.types.lock().insert(id, info);
        id
    }

    fn insert_funcdef(&self, funcdef: Funcdef) -> ScriptTypeId {
        let info = TypeInfo::new(ScriptTypeId::VOID, funcdef.name.clone(), TypeFlags::FUNCDEF)
            .in_namespace(funcdef.namespace.clone());
        let id = self.insert_type(info);
        self.funcdefs.lock().insert(id, funcdef);
        id
    }

    /// Finds a funcdef type matching `signature`, declaring an anonymous one if needed.
    fn funcdef_type_for(&self, signature: &Signature) -> ScriptTypeId {
        let existing = self
            .funcdefs
            .lock()
            .iter()
            .find(|(_, funcdef)| funcdef.signature == *signature)
            .map(|(id, _)| *id);
        existing.unwrap_or_else(|| {
            let name = format!("func#{}", self.next_type_id.load(Ordering::SeqCst));
            self.register_funcdef_type(&name, signature.clone())
        })
    }
}

impl ScriptEngine for MockEngine {
    fn type_info(&self, type_id: ScriptTypeId) -> Option<TypeInfo> {
        self.types.lock().get(&type_id).cloned()
    }

    fn request_context(&self) -> Option<Box<dyn ScriptContext>> {
        if self.pool_exhausted.load(Ordering::SeqCst) {
            return None;
        }
        self.acquired.fetch_add(1, Ordering::SeqCst);
        let pooled = self.pool.lock().pop();
        Some(pooled.unwrap_or_else(|| Box::new(MockContext::default())))
    }

    fn return_context(&self, context: Box<dyn ScriptContext>) {
        self.released.fetch_add(1, Ordering::SeqCst);
        self.pool.lock().push(context);
    }

    fn register_enum(&self, name: &str, values: &[(&str, i32)]) -> Result<ScriptTypeId, EngineError> {
        let id = self.register_type(name, TypeFlags::ENUM | TypeFlags::VALUE);
        self.enums.lock().push((
            name.to_string(),
            values.iter().map(|(n, v)| (n.to_string(), *v)).collect(),
        ));
        Ok(id)
    }

    fn register_funcdef(&self, funcdef: &Funcdef) -> Result<ScriptTypeId, EngineError> {
        Ok(self.insert_funcdef(funcdef.clone()))
    }
}

impl fmt::Debug for MockEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockEngine")
            .field("types", &self.types.lock().len())
            .field("acquired", &self.contexts_acquired())
            .field("released", &self.contexts_released())
            .finish()
    }
}

// =============================================================================
// Functions
// =============================================================================

struct MockDelegate {
    bound: FunctionRef,
    object: ObjectPtr,
    object_type: TypeInfo,
}

pub struct MockFunction {
    engine: Arc<MockEngine>,
    name: String,
    namespace: String,
    module: Option<ModuleRef>,
    signature: Signature,
    script_type: ScriptTypeId,
    body: MockBody,
    delegate: Option<MockDelegate>,
    add_refs: AtomicUsize,
    releases: AtomicUsize,
    live_refs: AtomicIsize,
}

impl MockFunction {
    /// Downcasts a function handle created by a [`MockEngine`].
    pub fn of(function: &FunctionRef) -> Option<&MockFunction> {
        function.as_any().downcast_ref::<MockFunction>()
    }

    /// Counted references currently held.
    pub fn ref_count(&self) -> isize {
        self.live_refs.load(Ordering::SeqCst)
    }

    pub fn add_ref_calls(&self) -> usize {
        self.add_refs.load(Ordering::SeqCst)
    }

    pub fn release_calls(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    fn invoke(&self, this: Option<ObjectPtr>, args: Vec<ScriptValue>) -> Result<Option<ScriptValue>, ExecutionStatus> {
        match &self.delegate {
            Some(delegate) => match MockFunction::of(&delegate.bound) {
                Some(bound) => (bound.body)(&MockInvocation {
                    this: Some(delegate.object),
                    args,
                }),
                None => Err(ExecutionStatus::Error),
            },
            None => (self.body)(&MockInvocation { this, args }),
        }
    }
}

impl ScriptFunction for MockFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn module(&self) -> Option<ModuleRef> {
        self.module.clone()
    }

    fn delegate_function(&self) -> Option<FunctionRef> {
        self.delegate.as_ref().map(|d| d.bound.clone())
    }

    fn delegate_object_type(&self) -> Option<TypeInfo> {
        self.delegate.as_ref().map(|d| d.object_type.clone())
    }

    fn script_type(&self) -> ScriptTypeId {
        self.script_type
    }

    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn engine(&self) -> EngineRef {
        self.engine.clone()
    }

    fn add_ref(&self) {
        self.add_refs.fetch_add(1, Ordering::SeqCst);
        self.live_refs.fetch_add(1, Ordering::SeqCst);
    }

    fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
        self.live_refs.fetch_sub(1, Ordering::SeqCst);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Builder returned by [`MockEngine::function`].
pub struct MockFunctionBuilder {
    engine: Arc<MockEngine>,
    name: String,
    namespace: String,
    module: Option<ModuleRef>,
    signature: Signature,
    script_type: Option<ScriptTypeId>,
    body: MockBody,
}

impl MockFunctionBuilder {
    pub fn namespace(mut self, namespace: &str) -> Self {
        self.namespace = namespace.to_string();
        self
    }

    pub fn module(mut self, module: &ModuleRef) -> Self {
        self.module = Some(module.clone());
        self
    }

    pub fn params(mut self, params: impl Into<Vec<ScriptTypeId>>) -> Self {
        self.signature.params = params.into();
        self
    }

    pub fn returns(mut self, return_type: ScriptTypeId) -> Self {
        self.signature.return_type = return_type;
        self
    }

    /// Overrides the function's runtime type id.
    pub fn script_type(mut self, script_type: ScriptTypeId) -> Self {
        self.script_type = Some(script_type);
        self
    }

    pub fn body(
        mut self,
        body: impl Fn(&MockInvocation) -> Result<Option<ScriptValue>, ExecutionStatus>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.body = Arc::new(body);
        self
    }

    pub fn build(self) -> FunctionRef {
        let script_type = self
            .script_type
            .unwrap_or_else(|| self.engine.funcdef_type_for(&self.signature));
        FunctionRef::new(Arc::new(MockFunction {
            engine: self.engine,
            name: self.name,
            namespace: self.namespace,
            module: self.module,
            signature: self.signature,
            script_type,
            body: self.body,
            delegate: None,
            add_refs: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
            live_refs: AtomicIsize::new(0),
        }))
    }
}

// =============================================================================
// Contexts
// =============================================================================

/// A context that runs [`MockFunction`] bodies.
#[derive(Default)]
pub struct MockContext {
    function: Option<FunctionRef>,
    this: Option<ObjectPtr>,
    args: Vec<Option<ScriptValue>>,
    result: Option<ScriptValue>,
    status: Option<ExecutionStatus>,
}

impl MockContext {
    /// Argument slots as staged for the prepared function.
    pub fn arguments(&self) -> Vec<Option<ScriptValue>> {
        self.args.clone()
    }

    pub fn status(&self) -> ExecutionStatus {
        self.status.unwrap_or(ExecutionStatus::Uninitialized)
    }
}

impl ScriptContext for MockContext {
    fn prepare(&mut self, function: &FunctionRef) -> Result<(), EngineError> {
        if MockFunction::of(function).is_none() {
            return Err(EngineError(ERR_FOREIGN_FUNCTION));
        }
        self.args = vec![None; function.signature().params.len()];
        self.function = Some(function.clone());
        self.this = None;
        self.result = None;
        self.status = Some(ExecutionStatus::Prepared);
        Ok(())
    }

    fn set_object(&mut self, object: ObjectPtr) -> Result<(), EngineError> {
        if self.function.is_none() {
            return Err(EngineError(ERR_NOT_PREPARED));
        }
        self.this = Some(object);
        Ok(())
    }

    fn set_arg(&mut self, index: usize, value: ScriptValue) -> Result<(), EngineError> {
        let slot = self
            .args
            .get_mut(index)
            .ok_or(EngineError(ERR_INVALID_ARG))?;
        *slot = Some(value);
        Ok(())
    }

    fn execute(&mut self) -> ExecutionStatus {
        let Some(function) = self.function.clone() else {
            return ExecutionStatus::Uninitialized;
        };
        let Some(mock) = MockFunction::of(&function) else {
            return ExecutionStatus::Error;
        };
        let Some(args) = self.args.iter().copied().collect::<Option<Vec<_>>>() else {
            self.status = Some(ExecutionStatus::Error);
            return ExecutionStatus::Error;
        };

        self.status = Some(ExecutionStatus::Active);
        let status = match mock.invoke(self.this, args) {
            Ok(value) => {
                self.result = value;
                ExecutionStatus::Finished
            }
            Err(status) => {
                self.result = None;
                status
            }
        };
        self.status = Some(status);
        status
    }

    fn return_value(&self) -> Option<ScriptValue> {
        match self.status {
            Some(ExecutionStatus::Finished) => self.result,
            _ => None,
        }
    }
}

impl fmt::Debug for MockContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockContext")
            .field("function", &self.function)
            .field("status", &self.status())
            .finish()
    }
}
