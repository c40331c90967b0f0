//! Engine-facing abstractions.
//!
//! The script engine itself lives outside this crate. Everything the call
//! layer needs from it is expressed through three traits:
//!
//! - [`ScriptEngine`] - type resolution, the context pool and registration
//! - [`ScriptFunction`] - a unit of executable script code
//! - [`ScriptContext`] - a reentrant execution slot
//!
//! Function handles come in two flavours. [`FunctionRef`] is a plain shared
//! handle that never touches the engine's reference count, while
//! [`RetainedFunction`] holds one counted reference for as long as it lives.

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{BitOr, Deref};
use std::sync::Arc;

use crate::args::{ObjectPtr, ScriptValue};
use crate::error::EngineError;
use crate::module::ModuleRef;

// =============================================================================
// Type identifiers
// =============================================================================

/// Engine type identifier.
///
/// Primitive types use fixed ids; object, enum and funcdef types get ids
/// assigned by the engine at registration time. The [`HANDLE_FLAG`] bit marks
/// a handle to an object of the base type.
///
/// [`HANDLE_FLAG`]: ScriptTypeId::HANDLE_FLAG
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ScriptTypeId(pub i32);

impl ScriptTypeId {
    pub const VOID: Self = Self(0);
    pub const BOOL: Self = Self(1);
    pub const INT8: Self = Self(2);
    pub const INT16: Self = Self(3);
    pub const INT32: Self = Self(4);
    pub const INT64: Self = Self(5);
    pub const UINT8: Self = Self(6);
    pub const UINT16: Self = Self(7);
    pub const UINT32: Self = Self(8);
    pub const UINT64: Self = Self(9);
    pub const FLOAT: Self = Self(10);
    pub const DOUBLE: Self = Self(11);

    /// Bit set on ids that refer to a handle rather than a value.
    pub const HANDLE_FLAG: i32 = 0x4000_0000;

    /// Returns `true` if this id refers to an object handle.
    pub const fn is_handle(self) -> bool {
        self.0 & Self::HANDLE_FLAG != 0
    }

    /// Returns the id with the handle bit cleared.
    pub const fn base(self) -> Self {
        Self(self.0 & !Self::HANDLE_FLAG)
    }

    /// Returns the handle id for this type.
    pub const fn handle(self) -> Self {
        Self(self.0 | Self::HANDLE_FLAG)
    }

    /// Returns `true` for the built-in primitive types (excluding void).
    pub const fn is_primitive(self) -> bool {
        self.0 >= Self::BOOL.0 && self.0 <= Self::DOUBLE.0
    }

    /// Returns the script name of a primitive type.
    pub fn primitive_name(self) -> Option<&'static str> {
        Some(match self {
            Self::VOID => "void",
            Self::BOOL => "bool",
            Self::INT8 => "int8",
            Self::INT16 => "int16",
            Self::INT32 => "int",
            Self::INT64 => "int64",
            Self::UINT8 => "uint8",
            Self::UINT16 => "uint16",
            Self::UINT32 => "uint",
            Self::UINT64 => "uint64",
            Self::FLOAT => "float",
            Self::DOUBLE => "double",
            _ => return None,
        })
    }
}

impl fmt::Display for ScriptTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.primitive_name() {
            Some(name) => f.write_str(name),
            None if self.is_handle() => write!(f, "type#{}@", self.base().0),
            None => write!(f, "type#{}", self.0),
        }
    }
}

/// Flags describing a registered type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TypeFlags(u32);

impl TypeFlags {
    pub const NONE: Self = Self(0);
    /// Reference type.
    pub const REF: Self = Self(1 << 0);
    /// Value type.
    pub const VALUE: Self = Self(1 << 1);
    /// Function signature type; values are functions or delegates.
    pub const FUNCDEF: Self = Self(1 << 2);
    /// Enumeration.
    pub const ENUM: Self = Self(1 << 3);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for TypeFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// A type resolved by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    pub id: ScriptTypeId,
    pub name: String,
    pub namespace: String,
    pub flags: TypeFlags,
}

impl TypeInfo {
    /// Creates type information in the global namespace.
    pub fn new(id: ScriptTypeId, name: impl Into<String>, flags: TypeFlags) -> Self {
        Self {
            id,
            name: name.into(),
            namespace: String::new(),
            flags,
        }
    }

    /// Sets the namespace (builder pattern).
    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Returns `true` if values of this type are functions or delegates.
    pub fn is_funcdef(&self) -> bool {
        self.flags.contains(TypeFlags::FUNCDEF)
    }

    /// Returns `true` if this is an enumeration.
    pub fn is_enum(&self) -> bool {
        self.flags.contains(TypeFlags::ENUM)
    }
}

// =============================================================================
// Signatures
// =============================================================================

/// Return type and ordered parameter types of a function.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Signature {
    pub return_type: ScriptTypeId,
    pub params: Vec<ScriptTypeId>,
}

impl Signature {
    pub fn new(return_type: ScriptTypeId, params: impl Into<Vec<ScriptTypeId>>) -> Self {
        Self {
            return_type,
            params: params.into(),
        }
    }
}

/// A function signature type declared to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Funcdef {
    /// Namespace the funcdef is declared in.
    pub namespace: String,
    /// Funcdef name, e.g. `PlayerSpawnHook`.
    pub name: String,
    /// Full script declaration, used for diagnostics and registration.
    pub declaration: String,
    pub signature: Signature,
}

// =============================================================================
// Execution status
// =============================================================================

/// Outcome of executing a prepared context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionStatus {
    Finished,
    Suspended,
    Aborted,
    Exception,
    Prepared,
    Uninitialized,
    Active,
    Error,
}

impl ExecutionStatus {
    /// Converts a raw engine status code. Unknown codes map to [`Error`](Self::Error).
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Finished,
            1 => Self::Suspended,
            2 => Self::Aborted,
            3 => Self::Exception,
            4 => Self::Prepared,
            5 => Self::Uninitialized,
            6 => Self::Active,
            _ => Self::Error,
        }
    }

    /// Returns the raw engine status code.
    pub fn code(self) -> i32 {
        match self {
            Self::Finished => 0,
            Self::Suspended => 1,
            Self::Aborted => 2,
            Self::Exception => 3,
            Self::Prepared => 4,
            Self::Uninitialized => 5,
            Self::Active => 6,
            Self::Error => 7,
        }
    }

    /// Returns `true` if execution completed normally.
    pub fn is_finished(self) -> bool {
        self == Self::Finished
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Finished => "finished",
            Self::Suspended => "suspended",
            Self::Aborted => "aborted",
            Self::Exception => "exception",
            Self::Prepared => "prepared",
            Self::Uninitialized => "uninitialized",
            Self::Active => "active",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Engine traits
// =============================================================================

/// Shared handle to a script engine.
pub type EngineRef = Arc<dyn ScriptEngine>;

/// The script engine as seen by the call layer.
pub trait ScriptEngine: Send + Sync {
    /// Resolves a type by id. Handle ids should be passed through [`ScriptTypeId::base`].
    fn type_info(&self, type_id: ScriptTypeId) -> Option<TypeInfo>;

    /// Takes a context from the engine's pool.
    fn request_context(&self) -> Option<Box<dyn ScriptContext>>;

    /// Returns a context obtained from [`request_context`](Self::request_context).
    fn return_context(&self, context: Box<dyn ScriptContext>);

    /// Checks whether `function` can be stored in a variable of the declared signature.
    fn is_signature_compatible(&self, declared: &Signature, function: &dyn ScriptFunction) -> bool {
        *declared == *function.signature()
    }

    /// Registers an enumeration and returns its type id.
    fn register_enum(&self, name: &str, values: &[(&str, i32)]) -> Result<ScriptTypeId, EngineError>;

    /// Registers a function signature type and returns its type id.
    fn register_funcdef(&self, funcdef: &Funcdef) -> Result<ScriptTypeId, EngineError>;
}

/// A unit of executable script code.
///
/// Delegates are functions bound to a receiver object. They have no module of
/// their own; [`delegate_function`](Self::delegate_function) exposes the bound
/// method instead.
pub trait ScriptFunction: Send + Sync {
    fn name(&self) -> &str;

    fn namespace(&self) -> &str;

    /// Module that declared the function; `None` for delegates.
    fn module(&self) -> Option<ModuleRef>;

    /// The bound method of a delegate.
    fn delegate_function(&self) -> Option<FunctionRef> {
        None
    }

    /// Type of the receiver object of a delegate.
    fn delegate_object_type(&self) -> Option<TypeInfo> {
        None
    }

    /// Runtime type id of this function value.
    fn script_type(&self) -> ScriptTypeId;

    fn signature(&self) -> &Signature;

    /// Engine that owns this function.
    fn engine(&self) -> EngineRef;

    /// Increments the engine-side reference count.
    fn add_ref(&self);

    /// Decrements the engine-side reference count.
    fn release(&self);

    /// Returns a reference to self as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;
}

/// A reentrant execution slot.
///
/// A context runs one prepared function at a time and keeps its result until
/// it is prepared again.
pub trait ScriptContext: Send {
    /// Prepares the context to run `function`, clearing any previous result.
    fn prepare(&mut self, function: &FunctionRef) -> Result<(), EngineError>;

    /// Binds the receiver object for a method call.
    fn set_object(&mut self, object: ObjectPtr) -> Result<(), EngineError>;

    /// Stores an argument in slot `index`.
    fn set_arg(&mut self, index: usize, value: ScriptValue) -> Result<(), EngineError>;

    /// Runs the prepared function synchronously.
    fn execute(&mut self) -> ExecutionStatus;

    /// Value returned by the last execution, if it finished.
    fn return_value(&self) -> Option<ScriptValue>;
}

// =============================================================================
// Function handles
// =============================================================================

/// Shared, uncounted handle to a script function.
///
/// Equality and hashing use the identity of the underlying function.
#[derive(Clone)]
pub struct FunctionRef(Arc<dyn ScriptFunction>);

impl FunctionRef {
    pub fn new(function: Arc<dyn ScriptFunction>) -> Self {
        Self(function)
    }

    /// Returns `true` if both handles refer to the same function.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Takes a counted reference that is released when the returned value drops.
    pub fn retain(&self) -> RetainedFunction {
        RetainedFunction::new(self.clone())
    }

    /// Returns `Namespace::name`, or just the name in the global namespace.
    pub fn qualified_name(&self) -> String {
        let namespace = self.0.namespace();
        if namespace.is_empty() {
            self.0.name().to_string()
        } else {
            format!("{}::{}", namespace, self.0.name())
        }
    }

    fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl Deref for FunctionRef {
    type Target = dyn ScriptFunction;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

impl PartialEq for FunctionRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for FunctionRef {}

impl Hash for FunctionRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl fmt::Debug for FunctionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FunctionRef")
            .field(&self.qualified_name())
            .finish()
    }
}

/// A counted reference to a script function.
///
/// Construction calls [`ScriptFunction::add_ref`] and dropping calls
/// [`ScriptFunction::release`], so each value accounts for exactly one
/// engine-side reference.
pub struct RetainedFunction {
    function: FunctionRef,
}

impl RetainedFunction {
    fn new(function: FunctionRef) -> Self {
        function.add_ref();
        Self { function }
    }

    pub fn function(&self) -> &FunctionRef {
        &self.function
    }
}

impl Drop for RetainedFunction {
    fn drop(&mut self) {
        self.function.release();
    }
}

impl fmt::Debug for RetainedFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RetainedFunction")
            .field(&self.function.qualified_name())
            .finish()
    }
}
