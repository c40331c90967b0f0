//! Argument values and argument marshaling.
//!
//! Calls take their arguments from one of two sources:
//!
//! - [`VarArgs`] - native Rust values, read according to the declared
//!   parameter types
//! - [`ArgumentList`] - already-typed [`ScriptValue`]s, checked against the
//!   declared parameter types
//!
//! [`set_arguments`] fills the argument slots of a prepared context from
//! either source.

use std::any::Any;
use std::fmt;

use crate::engine::{FunctionRef, ScriptContext, ScriptEngine, ScriptTypeId};
use crate::error::{CallError, CallResult};

// =============================================================================
// Object pointers
// =============================================================================

/// Opaque address of a script object.
///
/// Only the address is carried; the object itself is owned by the engine or
/// the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ObjectPtr(usize);

impl ObjectPtr {
    pub const NULL: Self = Self(0);

    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    pub const fn addr(self) -> usize {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl<T> From<&T> for ObjectPtr {
    fn from(value: &T) -> Self {
        Self(value as *const T as usize)
    }
}

// =============================================================================
// Script values
// =============================================================================

/// A typed value crossing the script boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScriptValue {
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float(f32),
    Double(f64),
    /// A value of a registered enumeration.
    Enum { type_id: ScriptTypeId, value: i32 },
    /// An object or handle of a registered type.
    Object { type_id: ScriptTypeId, ptr: ObjectPtr },
}

impl ScriptValue {
    /// Runtime type of the value.
    pub fn script_type(&self) -> ScriptTypeId {
        match self {
            Self::Bool(_) => ScriptTypeId::BOOL,
            Self::Int8(_) => ScriptTypeId::INT8,
            Self::Int16(_) => ScriptTypeId::INT16,
            Self::Int32(_) => ScriptTypeId::INT32,
            Self::Int64(_) => ScriptTypeId::INT64,
            Self::UInt8(_) => ScriptTypeId::UINT8,
            Self::UInt16(_) => ScriptTypeId::UINT16,
            Self::UInt32(_) => ScriptTypeId::UINT32,
            Self::UInt64(_) => ScriptTypeId::UINT64,
            Self::Float(_) => ScriptTypeId::FLOAT,
            Self::Double(_) => ScriptTypeId::DOUBLE,
            Self::Enum { type_id, .. } | Self::Object { type_id, .. } => *type_id,
        }
    }

    /// Returns `true` if the value can fill a parameter of the declared type.
    ///
    /// Primitives must match exactly. Objects also match across the handle
    /// bit, so a value and a handle of the same type are interchangeable.
    pub fn fits(&self, declared: ScriptTypeId) -> bool {
        let actual = self.script_type();
        if actual == declared {
            return true;
        }
        !declared.is_primitive()
            && declared != ScriptTypeId::VOID
            && actual.base() == declared.base()
    }

    /// Reads a native Rust value as a value of the declared script type.
    ///
    /// Primitives are read from the matching Rust type, enums from `i32` and
    /// objects from [`ObjectPtr`]. A [`ScriptValue`] is accepted as-is when it
    /// fits the declared type.
    pub fn read_native(
        declared: ScriptTypeId,
        raw: &dyn Any,
        engine: &dyn ScriptEngine,
    ) -> Option<Self> {
        if let Some(value) = raw.downcast_ref::<ScriptValue>() {
            return value.fits(declared).then_some(*value);
        }

        macro_rules! read {
            ($($id:ident => $ty:ty, $variant:ident;)*) => {
                match declared {
                    $(ScriptTypeId::$id => {
                        return raw.downcast_ref::<$ty>().map(|v| Self::$variant(*v));
                    })*
                    _ => {}
                }
            };
        }

        read! {
            BOOL => bool, Bool;
            INT8 => i8, Int8;
            INT16 => i16, Int16;
            INT32 => i32, Int32;
            INT64 => i64, Int64;
            UINT8 => u8, UInt8;
            UINT16 => u16, UInt16;
            UINT32 => u32, UInt32;
            UINT64 => u64, UInt64;
            FLOAT => f32, Float;
            DOUBLE => f64, Double;
        }

        let info = engine.type_info(declared.base())?;
        if info.is_enum() {
            raw.downcast_ref::<i32>().map(|value| Self::Enum {
                type_id: declared,
                value: *value,
            })
        } else {
            raw.downcast_ref::<ObjectPtr>().map(|ptr| Self::Object {
                type_id: declared,
                ptr: *ptr,
            })
        }
    }
}

macro_rules! impl_from_primitive {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for ScriptValue {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }

            impl FromScriptValue for $ty {
                fn from_script_value(value: ScriptValue) -> Option<Self> {
                    match value {
                        ScriptValue::$variant(v) => Some(v),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_from_primitive! {
    bool => Bool,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    f32 => Float,
    f64 => Double,
}

/// Conversion from a returned [`ScriptValue`] into a Rust type.
pub trait FromScriptValue: Sized {
    fn from_script_value(value: ScriptValue) -> Option<Self>;
}

impl FromScriptValue for ScriptValue {
    fn from_script_value(value: ScriptValue) -> Option<Self> {
        Some(value)
    }
}

impl FromScriptValue for ObjectPtr {
    fn from_script_value(value: ScriptValue) -> Option<Self> {
        match value {
            ScriptValue::Object { ptr, .. } => Some(ptr),
            _ => None,
        }
    }
}

// =============================================================================
// Argument sources
// =============================================================================

/// Native arguments passed without type tags.
///
/// Each call reads the values from the start, so the same `VarArgs` can be
/// shared across any number of calls. Build one with [`var_args!`](crate::var_args).
#[derive(Clone, Copy)]
pub struct VarArgs<'a> {
    pub values: &'a [&'a dyn Any],
}

impl<'a> VarArgs<'a> {
    pub const EMPTY: VarArgs<'static> = VarArgs { values: &[] };

    pub fn new(values: &'a [&'a dyn Any]) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for VarArgs<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VarArgs")
            .field("len", &self.values.len())
            .finish()
    }
}

/// Builds [`VarArgs`] from a list of expressions.
///
/// ```
/// use hookwire_core::var_args;
///
/// let args = var_args![7i32, true];
/// assert_eq!(args.len(), 2);
/// ```
#[macro_export]
macro_rules! var_args {
    () => {
        $crate::args::VarArgs::EMPTY
    };
    ($($value:expr),+ $(,)?) => {
        $crate::args::VarArgs {
            values: &[$(&$value as &dyn ::std::any::Any),+],
        }
    };
}

/// An ordered list of typed argument values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgumentList {
    values: Vec<ScriptValue>,
}

impl ArgumentList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a value (builder pattern).
    pub fn with(mut self, value: impl Into<ScriptValue>) -> Self {
        self.values.push(value.into());
        self
    }

    pub fn push(&mut self, value: impl Into<ScriptValue>) {
        self.values.push(value.into());
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ScriptValue> {
        self.values.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScriptValue> {
        self.values.iter()
    }
}

impl From<Vec<ScriptValue>> for ArgumentList {
    fn from(values: Vec<ScriptValue>) -> Self {
        Self { values }
    }
}

impl FromIterator<ScriptValue> for ArgumentList {
    fn from_iter<I: IntoIterator<Item = ScriptValue>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Where a call takes its arguments from.
#[derive(Debug, Clone, Copy)]
pub enum ArgSource<'a> {
    Variadic(VarArgs<'a>),
    List(&'a ArgumentList),
}

impl<'a> From<VarArgs<'a>> for ArgSource<'a> {
    fn from(args: VarArgs<'a>) -> Self {
        Self::Variadic(args)
    }
}

impl<'a> From<&'a ArgumentList> for ArgSource<'a> {
    fn from(args: &'a ArgumentList) -> Self {
        Self::List(args)
    }
}

// =============================================================================
// Marshaling
// =============================================================================

/// Fills the argument slots of a prepared context in declaration order.
///
/// Native values beyond the declared parameters are ignored. A structured
/// list must supply exactly one value per parameter.
pub fn set_arguments(
    context: &mut dyn ScriptContext,
    function: &FunctionRef,
    source: ArgSource<'_>,
) -> CallResult<()> {
    let params = &function.signature().params;

    match source {
        ArgSource::Variadic(args) => {
            let engine = function.engine();
            for (index, &declared) in params.iter().enumerate() {
                let raw = args.values.get(index).ok_or(CallError::ArgumentMismatch {
                    index,
                    expected: declared,
                    found: None,
                })?;
                let value = ScriptValue::read_native(declared, *raw, engine.as_ref())
                    .ok_or(CallError::ArgumentMismatch {
                        index,
                        expected: declared,
                        found: raw.downcast_ref::<ScriptValue>().map(|v| v.script_type()),
                    })?;
                store(context, index, value)?;
            }
        }
        ArgSource::List(args) => {
            if args.len() > params.len() {
                return Err(CallError::ArgumentMismatch {
                    index: params.len(),
                    expected: ScriptTypeId::VOID,
                    found: args.get(params.len()).map(|v| v.script_type()),
                });
            }
            for (index, &declared) in params.iter().enumerate() {
                let value = *args.get(index).ok_or(CallError::ArgumentMismatch {
                    index,
                    expected: declared,
                    found: None,
                })?;
                if !value.fits(declared) {
                    return Err(CallError::ArgumentMismatch {
                        index,
                        expected: declared,
                        found: Some(value.script_type()),
                    });
                }
                store(context, index, value)?;
            }
        }
    }

    Ok(())
}

fn store(context: &mut dyn ScriptContext, index: usize, value: ScriptValue) -> CallResult<()> {
    context
        .set_arg(index, value)
        .map_err(|source| CallError::SetArgument { index, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::TypeFlags;
    use crate::testing::{MockContext, MockEngine};

    #[test]
    fn test_value_fits_exact_primitive() {
        assert!(ScriptValue::Int32(1).fits(ScriptTypeId::INT32));
        assert!(!ScriptValue::Int32(1).fits(ScriptTypeId::INT64));
        assert!(!ScriptValue::Bool(true).fits(ScriptTypeId::VOID));
    }

    #[test]
    fn test_value_fits_object_handle() {
        let player = ScriptTypeId(1000);
        let value = ScriptValue::Object {
            type_id: player,
            ptr: ObjectPtr::new(0x10),
        };

        assert!(value.fits(player));
        assert!(value.fits(player.handle()));
        assert!(!value.fits(ScriptTypeId(1001)));
    }

    #[test]
    fn test_read_native_by_declared_type() {
        let engine = MockEngine::new();
        let color = engine.register_type("Color", TypeFlags::ENUM);
        let player = engine.register_type("Player", TypeFlags::REF);

        assert_eq!(
            ScriptValue::read_native(ScriptTypeId::INT32, &5i32, engine.as_ref()),
            Some(ScriptValue::Int32(5))
        );
        assert_eq!(
            ScriptValue::read_native(ScriptTypeId::INT64, &5i32, engine.as_ref()),
            None
        );
        assert_eq!(
            ScriptValue::read_native(color, &2i32, engine.as_ref()),
            Some(ScriptValue::Enum {
                type_id: color,
                value: 2
            })
        );
        assert_eq!(
            ScriptValue::read_native(player.handle(), &ObjectPtr::new(8), engine.as_ref()),
            Some(ScriptValue::Object {
                type_id: player.handle(),
                ptr: ObjectPtr::new(8)
            })
        );
    }

    #[test]
    fn test_var_args_macro() {
        let name = "bob";
        let args = var_args![1i32, 2.5f64, name];
        assert_eq!(args.len(), 3);
        assert_eq!(args.values[0].downcast_ref::<i32>(), Some(&1));
        assert!(var_args![].is_empty());
    }

    #[test]
    fn test_set_arguments_variadic() {
        let engine = MockEngine::new();
        let function = engine
            .function("OnScore")
            .params([ScriptTypeId::INT32, ScriptTypeId::BOOL])
            .build();
        let mut context = MockContext::default();
        context.prepare(&function).unwrap();

        set_arguments(&mut context, &function, var_args![3i32, true, 99u8].into()).unwrap();

        assert_eq!(
            context.arguments(),
            vec![Some(ScriptValue::Int32(3)), Some(ScriptValue::Bool(true))]
        );
    }

    #[test]
    fn test_set_arguments_variadic_too_few() {
        let engine = MockEngine::new();
        let function = engine
            .function("OnScore")
            .params([ScriptTypeId::INT32, ScriptTypeId::BOOL])
            .build();
        let mut context = MockContext::default();
        context.prepare(&function).unwrap();

        let err = set_arguments(&mut context, &function, var_args![3i32].into()).unwrap_err();
        assert_eq!(
            err,
            CallError::ArgumentMismatch {
                index: 1,
                expected: ScriptTypeId::BOOL,
                found: None
            }
        );
    }

    #[test]
    fn test_set_arguments_list_type_mismatch() {
        let engine = MockEngine::new();
        let function = engine
            .function("OnScore")
            .params([ScriptTypeId::INT32])
            .build();
        let mut context = MockContext::default();
        context.prepare(&function).unwrap();

        let args = ArgumentList::new().with(1.0f32);
        let err = set_arguments(&mut context, &function, (&args).into()).unwrap_err();
        assert_eq!(
            err,
            CallError::ArgumentMismatch {
                index: 0,
                expected: ScriptTypeId::INT32,
                found: Some(ScriptTypeId::FLOAT)
            }
        );
    }

    #[test]
    fn test_set_arguments_list_arity() {
        let engine = MockEngine::new();
        let function = engine
            .function("OnScore")
            .params([ScriptTypeId::INT32])
            .build();
        let mut context = MockContext::default();
        context.prepare(&function).unwrap();

        let extra = ArgumentList::new().with(1i32).with(2i32);
        let err = set_arguments(&mut context, &function, (&extra).into()).unwrap_err();
        assert!(matches!(err, CallError::ArgumentMismatch { index: 1, .. }));

        let missing = ArgumentList::new();
        let err = set_arguments(&mut context, &function, (&missing).into()).unwrap_err();
        assert!(matches!(
            err,
            CallError::ArgumentMismatch {
                index: 0,
                found: None,
                ..
            }
        ));
    }

    #[test]
    fn test_object_ptr_from_reference() {
        let value = 42u64;
        let ptr = ObjectPtr::from(&value);
        assert!(!ptr.is_null());
        assert!(ObjectPtr::NULL.is_null());
    }
}
