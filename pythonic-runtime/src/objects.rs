//! Object system - unified representation for all runtime values
//!
//! Design: every value is a heap object addressed by `ObjRef`:
//! - The payload enum is the type tag; the class hierarchy lives in `types`
//! - Ints carry a machine `Small` form and an arbitrary precision `Big` form
//! - Strings are stored as generalized UTF-8 so lone surrogates survive
//! - Reference counting for deterministic cleanup (see `heap`)

use std::rc::Rc;

use num_bigint::BigInt;
use num_complex::Complex64;
use num_traits::ToPrimitive;

use crate::builtins::array::ArrayData;
use crate::err::{self, RtResult};
use crate::eval::FunctionBody;
use crate::heap::{self, with_interp, FALSE_SLOT, NONE_SLOT, TRUE_SLOT};
use crate::refcount::Owned;
use crate::types::BuiltinType;

/// Raw (uncounted) reference to a heap object
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjRef(u32);

impl ObjRef {
    #[inline]
    pub(crate) const fn from_index(index: u32) -> Self {
        Self(index)
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }

    /// Object identity (`id(obj)`), stable while the object is alive
    #[inline]
    pub fn id(self) -> u64 {
        u64::from(self.0)
    }
}

/// Integer payload
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Int {
    Small(i64),
    Big(BigInt),
}

impl Int {
    /// Build from a big integer, using the small form whenever it fits
    pub fn from_bigint(value: BigInt) -> Self {
        match value.to_i64() {
            Some(small) => Int::Small(small),
            None => Int::Big(value),
        }
    }

    pub fn to_bigint(&self) -> BigInt {
        match self {
            Int::Small(v) => BigInt::from(*v),
            Int::Big(v) => v.clone(),
        }
    }

    pub fn is_small(&self) -> bool {
        matches!(self, Int::Small(_))
    }

    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Int::Small(v) => Some(*v as f64),
            Int::Big(v) => v.to_f64().filter(|f| f.is_finite()),
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Int::Small(v) => *v == 0,
            Int::Big(_) => false,
        }
    }
}

impl From<i64> for Int {
    fn from(value: i64) -> Self {
        Int::Small(value)
    }
}

impl From<u64> for Int {
    fn from(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(small) => Int::Small(small),
            Err(_) => Int::Big(BigInt::from(value)),
        }
    }
}

impl std::fmt::Display for Int {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Int::Small(v) => write!(f, "{v}"),
            Int::Big(v) => write!(f, "{v}"),
        }
    }
}

/// Dict storage: insertion ordered entries
#[derive(Default)]
pub(crate) struct DictData {
    pub entries: Vec<DictEntry>,
}

pub(crate) struct DictEntry {
    pub hash: u64,
    pub key: ObjRef,
    pub value: ObjRef,
}

pub(crate) struct ModuleData {
    pub name: String,
    pub dict: ObjRef,
}

/// Arguments of a native call
#[derive(Clone, Copy)]
pub struct Args<'a> {
    pub positional: &'a [ObjRef],
    pub keywords: &'a [(String, ObjRef)],
}

impl<'a> Args<'a> {
    pub fn new(positional: &'a [ObjRef], keywords: &'a [(String, ObjRef)]) -> Self {
        Self { positional, keywords }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.positional.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<ObjRef> {
        self.positional.get(index).copied()
    }

    pub fn keyword(&self, name: &str) -> Option<ObjRef> {
        self.keywords
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| *value)
    }

    /// Positional argument `index`, or the keyword `name`
    pub fn arg(&self, index: usize, name: &str) -> Option<ObjRef> {
        self.get(index).or_else(|| self.keyword(name))
    }

    /// Raise `TypeError` unless the positional count is within `min..=max`
    pub fn check_count(&self, function: &str, min: usize, max: usize) -> RtResult<()> {
        let n = self.positional.len();
        if n < min || n > max {
            let expected = if min == max {
                format!("exactly {min}")
            } else if n < min {
                format!("at least {min}")
            } else {
                format!("at most {max}")
            };
            return Err(err::raise(
                BuiltinType::TypeError,
                format!("{function}() takes {expected} argument(s) ({n} given)"),
            ));
        }
        Ok(())
    }

    /// Raise `TypeError` if any keyword argument was passed
    pub fn no_keywords(&self, function: &str) -> RtResult<()> {
        match self.keywords.first() {
            Some((key, _)) => Err(err::raise(
                BuiltinType::TypeError,
                format!("{function}() got an unexpected keyword argument '{key}'"),
            )),
            None => Ok(()),
        }
    }
}

/// Builtin function body
pub type NativeFn = fn(Args<'_>) -> RtResult<Owned>;

/// Builtin method body (receiver first)
pub type NativeMethod = fn(ObjRef, Args<'_>) -> RtResult<Owned>;

pub(crate) struct NativeFunction {
    pub name: &'static str,
    pub func: NativeFn,
}

pub(crate) struct BoundMethod {
    pub receiver: ObjRef,
    pub name: &'static str,
    pub func: NativeMethod,
}

/// Function defined by `def` or `lambda`
pub(crate) struct UserFunction {
    pub name: String,
    pub params: Vec<String>,
    /// Defaults for the trailing parameters
    pub defaults: Vec<ObjRef>,
    pub body: Rc<FunctionBody>,
    pub globals: ObjRef,
}

/// Location details carried by `SyntaxError`
#[derive(Clone, Debug)]
pub struct SyntaxDetail {
    pub filename: String,
    pub lineno: usize,
    pub offset: usize,
    pub text: String,
}

pub(crate) struct ExceptionData {
    pub class: BuiltinType,
    pub args: Vec<ObjRef>,
    pub detail: Option<SyntaxDetail>,
}

/// Object payload (the type tag)
pub(crate) enum Payload {
    None,
    Bool(bool),
    Int(Int),
    Float(f64),
    Complex(Complex64),
    Str(Vec<u8>),
    Bytes(Vec<u8>),
    Tuple(Vec<ObjRef>),
    List(Vec<ObjRef>),
    Dict(DictData),
    Array(ArrayData),
    Type(BuiltinType),
    Module(ModuleData),
    Builtin(NativeFunction),
    Method(BoundMethod),
    Function(UserFunction),
    Instance,
    Exception(ExceptionData),
}

impl Payload {
    pub(crate) fn builtin_type(&self) -> BuiltinType {
        match self {
            Payload::None => BuiltinType::NoneType,
            Payload::Bool(_) => BuiltinType::Bool,
            Payload::Int(_) => BuiltinType::Int,
            Payload::Float(_) => BuiltinType::Float,
            Payload::Complex(_) => BuiltinType::Complex,
            Payload::Str(_) => BuiltinType::Str,
            Payload::Bytes(_) => BuiltinType::Bytes,
            Payload::Tuple(_) => BuiltinType::Tuple,
            Payload::List(_) => BuiltinType::List,
            Payload::Dict(_) => BuiltinType::Dict,
            Payload::Array(_) => BuiltinType::Array,
            Payload::Type(_) => BuiltinType::Type,
            Payload::Module(_) => BuiltinType::Module,
            Payload::Builtin(_) => BuiltinType::BuiltinFunction,
            Payload::Method(_) => BuiltinType::Method,
            Payload::Function(_) => BuiltinType::Function,
            Payload::Instance => BuiltinType::Object,
            Payload::Exception(exc) => exc.class,
        }
    }

    pub(crate) fn kind_name(&self) -> &'static str {
        self.builtin_type().name()
    }

    /// Push every counted reference this payload holds
    pub(crate) fn children(self, out: &mut Vec<ObjRef>) {
        match self {
            Payload::Tuple(items) | Payload::List(items) => out.extend(items),
            Payload::Dict(dict) => {
                for entry in dict.entries {
                    out.push(entry.key);
                    out.push(entry.value);
                }
            }
            Payload::Array(array) => array.children(out),
            Payload::Module(module) => out.push(module.dict),
            Payload::Method(method) => out.push(method.receiver),
            Payload::Function(function) => {
                out.extend(function.defaults);
                out.push(function.globals);
            }
            Payload::Exception(exc) => out.extend(exc.args),
            _ => {}
        }
    }
}

pub(crate) fn alloc(payload: Payload) -> Owned {
    Owned::from_raw(with_interp(|interp| interp.alloc(payload)))
}

/// Allocate a container payload that takes ownership of `items`
pub(crate) fn alloc_with(items: Vec<Owned>, build: impl FnOnce(Vec<ObjRef>) -> Payload) -> Owned {
    let raw: Vec<ObjRef> = items.into_iter().map(Owned::into_raw).collect();
    alloc(build(raw))
}

// ---------------------------------------------------------------------------
// Constructors
// ---------------------------------------------------------------------------

/// The `None` singleton (borrowed; immortal)
#[inline]
pub fn none() -> ObjRef {
    ObjRef::from_index(NONE_SLOT)
}

/// A new reference to `None`
#[inline]
pub fn new_none() -> Owned {
    Owned::from_raw(none())
}

#[inline]
pub fn new_bool(value: bool) -> Owned {
    Owned::from_raw(ObjRef::from_index(if value { TRUE_SLOT } else { FALSE_SLOT }))
}

pub fn new_int(value: Int) -> Owned {
    alloc(Payload::Int(value))
}

pub fn new_int_i64(value: i64) -> Owned {
    new_int(Int::Small(value))
}

pub fn new_int_u64(value: u64) -> Owned {
    new_int(Int::from(value))
}

pub fn new_int_big(value: BigInt) -> Owned {
    new_int(Int::from_bigint(value))
}

pub fn new_float(value: f64) -> Owned {
    alloc(Payload::Float(value))
}

pub fn new_complex(value: Complex64) -> Owned {
    alloc(Payload::Complex(value))
}

pub fn new_str(value: &str) -> Owned {
    alloc(Payload::Str(value.as_bytes().to_vec()))
}

/// Build a str from generalized UTF-8 (may contain encoded surrogates)
pub fn new_str_wtf8(bytes: Vec<u8>) -> Owned {
    alloc(Payload::Str(bytes))
}

pub fn new_bytes(value: &[u8]) -> Owned {
    alloc(Payload::Bytes(value.to_vec()))
}

pub fn new_tuple(items: Vec<Owned>) -> Owned {
    alloc_with(items, Payload::Tuple)
}

pub fn new_list(items: Vec<Owned>) -> Owned {
    alloc_with(items, Payload::List)
}

pub fn new_dict() -> Owned {
    alloc(Payload::Dict(DictData::default()))
}

/// A plain `object()` instance
pub fn new_object() -> Owned {
    alloc(Payload::Instance)
}

pub(crate) fn new_builtin(name: &'static str, func: NativeFn) -> Owned {
    alloc(Payload::Builtin(NativeFunction { name, func }))
}

pub(crate) fn new_method(receiver: ObjRef, name: &'static str, func: NativeMethod) -> Owned {
    heap::incref(receiver);
    alloc(Payload::Method(BoundMethod { receiver, name, func }))
}

// ---------------------------------------------------------------------------
// Type queries
// ---------------------------------------------------------------------------

/// Exact builtin class of `obj`
pub fn type_of(obj: ObjRef) -> BuiltinType {
    heap::view(obj, Payload::builtin_type)
}

/// `type(obj).__name__`
pub fn type_name(obj: ObjRef) -> &'static str {
    type_of(obj).name()
}

/// Qualified class name; the module is omitted for `builtins`
pub fn class_name(obj: ObjRef) -> String {
    let ty = type_of(obj);
    match ty.module() {
        "builtins" => ty.name().to_string(),
        module => format!("{module}.{}", ty.name()),
    }
}

#[inline]
pub fn is_none(obj: ObjRef) -> bool {
    obj == none()
}

/// `isinstance(obj, ty)`
pub fn isinstance(obj: ObjRef, ty: BuiltinType) -> bool {
    type_of(obj).is_subtype(ty)
}

/// Whether `obj` can be called
pub fn is_callable(obj: ObjRef) -> bool {
    heap::view(obj, |payload| match payload {
        Payload::Builtin(_) | Payload::Method(_) | Payload::Function(_) => true,
        Payload::Type(ty) => ty.is_instantiable(),
        _ => false,
    })
}

// ---------------------------------------------------------------------------
// Payload accessors (`None` on type mismatch, subclasses excluded)
// ---------------------------------------------------------------------------

pub fn as_bool(obj: ObjRef) -> Option<bool> {
    heap::view(obj, |payload| match payload {
        Payload::Bool(value) => Some(*value),
        _ => None,
    })
}

/// Integer value of an `int` (or `bool`)
pub fn as_int(obj: ObjRef) -> Option<Int> {
    heap::view(obj, |payload| match payload {
        Payload::Int(value) => Some(value.clone()),
        Payload::Bool(value) => Some(Int::Small(i64::from(*value))),
        _ => None,
    })
}

pub fn as_float(obj: ObjRef) -> Option<f64> {
    heap::view(obj, |payload| match payload {
        Payload::Float(value) => Some(*value),
        _ => None,
    })
}

pub fn as_complex(obj: ObjRef) -> Option<Complex64> {
    heap::view(obj, |payload| match payload {
        Payload::Complex(value) => Some(*value),
        _ => None,
    })
}

/// Raw generalized UTF-8 storage of a `str`
pub fn str_wtf8(obj: ObjRef) -> Option<Vec<u8>> {
    heap::view(obj, |payload| match payload {
        Payload::Str(bytes) => Some(bytes.clone()),
        _ => None,
    })
}

pub fn bytes_data(obj: ObjRef) -> Option<Vec<u8>> {
    heap::view(obj, |payload| match payload {
        Payload::Bytes(bytes) => Some(bytes.clone()),
        _ => None,
    })
}

/// New references to the items of a tuple or list
pub fn sequence_items(obj: ObjRef) -> Option<Vec<Owned>> {
    with_interp(|interp| {
        let items = match interp.payload(obj) {
            Payload::Tuple(items) | Payload::List(items) => items.clone(),
            _ => return None,
        };
        for item in &items {
            interp.incref(*item);
        }
        Some(items)
    })
    .map(|items| items.into_iter().map(Owned::from_raw).collect())
}

/// Numeric value coerced to complex (`bool`, `int`, `float`, `complex`)
pub fn as_number(obj: ObjRef) -> Option<Complex64> {
    heap::view(obj, |payload| match payload {
        Payload::Bool(value) => Some(Complex64::new(f64::from(u8::from(*value)), 0.0)),
        Payload::Int(value) => value.to_f64().map(|re| Complex64::new(re, 0.0)),
        Payload::Float(value) => Some(Complex64::new(*value, 0.0)),
        Payload::Complex(value) => Some(*value),
        _ => None,
    })
}

/// Python truthiness
pub fn is_truthy(obj: ObjRef) -> bool {
    heap::view(obj, |payload| match payload {
        Payload::None => false,
        Payload::Bool(value) => *value,
        Payload::Int(value) => !value.is_zero(),
        Payload::Float(value) => *value != 0.0,
        Payload::Complex(value) => value.re != 0.0 || value.im != 0.0,
        Payload::Str(bytes) | Payload::Bytes(bytes) => !bytes.is_empty(),
        Payload::Tuple(items) | Payload::List(items) => !items.is_empty(),
        Payload::Dict(dict) => !dict.entries.is_empty(),
        Payload::Array(array) => array.len() != 0,
        _ => true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_normalization() {
        assert!(Int::from_bigint(BigInt::from(5)).is_small());
        assert!(!Int::from_bigint(BigInt::from(u64::MAX)).is_small());
        assert_eq!(Int::from(u64::MAX).to_bigint(), BigInt::from(u64::MAX));
        assert_eq!(Int::from(7u64), Int::Small(7));
    }

    #[test]
    fn test_type_queries() {
        let b = new_bool(true);
        assert_eq!(type_of(b.raw()), BuiltinType::Bool);
        assert!(isinstance(b.raw(), BuiltinType::Int));
        assert_eq!(as_int(b.raw()), Some(Int::Small(1)));

        let f = new_float(2.5);
        assert_eq!(type_name(f.raw()), "float");
        assert_eq!(as_float(f.raw()), Some(2.5));
        assert_eq!(as_int(f.raw()), None);
        assert_eq!(class_name(f.raw()), "float");
        assert!(!is_callable(f.raw()));
    }

    #[test]
    fn test_none_is_singleton() {
        let a = new_none();
        let b = new_none();
        assert_eq!(a.raw(), b.raw());
        assert!(is_none(a.raw()));
        assert_eq!(type_name(none()), "NoneType");
    }

    #[test]
    fn test_truthiness() {
        assert!(!is_truthy(new_int_i64(0).raw()));
        assert!(is_truthy(new_int_big(BigInt::from(u64::MAX) * 4).raw()));
        assert!(!is_truthy(new_str("").raw()));
        assert!(is_truthy(new_tuple(vec![new_none()]).raw()));
        assert!(!is_truthy(none()));
    }

    #[test]
    fn test_sequence_items_counts() {
        let item = new_float(1.0);
        let tuple = new_tuple(vec![item.clone()]);
        let items = sequence_items(tuple.raw()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(heap::refcount(item.raw()), 3);
        assert!(sequence_items(item.raw()).is_none());
    }
}
