//! Host value model
//!
//! `HostValue` is the closed set of values the host interpreter hands to
//! the bridge and receives back. Arrays are column-major; every array-like
//! variant carries a `Dims` with at least two entries.

mod aggregate;
mod dims;
mod numeric;
mod text;

pub use aggregate::{is_valid_identifier, CellArray, StructArray, StructValue};
pub use dims::Dims;
pub use numeric::{ArrayData, ComplexScalar, ElementType, FloatScalar, IntScalar, NumericArray};
pub use text::CharArray;

use num_complex::{Complex32, Complex64};

#[derive(Debug, Clone, PartialEq, Default)]
pub enum HostValue {
    #[default]
    Undefined,
    Bool(bool),
    Int(IntScalar),
    Float(FloatScalar),
    Complex(ComplexScalar),
    String(CharArray),
    Array(NumericArray),
    Struct(StructValue),
    StructArray(StructArray),
    Cell(CellArray),
    /// Opaque reference to a foreign object, keyed into the object store
    Handle(u64),
}

impl HostValue {
    /// Host class name of the value
    pub fn class_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Bool(_) => "logical",
            Self::Int(v) => v.element_type().name(),
            Self::Float(FloatScalar::Single(_)) | Self::Complex(ComplexScalar::Single(_)) => "single",
            Self::Float(FloatScalar::Double(_)) | Self::Complex(ComplexScalar::Double(_)) => "double",
            Self::String(_) => "char",
            Self::Array(array) => array.element_type().name(),
            Self::Struct(_) | Self::StructArray(_) => "struct",
            Self::Cell(_) => "cell",
            Self::Handle(_) => "pyobject",
        }
    }

    pub fn dims(&self) -> Dims {
        match self {
            Self::Undefined => Dims::matrix(0, 0),
            Self::String(text) => text.dims().clone(),
            Self::Array(array) => array.dims().clone(),
            Self::StructArray(array) => array.dims().clone(),
            Self::Cell(cell) => cell.dims().clone(),
            _ => Dims::scalar(),
        }
    }

    pub fn is_handle(&self) -> bool {
        matches!(self, Self::Handle(_))
    }

    pub fn as_handle(&self) -> Option<u64> {
        match self {
            Self::Handle(key) => Some(*key),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(v.to_f64()),
            _ => None,
        }
    }

    /// Contents of a single-row string
    pub fn as_string(&self) -> Option<String> {
        match self {
            Self::String(text) if !text.is_multirow() => Some(text.to_string_lossy()),
            _ => None,
        }
    }
}

/// Target of an explicit scalar decode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Bool,
    Int64,
    UInt64,
    Double,
    Complex,
    String,
}

macro_rules! host_value_from {
    ($($ty:ty => $variant:ident($wrap:expr)),* $(,)?) => {
        $(
            impl From<$ty> for HostValue {
                fn from(value: $ty) -> Self {
                    HostValue::$variant($wrap(value))
                }
            }
        )*
    };
}

host_value_from!(
    i8 => Int(IntScalar::I8),
    i16 => Int(IntScalar::I16),
    i32 => Int(IntScalar::I32),
    i64 => Int(IntScalar::I64),
    u8 => Int(IntScalar::U8),
    u16 => Int(IntScalar::U16),
    u32 => Int(IntScalar::U32),
    u64 => Int(IntScalar::U64),
    f32 => Float(FloatScalar::Single),
    f64 => Float(FloatScalar::Double),
    Complex32 => Complex(ComplexScalar::Single),
    Complex64 => Complex(ComplexScalar::Double),
    CharArray => String(std::convert::identity),
    NumericArray => Array(std::convert::identity),
    StructValue => Struct(std::convert::identity),
    CellArray => Cell(std::convert::identity),
);

impl From<bool> for HostValue {
    fn from(value: bool) -> Self {
        HostValue::Bool(value)
    }
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        HostValue::String(CharArray::new(value))
    }
}

impl From<String> for HostValue {
    fn from(value: String) -> Self {
        HostValue::String(CharArray::from_bytes(value.into_bytes()))
    }
}
