//! Numeric scalars and column-major numeric arrays

use num_complex::{Complex32, Complex64};

use crate::errors::{ConvResult, ConversionError};
use crate::value::{Dims, HostValue};

/// Integer scalar of a fixed width and signedness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntScalar {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
}

impl IntScalar {
    pub fn element_type(self) -> ElementType {
        match self {
            Self::I8(_) => ElementType::Int8,
            Self::I16(_) => ElementType::Int16,
            Self::I32(_) => ElementType::Int32,
            Self::I64(_) => ElementType::Int64,
            Self::U8(_) => ElementType::UInt8,
            Self::U16(_) => ElementType::UInt16,
            Self::U32(_) => ElementType::UInt32,
            Self::U64(_) => ElementType::UInt64,
        }
    }

    /// Signed value, `None` for a `u64` above `i64::MAX`
    pub fn to_i64(self) -> Option<i64> {
        match self {
            Self::I8(v) => Some(i64::from(v)),
            Self::I16(v) => Some(i64::from(v)),
            Self::I32(v) => Some(i64::from(v)),
            Self::I64(v) => Some(v),
            Self::U8(v) => Some(i64::from(v)),
            Self::U16(v) => Some(i64::from(v)),
            Self::U32(v) => Some(i64::from(v)),
            Self::U64(v) => i64::try_from(v).ok(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FloatScalar {
    Single(f32),
    Double(f64),
}

impl FloatScalar {
    pub fn to_f64(self) -> f64 {
        match self {
            Self::Single(v) => f64::from(v),
            Self::Double(v) => v,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ComplexScalar {
    Single(Complex32),
    Double(Complex64),
}

impl ComplexScalar {
    pub fn to_c64(self) -> Complex64 {
        match self {
            Self::Single(v) => Complex64::new(f64::from(v.re), f64::from(v.im)),
            Self::Double(v) => v,
        }
    }
}

/// Element class of a numeric array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    Double,
    Single,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Bool,
    ComplexDouble,
    ComplexSingle,
}

impl ElementType {
    /// Host class name
    pub fn name(self) -> &'static str {
        match self {
            Self::Double | Self::ComplexDouble => "double",
            Self::Single | Self::ComplexSingle => "single",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::UInt8 => "uint8",
            Self::UInt16 => "uint16",
            Self::UInt32 => "uint32",
            Self::UInt64 => "uint64",
            Self::Bool => "logical",
        }
    }

    pub fn is_complex(self) -> bool {
        matches!(self, Self::ComplexDouble | Self::ComplexSingle)
    }
}

/// Typed column-major element storage
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    Double(Vec<f64>),
    Single(Vec<f32>),
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    UInt8(Vec<u8>),
    UInt16(Vec<u16>),
    UInt32(Vec<u32>),
    UInt64(Vec<u64>),
    Bool(Vec<bool>),
    ComplexDouble(Vec<Complex64>),
    ComplexSingle(Vec<Complex32>),
}

macro_rules! array_data_from {
    ($($variant:ident($elem:ty)),* $(,)?) => {
        $(
            impl From<Vec<$elem>> for ArrayData {
                fn from(data: Vec<$elem>) -> Self {
                    ArrayData::$variant(data)
                }
            }
        )*
    };
}

array_data_from!(
    Double(f64),
    Single(f32),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Bool(bool),
    ComplexDouble(Complex64),
    ComplexSingle(Complex32),
);

impl ArrayData {
    pub fn len(&self) -> usize {
        match self {
            Self::Double(v) => v.len(),
            Self::Single(v) => v.len(),
            Self::Int8(v) => v.len(),
            Self::Int16(v) => v.len(),
            Self::Int32(v) => v.len(),
            Self::Int64(v) => v.len(),
            Self::UInt8(v) => v.len(),
            Self::UInt16(v) => v.len(),
            Self::UInt32(v) => v.len(),
            Self::UInt64(v) => v.len(),
            Self::Bool(v) => v.len(),
            Self::ComplexDouble(v) => v.len(),
            Self::ComplexSingle(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            Self::Double(_) => ElementType::Double,
            Self::Single(_) => ElementType::Single,
            Self::Int8(_) => ElementType::Int8,
            Self::Int16(_) => ElementType::Int16,
            Self::Int32(_) => ElementType::Int32,
            Self::Int64(_) => ElementType::Int64,
            Self::UInt8(_) => ElementType::UInt8,
            Self::UInt16(_) => ElementType::UInt16,
            Self::UInt32(_) => ElementType::UInt32,
            Self::UInt64(_) => ElementType::UInt64,
            Self::Bool(_) => ElementType::Bool,
            Self::ComplexDouble(_) => ElementType::ComplexDouble,
            Self::ComplexSingle(_) => ElementType::ComplexSingle,
        }
    }

    /// Element `index` as a host scalar
    pub fn element(&self, index: usize) -> Option<HostValue> {
        let value = match self {
            Self::Double(v) => HostValue::Float(FloatScalar::Double(*v.get(index)?)),
            Self::Single(v) => HostValue::Float(FloatScalar::Single(*v.get(index)?)),
            Self::Int8(v) => HostValue::Int(IntScalar::I8(*v.get(index)?)),
            Self::Int16(v) => HostValue::Int(IntScalar::I16(*v.get(index)?)),
            Self::Int32(v) => HostValue::Int(IntScalar::I32(*v.get(index)?)),
            Self::Int64(v) => HostValue::Int(IntScalar::I64(*v.get(index)?)),
            Self::UInt8(v) => HostValue::Int(IntScalar::U8(*v.get(index)?)),
            Self::UInt16(v) => HostValue::Int(IntScalar::U16(*v.get(index)?)),
            Self::UInt32(v) => HostValue::Int(IntScalar::U32(*v.get(index)?)),
            Self::UInt64(v) => HostValue::Int(IntScalar::U64(*v.get(index)?)),
            Self::Bool(v) => HostValue::Bool(*v.get(index)?),
            Self::ComplexDouble(v) => HostValue::Complex(ComplexScalar::Double(*v.get(index)?)),
            Self::ComplexSingle(v) => HostValue::Complex(ComplexScalar::Single(*v.get(index)?)),
        };
        Some(value)
    }
}

/// Rectangular numeric array
#[derive(Debug, Clone, PartialEq)]
pub struct NumericArray {
    dims: Dims,
    data: ArrayData,
}

impl NumericArray {
    pub fn new(dims: Dims, data: impl Into<ArrayData>) -> ConvResult<Self> {
        let data = data.into();
        if dims.numel() != data.len() {
            return Err(ConversionError::value_convert(format!(
                "{} array of size {} cannot hold {} elements",
                data.element_type().name(),
                dims,
                data.len()
            )));
        }
        Ok(Self { dims, data })
    }

    pub fn row(data: impl Into<ArrayData>) -> Self {
        let data = data.into();
        Self {
            dims: Dims::row(data.len()),
            data,
        }
    }

    pub fn column(data: impl Into<ArrayData>) -> Self {
        let data = data.into();
        Self {
            dims: Dims::column(data.len()),
            data,
        }
    }

    pub fn dims(&self) -> &Dims {
        &self.dims
    }

    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    pub fn into_data(self) -> ArrayData {
        self.data
    }

    pub fn element_type(&self) -> ElementType {
        self.data.element_type()
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    pub fn element(&self, index: usize) -> Option<HostValue> {
        self.data.element(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_mismatch_rejected() {
        let error = NumericArray::new(Dims::matrix(2, 2), vec![1.0, 2.0, 3.0]).unwrap_err();
        assert_eq!(error.message, "double array of size 2x2 cannot hold 3 elements");
    }

    #[test]
    fn test_element_access() {
        let array = NumericArray::column(vec![7u16, 8, 9]);
        assert_eq!(array.dims(), &Dims::column(3));
        assert_eq!(array.element(1), Some(HostValue::Int(IntScalar::U16(8))));
        assert_eq!(array.element(3), None);
        assert_eq!(array.element_type().name(), "uint16");
    }

    #[test]
    fn test_int_scalar_to_i64() {
        assert_eq!(IntScalar::U64(u64::MAX).to_i64(), None);
        assert_eq!(IntScalar::I8(-3).to_i64(), Some(-3));
    }
}
