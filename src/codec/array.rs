//! Numeric arrays and fixed-typecode `array.array` objects
//!
//! Encode takes a 2-D vector through `array.array(typecode)` plus
//! `frombytes` over the host's native-endian element bytes; every other
//! shape becomes an `'O'` object array of individually encoded elements.
//!
//! Decode walks the foreign array's strided buffer one dimension at a time
//! and lands each element at its column-major host index. An `'O'` array
//! whose elements all decode to one scalar kind comes back as a numeric
//! array of that kind (ints as int64, floats as double); mixed contents
//! come back as a cell.

use num_complex::{Complex32, Complex64};
use pythonic_runtime::builtins::{self, array as runtime_array, getattr, import_module};
use pythonic_runtime::builtins::array::OBJECT_ITEMSIZE;
use pythonic_runtime::objects;
use pythonic_runtime::{ArrayBuffer, ArrayView, ObjRef, Owned, TypeCode};

use crate::codec::{Decode, Encode};
use crate::errors::{ConvResult, ConversionError};
use crate::handle::ForeignHandle;
use crate::logging::log_encode;
use crate::value::{
    ArrayData, CellArray, CharArray, ComplexScalar, Dims, ElementType, FloatScalar, HostValue,
    IntScalar, NumericArray,
};

/// Fixed-size element with a native-endian byte form
trait NativeElement: Copy {
    const SIZE: usize;
    fn read(bytes: &[u8]) -> Self;
    fn write(self, out: &mut Vec<u8>);
}

macro_rules! native_element {
    ($($ty:ty),*) => {
        $(
            impl NativeElement for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                fn read(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(&bytes[..Self::SIZE]);
                    <$ty>::from_ne_bytes(raw)
                }

                fn write(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_ne_bytes());
                }
            }
        )*
    };
}

native_element!(i8, i16, i32, i64, u8, u16, u32, u64, f32, f64);

impl NativeElement for bool {
    const SIZE: usize = 1;

    fn read(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }

    fn write(self, out: &mut Vec<u8>) {
        out.push(u8::from(self));
    }
}

impl NativeElement for Complex32 {
    const SIZE: usize = 8;

    fn read(bytes: &[u8]) -> Self {
        Complex32::new(f32::read(&bytes[..4]), f32::read(&bytes[4..8]))
    }

    fn write(self, out: &mut Vec<u8>) {
        self.re.write(out);
        self.im.write(out);
    }
}

impl NativeElement for Complex64 {
    const SIZE: usize = 16;

    fn read(bytes: &[u8]) -> Self {
        Complex64::new(f64::read(&bytes[..8]), f64::read(&bytes[8..16]))
    }

    fn write(self, out: &mut Vec<u8>) {
        self.re.write(out);
        self.im.write(out);
    }
}

fn write_all<T: NativeElement>(values: &[T]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * T::SIZE);
    for value in values {
        value.write(&mut out);
    }
    out
}

fn gather<T: NativeElement>(bytes: &[u8], offsets: &[usize]) -> Vec<T> {
    offsets
        .iter()
        .map(|&offset| T::read(&bytes[offset..offset + T::SIZE]))
        .collect()
}

/// Native-endian bytes of the column-major element data
pub fn native_bytes(data: &ArrayData) -> Vec<u8> {
    match data {
        ArrayData::Double(v) => write_all(v),
        ArrayData::Single(v) => write_all(v),
        ArrayData::Int8(v) => write_all(v),
        ArrayData::Int16(v) => write_all(v),
        ArrayData::Int32(v) => write_all(v),
        ArrayData::Int64(v) => write_all(v),
        ArrayData::UInt8(v) => write_all(v),
        ArrayData::UInt16(v) => write_all(v),
        ArrayData::UInt32(v) => write_all(v),
        ArrayData::UInt64(v) => write_all(v),
        ArrayData::Bool(v) => write_all(v),
        ArrayData::ComplexDouble(v) => write_all(v),
        ArrayData::ComplexSingle(v) => write_all(v),
    }
}

/// Typecode for the fixed-typecode path; `None` for element types that
/// always take the object-array path
///
/// 64-bit integers need the runtime's `q`/`Q` typecodes.
pub fn typecode_for(element: ElementType) -> ConvResult<Option<TypeCode>> {
    let code = match element {
        ElementType::Double => TypeCode::Float64,
        ElementType::Single => TypeCode::Float32,
        ElementType::Int8 => TypeCode::Int8,
        ElementType::Int16 => TypeCode::Int16,
        ElementType::Int32 => TypeCode::Int32,
        ElementType::UInt8 => TypeCode::UInt8,
        ElementType::UInt16 => TypeCode::UInt16,
        ElementType::UInt32 => TypeCode::UInt32,
        ElementType::Int64 => TypeCode::LongLong,
        ElementType::UInt64 => TypeCode::ULongLong,
        ElementType::Bool | ElementType::ComplexDouble | ElementType::ComplexSingle => {
            return Ok(None)
        }
    };
    if !code.is_enabled() {
        return Err(ConversionError::object_convert(
            "unable to create array from Octave data",
        ));
    }
    Ok(Some(code))
}

/// Whether `array` can take the fixed-typecode path
pub fn is_vector_candidate(array: &NumericArray) -> bool {
    array.dims().is_flat()
        && !matches!(
            array.element_type(),
            ElementType::Bool | ElementType::ComplexDouble | ElementType::ComplexSingle
        )
}

/// Encode a real 2-D vector as a one-dimensional `array.array`
pub fn encode_vector(array: &NumericArray) -> ConvResult<ForeignHandle> {
    let code = match typecode_for(array.element_type())? {
        Some(code) if array.dims().is_flat() => code,
        _ => {
            return Err(ConversionError::value_convert(
                "unhandled Octave numeric vector type",
            ))
        }
    };
    log_encode(array.element_type().name(), "array");

    let module = import_module("array")?;
    let constructor = getattr(module.raw(), "array")?;
    let typecode = objects::new_str(&code.as_char().to_string());
    let result = builtins::call(constructor.raw(), &[typecode.raw()], &[])?;

    let bytes = objects::new_bytes(&native_bytes(array.data()));
    builtins::call_method(result.raw(), "frombytes", &[bytes.raw()])?;
    Ok(result.into())
}

/// Encode each element of a column-major collection into an `'O'` array
/// of shape `dims`
pub fn encode_object_array<E>(encoder: &E, dims: &Dims, items: &[HostValue]) -> ConvResult<ForeignHandle>
where
    E: Encode + ?Sized,
{
    let encoded = items
        .iter()
        .map(|item| {
            encoder
                .encode(item)?
                .into_owned()
                .ok_or_else(|| ConversionError::object_convert("element encoded to a null object"))
        })
        .collect::<ConvResult<Vec<Owned>>>()?;
    let result = runtime_array::new_object_array(dims.as_slice(), true, encoded)?;
    Ok(result.into())
}

/// Host dimensions of a foreign array: 0-D is 1x1, 1-D is always a row
fn host_dims(shape: &[usize]) -> Dims {
    match shape {
        [] => Dims::scalar(),
        [n] => Dims::row(*n),
        _ => Dims::new(shape),
    }
}

fn layout_error() -> ConversionError {
    ConversionError::object_convert("array layout exceeds its buffer")
}

/// Byte offset of every element, indexed by column-major host position
///
/// The innermost dimension is the base case; each outer level multiplies
/// the host stride by its extent.
struct StrideWalk<'a> {
    shape: &'a [usize],
    strides: &'a [isize],
    offsets: Vec<isize>,
}

impl StrideWalk<'_> {
    fn visit(&mut self, dim: usize, matindex: usize, matstride: usize, offset: isize) -> ConvResult<()> {
        let extent = self.shape[dim];
        let stride = self.strides[dim];
        for i in 0..extent {
            let index = i
                .checked_mul(matstride)
                .and_then(|step| step.checked_add(matindex))
                .ok_or_else(layout_error)?;
            let position = isize::try_from(i)
                .ok()
                .and_then(|i| i.checked_mul(stride))
                .and_then(|step| step.checked_add(offset))
                .ok_or_else(layout_error)?;
            if dim + 1 == self.shape.len() {
                *self.offsets.get_mut(index).ok_or_else(layout_error)? = position;
            } else {
                let next_stride = matstride.checked_mul(extent).ok_or_else(layout_error)?;
                self.visit(dim + 1, index, next_stride, position)?;
            }
        }
        Ok(())
    }
}

fn element_offsets(view: &ArrayView, buffer_len: usize) -> ConvResult<Vec<usize>> {
    let numel: usize = view.shape.iter().product();
    let base = isize::try_from(view.offset).map_err(|_| layout_error())?;
    let mut walk = StrideWalk {
        shape: &view.shape,
        strides: &view.strides,
        offsets: vec![base; numel],
    };
    if !view.shape.is_empty() && numel > 0 {
        walk.visit(0, 0, 1, base)?;
    }

    let itemsize = view.itemsize();
    walk.offsets
        .into_iter()
        .map(|offset| {
            usize::try_from(offset)
                .ok()
                .filter(|start| start.checked_add(itemsize).map_or(false, |end| end <= buffer_len))
                .ok_or_else(layout_error)
        })
        .collect()
}

/// Fold platform-sized integer typecodes into their fixed-width equivalents
fn normalize_typecode(code: TypeCode) -> ConvResult<TypeCode> {
    let fixed = match (code, code.itemsize()) {
        (TypeCode::Long, 4) => TypeCode::Int32,
        (TypeCode::Long, 8) => TypeCode::LongLong,
        (TypeCode::ULong, 4) => TypeCode::UInt32,
        (TypeCode::ULong, 8) => TypeCode::ULongLong,
        (TypeCode::Unicode, _) => {
            return Err(ConversionError::object_convert(format!(
                "array.array: unsupported array typecode '{}'",
                code.as_char()
            )))
        }
        (other, _) => other,
    };
    Ok(fixed)
}

fn numeric(dims: Dims, data: impl Into<ArrayData>) -> ConvResult<HostValue> {
    NumericArray::new(dims, data).map(HostValue::Array)
}

fn uniform<T>(items: &[HostValue], scalar: impl Fn(&HostValue) -> Option<T>) -> Option<Vec<T>> {
    items.iter().map(scalar).collect()
}

/// Numeric array when every element is the same scalar kind, else a cell
///
/// An empty object array has no kind to go by and becomes an empty double.
fn collect_elements(dims: Dims, items: Vec<HostValue>) -> ConvResult<HostValue> {
    let data: Option<ArrayData> = match items.first() {
        None => Some(Vec::<f64>::new().into()),
        Some(HostValue::Bool(_)) => uniform(&items, |item| match item {
            HostValue::Bool(v) => Some(*v),
            _ => None,
        })
        .map(ArrayData::from),
        Some(HostValue::Int(IntScalar::I64(_))) => uniform(&items, |item| match item {
            HostValue::Int(IntScalar::I64(v)) => Some(*v),
            _ => None,
        })
        .map(ArrayData::from),
        Some(HostValue::Float(FloatScalar::Double(_))) => uniform(&items, |item| match item {
            HostValue::Float(FloatScalar::Double(v)) => Some(*v),
            _ => None,
        })
        .map(ArrayData::from),
        Some(HostValue::Complex(ComplexScalar::Double(_))) => uniform(&items, |item| match item {
            HostValue::Complex(ComplexScalar::Double(v)) => Some(*v),
            _ => None,
        })
        .map(ArrayData::from),
        Some(_) => None,
    };
    match data {
        Some(data) => numeric(dims, data),
        None => CellArray::new(dims, items).map(HostValue::Cell),
    }
}

/// Decode an `array.array` into a numeric array, char array or cell
///
/// Elements of an `'O'` array go through `decoder`; a failure in any of
/// them fails the whole array.
pub fn decode_array<D>(decoder: &mut D, obj: ObjRef) -> ConvResult<HostValue>
where
    D: Decode + ?Sized,
{
    let view = runtime_array::view(obj)
        .ok_or_else(|| ConversionError::object_convert("failed to extract array: wrong type"))?;
    let code = normalize_typecode(view.typecode)?;
    let dims = host_dims(&view.shape);

    let bytes = match &view.buffer {
        ArrayBuffer::Bytes(bytes) => bytes,
        ArrayBuffer::Objects(items) => {
            let offsets = element_offsets(&view, items.len() * OBJECT_ITEMSIZE)?;
            let decoded = offsets
                .iter()
                .map(|offset| decoder.decode(items[offset / OBJECT_ITEMSIZE].raw()))
                .collect::<ConvResult<Vec<_>>>()?;
            return collect_elements(dims, decoded);
        }
    };
    let offsets = element_offsets(&view, bytes.len())?;

    match code {
        TypeCode::Char => {
            CharArray::with_dims(dims, gather::<u8>(bytes, &offsets)).map(HostValue::String)
        }
        TypeCode::Bool => numeric(dims, gather::<bool>(bytes, &offsets)),
        TypeCode::Int8 => numeric(dims, gather::<i8>(bytes, &offsets)),
        TypeCode::UInt8 => numeric(dims, gather::<u8>(bytes, &offsets)),
        TypeCode::Int16 => numeric(dims, gather::<i16>(bytes, &offsets)),
        TypeCode::UInt16 => numeric(dims, gather::<u16>(bytes, &offsets)),
        TypeCode::Int32 => numeric(dims, gather::<i32>(bytes, &offsets)),
        TypeCode::UInt32 => numeric(dims, gather::<u32>(bytes, &offsets)),
        TypeCode::LongLong => numeric(dims, gather::<i64>(bytes, &offsets)),
        TypeCode::ULongLong => numeric(dims, gather::<u64>(bytes, &offsets)),
        TypeCode::Float32 => numeric(dims, gather::<f32>(bytes, &offsets)),
        TypeCode::Float64 => numeric(dims, gather::<f64>(bytes, &offsets)),
        TypeCode::Complex64 => numeric(dims, gather::<Complex32>(bytes, &offsets)),
        TypeCode::Complex128 => numeric(dims, gather::<Complex64>(bytes, &offsets)),
        other => Err(ConversionError::object_convert(format!(
            "array.array: unsupported array typecode '{}'",
            other.as_char()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pythonic_runtime::{run_string, Mode};

    /// Floats and strings; anything else is NaN
    struct Scalars;

    impl Decode for Scalars {
        fn decode(&mut self, obj: ObjRef) -> ConvResult<HostValue> {
            if let Some(text) = objects::str_wtf8(obj) {
                return Ok(HostValue::from(String::from_utf8_lossy(&text).into_owned()));
            }
            Ok(HostValue::from(objects::as_float(obj).unwrap_or(f64::NAN)))
        }
    }

    fn eval(code: &str) -> Owned {
        let globals = objects::new_dict();
        run_string(code, Mode::Eval, globals.raw(), globals.raw()).unwrap()
    }

    fn decode(code: &str) -> HostValue {
        let obj = eval(code);
        decode_array(&mut Scalars, obj.raw()).unwrap()
    }

    #[test]
    fn test_encode_row_vector_bytes() {
        let array = NumericArray::row(vec![1.0, 2.0, 3.0]);
        let encoded = encode_vector(&array).unwrap();
        let obj = encoded.get().unwrap();
        assert_eq!(objects::class_name(obj), "array.array");

        let view = runtime_array::view(obj).unwrap();
        assert_eq!(view.typecode, TypeCode::Float64);
        assert_eq!(view.shape, vec![3]);
        let ArrayBuffer::Bytes(bytes) = view.buffer else {
            panic!("expected a byte buffer");
        };
        let mut expected = Vec::new();
        for value in [1.0f64, 2.0, 3.0] {
            expected.extend_from_slice(&value.to_ne_bytes());
        }
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_matrix_is_not_a_vector() {
        let array = NumericArray::new(Dims::matrix(2, 2), vec![1i32, 2, 3, 4]).unwrap();
        assert!(!is_vector_candidate(&array));
        assert!(encode_vector(&array).is_err());
        assert!(!is_vector_candidate(&NumericArray::row(vec![true, false])));
    }

    #[test]
    fn test_one_dimensional_decodes_to_row() {
        let value = decode("__import__('array').array('h', [1, -2, 3])");
        assert_eq!(value, HostValue::Array(NumericArray::row(vec![1i16, -2, 3])));
    }

    #[test]
    fn test_two_dimensional_is_column_major() {
        // rows [1, 2, 3] and [4, 5, 6]
        let value = decode("__import__('array').array('d', [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).reshape((2, 3))");
        let expected = NumericArray::new(Dims::matrix(2, 3), vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]).unwrap();
        assert_eq!(value, HostValue::Array(expected));
    }

    #[test]
    fn test_transposed_view_follows_strides() {
        let value = decode(
            "__import__('array').array('i', [1, 2, 3, 4, 5, 6]).reshape((2, 3)).transpose()",
        );
        let expected = NumericArray::new(Dims::matrix(3, 2), vec![1i32, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(value, HostValue::Array(expected));
    }

    #[test]
    fn test_char_array_decodes_to_string() {
        let value = decode("__import__('array').array('c', b'abc')");
        assert_eq!(value, HostValue::from("abc"));
    }

    #[test]
    fn test_unicode_array_rejected() {
        let obj = eval("__import__('array').array('u', 'abc')");
        let error = decode_array(&mut Scalars, obj.raw()).unwrap_err();
        assert_eq!(error.message, "array.array: unsupported array typecode 'u'");
    }

    #[test]
    fn test_uniform_object_array_decodes_to_numeric() {
        let value = decode("__import__('array').array('O', [1.5, 2.5])");
        assert_eq!(value, HostValue::Array(NumericArray::row(vec![1.5, 2.5])));
    }

    #[test]
    fn test_mixed_object_array_decodes_to_cell() {
        let value = decode("__import__('array').array('O', [1.5, 'two'])");
        assert_eq!(
            value,
            HostValue::Cell(CellArray::row(vec![HostValue::from(1.5), HostValue::from("two")]))
        );
    }

    #[test]
    fn test_collect_elements_by_kind() {
        let dims = Dims::matrix(2, 1);
        assert_eq!(
            collect_elements(dims.clone(), vec![HostValue::from(true), HostValue::from(false)]).unwrap(),
            HostValue::Array(NumericArray::column(vec![true, false]))
        );
        assert_eq!(
            collect_elements(dims.clone(), vec![HostValue::from(3i64), HostValue::from(-4i64)]).unwrap(),
            HostValue::Array(NumericArray::column(vec![3i64, -4]))
        );
        // an int beside a float is not uniform
        let mixed = collect_elements(dims, vec![HostValue::from(3i64), HostValue::from(4.0)]).unwrap();
        assert!(matches!(mixed, HostValue::Cell(_)));

        let empty = collect_elements(Dims::new(&[2, 0, 3]), Vec::new()).unwrap();
        assert_eq!(
            empty,
            HostValue::Array(NumericArray::new(Dims::new(&[2, 0, 3]), Vec::<f64>::new()).unwrap())
        );
    }

    #[test]
    fn test_empty_and_complex() {
        assert_eq!(
            decode("__import__('array').array('f')"),
            HostValue::Array(NumericArray::row(Vec::<f32>::new()))
        );
        assert_eq!(
            decode("__import__('array').array('D', [1+2j])"),
            HostValue::Array(NumericArray::row(vec![Complex64::new(1.0, 2.0)]))
        );
    }
}
