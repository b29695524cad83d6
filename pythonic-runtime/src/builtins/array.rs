//! Array type - fixed-typecode, N-dimensional strided buffers
//!
//! Design: an `array.array` holds homogeneous machine elements:
//! - One character typecode per array (`b`, `d`, `D`, ...), element bytes in
//!   native byte order
//! - `shape` and byte `strides` describe an N-dimensional view over the
//!   buffer starting at `offset`
//! - Typecode `'O'` stores object references instead of bytes; its strides
//!   count in units of `OBJECT_ITEMSIZE`

use std::os::raw::c_long;

use num_complex::Complex64;
use num_traits::ToPrimitive;
use smallvec::SmallVec;

use crate::builtins::{numbers, string};
use crate::err::{self, RtResult};
use crate::heap::{self, with_interp};
use crate::objects::{self, Args, NativeMethod, ObjRef, Payload};
use crate::refcount::Owned;
use crate::types::BuiltinType;

pub type Shape = SmallVec<[usize; 4]>;
pub type Strides = SmallVec<[isize; 4]>;

/// Slot width of an object reference in `'O'` arrays
pub const OBJECT_ITEMSIZE: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeCode {
    Char,
    Bool,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Long,
    ULong,
    LongLong,
    ULongLong,
    Float32,
    Float64,
    Complex64,
    Complex128,
    Object,
    Unicode,
}

impl TypeCode {
    pub const ALL: [TypeCode; 18] = [
        TypeCode::Char,
        TypeCode::Bool,
        TypeCode::Int8,
        TypeCode::UInt8,
        TypeCode::Int16,
        TypeCode::UInt16,
        TypeCode::Int32,
        TypeCode::UInt32,
        TypeCode::Long,
        TypeCode::ULong,
        TypeCode::LongLong,
        TypeCode::ULongLong,
        TypeCode::Float32,
        TypeCode::Float64,
        TypeCode::Complex64,
        TypeCode::Complex128,
        TypeCode::Object,
        TypeCode::Unicode,
    ];

    pub fn as_char(self) -> char {
        match self {
            TypeCode::Char => 'c',
            TypeCode::Bool => '?',
            TypeCode::Int8 => 'b',
            TypeCode::UInt8 => 'B',
            TypeCode::Int16 => 'h',
            TypeCode::UInt16 => 'H',
            TypeCode::Int32 => 'i',
            TypeCode::UInt32 => 'I',
            TypeCode::Long => 'l',
            TypeCode::ULong => 'L',
            TypeCode::LongLong => 'q',
            TypeCode::ULongLong => 'Q',
            TypeCode::Float32 => 'f',
            TypeCode::Float64 => 'd',
            TypeCode::Complex64 => 'F',
            TypeCode::Complex128 => 'D',
            TypeCode::Object => 'O',
            TypeCode::Unicode => 'u',
        }
    }

    /// Whether this build of the runtime provides the typecode
    pub fn is_enabled(self) -> bool {
        match self {
            TypeCode::LongLong | TypeCode::ULongLong => cfg!(feature = "long-long"),
            _ => true,
        }
    }

    /// Parse an enabled typecode character
    pub fn from_char(c: char) -> Option<TypeCode> {
        Self::ALL
            .iter()
            .copied()
            .find(|code| code.as_char() == c && code.is_enabled())
    }

    pub fn itemsize(self) -> usize {
        match self {
            TypeCode::Char | TypeCode::Bool | TypeCode::Int8 | TypeCode::UInt8 => 1,
            TypeCode::Int16 | TypeCode::UInt16 => 2,
            TypeCode::Int32 | TypeCode::UInt32 | TypeCode::Float32 | TypeCode::Unicode => 4,
            TypeCode::Long | TypeCode::ULong => std::mem::size_of::<c_long>(),
            TypeCode::LongLong | TypeCode::ULongLong | TypeCode::Float64 => 8,
            TypeCode::Complex64 => 8,
            TypeCode::Complex128 => 16,
            TypeCode::Object => OBJECT_ITEMSIZE,
        }
    }

    /// Every enabled typecode, as `array.typecodes` reports them
    pub fn supported() -> String {
        Self::ALL
            .iter()
            .filter(|code| code.is_enabled())
            .map(|code| code.as_char())
            .collect()
    }
}

pub(crate) enum ArrayStorage {
    Bytes(Vec<u8>),
    Objects(Vec<ObjRef>),
}

pub(crate) struct ArrayData {
    pub typecode: TypeCode,
    pub shape: Shape,
    pub strides: Strides,
    pub offset: usize,
    pub storage: ArrayStorage,
}

impl ArrayData {
    fn empty(typecode: TypeCode) -> Self {
        let storage = if typecode == TypeCode::Object {
            ArrayStorage::Objects(Vec::new())
        } else {
            ArrayStorage::Bytes(Vec::new())
        };
        Self {
            typecode,
            shape: SmallVec::from_slice(&[0]),
            strides: SmallVec::from_slice(&[typecode.itemsize() as isize]),
            offset: 0,
            storage,
        }
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    fn is_contiguous_1d(&self) -> bool {
        self.shape.len() == 1
            && self.offset == 0
            && self.strides[0] == self.typecode.itemsize() as isize
    }

    pub(crate) fn children(self, out: &mut Vec<ObjRef>) {
        if let ArrayStorage::Objects(items) = self.storage {
            out.extend(items);
        }
    }
}

/// Array layout detached from the heap
#[derive(Clone)]
struct Layout {
    typecode: TypeCode,
    shape: Shape,
    strides: Strides,
    offset: usize,
}

enum RawBuffer {
    Bytes(Vec<u8>),
    Objects(Vec<ObjRef>),
}

impl Layout {
    fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Byte offsets of every element; C order walks the last axis fastest,
    /// Fortran order the first
    fn element_offsets(&self, fortran: bool) -> Vec<usize> {
        let mut out = vec![self.offset as isize];
        let axes: Vec<usize> = if fortran {
            (0..self.ndim()).rev().collect()
        } else {
            (0..self.ndim()).collect()
        };
        for axis in axes {
            let (dim, stride) = (self.shape[axis], self.strides[axis]);
            let mut next = Vec::with_capacity(out.len() * dim);
            if fortran {
                for i in 0..dim {
                    next.extend(out.iter().map(|base| base + i as isize * stride));
                }
            } else {
                for base in &out {
                    next.extend((0..dim).map(|i| base + i as isize * stride));
                }
            }
            out = next;
        }
        out.into_iter().map(|offset| offset as usize).collect()
    }
}

fn contiguous_strides(shape: &[usize], itemsize: usize, fortran: bool) -> Strides {
    let mut strides: Strides = SmallVec::from_elem(0, shape.len());
    let mut step = itemsize as isize;
    if fortran {
        for (axis, dim) in shape.iter().enumerate() {
            strides[axis] = step;
            step *= (*dim).max(1) as isize;
        }
    } else {
        for (axis, dim) in shape.iter().enumerate().rev() {
            strides[axis] = step;
            step *= (*dim).max(1) as isize;
        }
    }
    strides
}

fn snapshot(obj: ObjRef) -> Option<(Layout, RawBuffer)> {
    heap::view(obj, |payload| match payload {
        Payload::Array(data) => {
            let layout = Layout {
                typecode: data.typecode,
                shape: data.shape.clone(),
                strides: data.strides.clone(),
                offset: data.offset,
            };
            let buffer = match &data.storage {
                ArrayStorage::Bytes(bytes) => RawBuffer::Bytes(bytes.clone()),
                ArrayStorage::Objects(items) => RawBuffer::Objects(items.clone()),
            };
            Some((layout, buffer))
        }
        _ => None,
    })
}

fn expect_array(obj: ObjRef) -> RtResult<(Layout, RawBuffer)> {
    snapshot(obj).ok_or_else(|| {
        err::raise(
            BuiltinType::TypeError,
            format!("expected array, got {}", objects::type_name(obj)),
        )
    })
}

// ---------------------------------------------------------------------------
// Element codec
// ---------------------------------------------------------------------------

fn ne<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

fn read_element(typecode: TypeCode, bytes: &[u8]) -> Owned {
    match typecode {
        TypeCode::Char => objects::new_bytes(&bytes[..1]),
        TypeCode::Bool => objects::new_bool(bytes[0] != 0),
        TypeCode::Int8 => objects::new_int_i64(i64::from(bytes[0] as i8)),
        TypeCode::UInt8 => objects::new_int_i64(i64::from(bytes[0])),
        TypeCode::Int16 => objects::new_int_i64(i64::from(i16::from_ne_bytes(ne(bytes)))),
        TypeCode::UInt16 => objects::new_int_i64(i64::from(u16::from_ne_bytes(ne(bytes)))),
        TypeCode::Int32 => objects::new_int_i64(i64::from(i32::from_ne_bytes(ne(bytes)))),
        TypeCode::UInt32 => objects::new_int_i64(i64::from(u32::from_ne_bytes(ne(bytes)))),
        TypeCode::Long if typecode.itemsize() == 4 => {
            objects::new_int_i64(i64::from(i32::from_ne_bytes(ne(bytes))))
        }
        TypeCode::ULong if typecode.itemsize() == 4 => {
            objects::new_int_i64(i64::from(u32::from_ne_bytes(ne(bytes))))
        }
        TypeCode::Long | TypeCode::LongLong => objects::new_int_i64(i64::from_ne_bytes(ne(bytes))),
        TypeCode::ULong | TypeCode::ULongLong => objects::new_int_u64(u64::from_ne_bytes(ne(bytes))),
        TypeCode::Float32 => objects::new_float(f64::from(f32::from_ne_bytes(ne(bytes)))),
        TypeCode::Float64 => objects::new_float(f64::from_ne_bytes(ne(bytes))),
        TypeCode::Complex64 => objects::new_complex(Complex64::new(
            f64::from(f32::from_ne_bytes(ne(bytes))),
            f64::from(f32::from_ne_bytes(ne(&bytes[4..]))),
        )),
        TypeCode::Complex128 => objects::new_complex(Complex64::new(
            f64::from_ne_bytes(ne(bytes)),
            f64::from_ne_bytes(ne(&bytes[8..])),
        )),
        TypeCode::Unicode => {
            let mut buf = Vec::with_capacity(4);
            string::push_code_point(&mut buf, u32::from_ne_bytes(ne(bytes)));
            objects::new_str_wtf8(buf)
        }
        TypeCode::Object => objects::new_none(),
    }
}

fn out_of_range(typecode: TypeCode) -> err::Pending {
    err::raise(
        BuiltinType::OverflowError,
        format!("value out of range for typecode '{}'", typecode.as_char()),
    )
}

fn encode_element(typecode: TypeCode, obj: ObjRef) -> RtResult<Vec<u8>> {
    fn int_of(typecode: TypeCode, obj: ObjRef) -> RtResult<num_bigint::BigInt> {
        objects::as_int(obj).map(|v| v.to_bigint()).ok_or_else(|| {
            err::raise(
                BuiltinType::TypeError,
                format!(
                    "array item must be integer for typecode '{}', not {}",
                    typecode.as_char(),
                    objects::type_name(obj)
                ),
            )
        })
    }

    fn real_of(obj: ObjRef) -> RtResult<f64> {
        match objects::type_of(obj) {
            BuiltinType::Bool | BuiltinType::Int | BuiltinType::Float => {
                objects::as_number(obj).map(|c| c.re).ok_or_else(|| {
                    err::raise(BuiltinType::OverflowError, "int too large to convert to float")
                })
            }
            _ => Err(err::raise(
                BuiltinType::TypeError,
                format!("must be real number, not {}", objects::type_name(obj)),
            )),
        }
    }

    macro_rules! int_bytes {
        ($conv:ident) => {
            int_of(typecode, obj)?
                .$conv()
                .map(|v| v.to_ne_bytes().to_vec())
                .ok_or_else(|| out_of_range(typecode))
        };
    }

    let long_is_32 = std::mem::size_of::<c_long>() == 4;
    match typecode {
        TypeCode::Int8 => int_bytes!(to_i8),
        TypeCode::UInt8 => int_bytes!(to_u8),
        TypeCode::Int16 => int_bytes!(to_i16),
        TypeCode::UInt16 => int_bytes!(to_u16),
        TypeCode::Int32 => int_bytes!(to_i32),
        TypeCode::UInt32 => int_bytes!(to_u32),
        TypeCode::Long if long_is_32 => int_bytes!(to_i32),
        TypeCode::ULong if long_is_32 => int_bytes!(to_u32),
        TypeCode::Long | TypeCode::LongLong => int_bytes!(to_i64),
        TypeCode::ULong | TypeCode::ULongLong => int_bytes!(to_u64),
        TypeCode::Bool => Ok(vec![u8::from(objects::is_truthy(obj))]),
        TypeCode::Float32 => Ok((real_of(obj)? as f32).to_ne_bytes().to_vec()),
        TypeCode::Float64 => Ok(real_of(obj)?.to_ne_bytes().to_vec()),
        TypeCode::Complex64 | TypeCode::Complex128 => {
            let value = objects::as_number(obj).ok_or_else(|| {
                err::raise(
                    BuiltinType::TypeError,
                    format!("must be complex number, not {}", objects::type_name(obj)),
                )
            })?;
            let mut out = Vec::with_capacity(typecode.itemsize());
            if typecode == TypeCode::Complex64 {
                out.extend_from_slice(&(value.re as f32).to_ne_bytes());
                out.extend_from_slice(&(value.im as f32).to_ne_bytes());
            } else {
                out.extend_from_slice(&value.re.to_ne_bytes());
                out.extend_from_slice(&value.im.to_ne_bytes());
            }
            Ok(out)
        }
        TypeCode::Char => match objects::bytes_data(obj) {
            Some(bytes) if bytes.len() == 1 => Ok(bytes),
            _ => Err(err::raise(
                BuiltinType::TypeError,
                "array item must be a byte string of length 1",
            )),
        },
        TypeCode::Unicode => {
            let cps = objects::str_wtf8(obj).map(|text| string::decode_wtf8(&text));
            match cps.as_deref() {
                Some([cp]) => Ok(cp.to_ne_bytes().to_vec()),
                _ => Err(err::raise(
                    BuiltinType::TypeError,
                    "array item must be a unicode character",
                )),
            }
        }
        TypeCode::Object => Ok(Vec::new()),
    }
}

// ---------------------------------------------------------------------------
// Element access
// ---------------------------------------------------------------------------

fn element_at(layout: &Layout, buffer: &RawBuffer, offset: usize) -> Owned {
    match buffer {
        RawBuffer::Bytes(bytes) => {
            read_element(layout.typecode, &bytes[offset..offset + layout.typecode.itemsize()])
        }
        RawBuffer::Objects(items) => Owned::from_borrowed(items[offset / OBJECT_ITEMSIZE]),
    }
}

fn build_list(layout: &Layout, buffer: &RawBuffer, axis: usize, base: isize) -> Owned {
    if axis == layout.ndim() {
        return element_at(layout, buffer, base as usize);
    }
    let items = (0..layout.shape[axis])
        .map(|i| build_list(layout, buffer, axis + 1, base + i as isize * layout.strides[axis]))
        .collect();
    objects::new_list(items)
}

/// `array.tolist()`: nested lists, or the bare element for 0-D arrays
pub fn tolist(obj: ObjRef) -> RtResult<Owned> {
    let (layout, buffer) = expect_array(obj)?;
    Ok(build_list(&layout, &buffer, 0, layout.offset as isize))
}

/// Items along the first axis
pub(crate) fn iterate(obj: ObjRef) -> RtResult<Vec<Owned>> {
    let (layout, _) = expect_array(obj)?;
    if layout.ndim() == 0 {
        return Err(err::raise(BuiltinType::TypeError, "iteration over a 0-d array"));
    }
    let list = tolist(obj)?;
    Ok(objects::sequence_items(list.raw()).unwrap_or_default())
}

/// Item `position` along the first axis
pub(crate) fn item(obj: ObjRef, position: usize) -> RtResult<Owned> {
    let (layout, buffer) = expect_array(obj)?;
    let base = layout.offset as isize + position as isize * layout.strides[0];
    Ok(build_list(&layout, &buffer, 1, base))
}

/// Overwrite element `position` of a 1-D array
pub(crate) fn set_item(obj: ObjRef, position: usize, value: ObjRef) -> RtResult<()> {
    let (layout, _) = expect_array(obj)?;
    if layout.ndim() != 1 {
        return Err(err::raise(
            BuiltinType::NotImplementedError,
            "item assignment is only supported on 1-D arrays",
        ));
    }
    let offset = (layout.offset as isize + position as isize * layout.strides[0]) as usize;
    let encoded = encode_element(layout.typecode, value)?;

    with_interp(|interp| {
        let old = match interp.payload_mut(obj) {
            Payload::Array(data) => match &mut data.storage {
                ArrayStorage::Bytes(bytes) => {
                    bytes[offset..offset + encoded.len()].copy_from_slice(&encoded);
                    None
                }
                ArrayStorage::Objects(items) => {
                    Some(std::mem::replace(&mut items[offset / OBJECT_ITEMSIZE], value))
                }
            },
            _ => None,
        };
        if let Some(old) = old {
            interp.incref(value);
            interp.decref(old);
        }
    });
    Ok(())
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

fn parse_typecode(obj: ObjRef) -> RtResult<TypeCode> {
    let text = string::expect_str(obj, "array() argument 1")?;
    let mut chars = text.chars();
    let code = match (chars.next(), chars.next()) {
        (Some(c), None) => TypeCode::from_char(c),
        _ => None,
    };
    code.ok_or_else(|| {
        let codes: Vec<String> = TypeCode::supported().chars().map(String::from).collect();
        err::raise(
            BuiltinType::ValueError,
            format!("bad typecode (must be one of {})", codes.join(", ")),
        )
    })
}

fn append_items(obj: ObjRef, typecode: TypeCode, items: &[ObjRef]) -> RtResult<()> {
    if typecode == TypeCode::Object {
        with_interp(|interp| {
            for item in items {
                interp.incref(*item);
            }
            if let Payload::Array(data) = interp.payload_mut(obj) {
                if let ArrayStorage::Objects(stored) = &mut data.storage {
                    stored.extend_from_slice(items);
                }
                data.shape[0] += items.len();
            }
        });
        return Ok(());
    }

    let mut encoded = Vec::with_capacity(items.len() * typecode.itemsize());
    for item in items {
        encoded.extend(encode_element(typecode, *item)?);
    }
    append_raw(obj, &encoded, items.len());
    Ok(())
}

fn append_raw(obj: ObjRef, bytes: &[u8], count: usize) {
    with_interp(|interp| {
        if let Payload::Array(data) = interp.payload_mut(obj) {
            if let ArrayStorage::Bytes(stored) = &mut data.storage {
                stored.extend_from_slice(bytes);
            }
            data.shape[0] += count;
        }
    });
}

/// `array.array(typecode[, initializer])`
pub(crate) fn construct(args: Args<'_>) -> RtResult<Owned> {
    args.check_count("array", 1, 2)?;
    let typecode = parse_typecode(args.positional[0])?;
    let array = objects::alloc(Payload::Array(ArrayData::empty(typecode)));

    if let Some(initializer) = args.get(1) {
        if objects::type_of(initializer) == BuiltinType::Bytes && typecode != TypeCode::Object {
            frombytes(array.raw(), Args::new(&[initializer], &[]))?;
        } else if typecode == TypeCode::Unicode && objects::type_of(initializer) == BuiltinType::Str {
            let chars = super::iterate(initializer)?;
            let raw: Vec<ObjRef> = chars.iter().map(Owned::raw).collect();
            append_items(array.raw(), typecode, &raw)?;
        } else {
            let items = super::iterate(initializer)?;
            let raw: Vec<ObjRef> = items.iter().map(Owned::raw).collect();
            append_items(array.raw(), typecode, &raw)?;
        }
    }
    Ok(array)
}

/// Build an array over an explicit strided byte buffer
///
/// Every element addressed by `shape`/`strides`/`offset` must lie inside
/// `bytes`.
pub fn from_parts(
    typecode: TypeCode,
    shape: &[usize],
    strides: &[isize],
    offset: usize,
    bytes: Vec<u8>,
) -> RtResult<Owned> {
    if typecode == TypeCode::Object || shape.len() != strides.len() {
        return Err(err::raise(
            BuiltinType::ValueError,
            "invalid array layout",
        ));
    }

    let itemsize = typecode.itemsize() as isize;
    if shape.iter().product::<usize>() > 0 {
        let mut low = offset as isize;
        let mut high = offset as isize;
        for (dim, stride) in shape.iter().zip(strides) {
            let span = (*dim as isize - 1) * stride;
            if span < 0 {
                low += span;
            } else {
                high += span;
            }
        }
        if low < 0 || high + itemsize > bytes.len() as isize {
            return Err(err::raise(
                BuiltinType::ValueError,
                "array layout exceeds the buffer",
            ));
        }
    }

    Ok(objects::alloc(Payload::Array(ArrayData {
        typecode,
        shape: SmallVec::from_slice(shape),
        strides: SmallVec::from_slice(strides),
        offset,
        storage: ArrayStorage::Bytes(bytes),
    })))
}

/// Build an `'O'` array of `shape` from items listed in C or Fortran order
pub fn new_object_array(shape: &[usize], fortran: bool, items: Vec<Owned>) -> RtResult<Owned> {
    if shape.iter().product::<usize>() != items.len() {
        return Err(err::raise(
            BuiltinType::ValueError,
            format!(
                "cannot build object array of shape {shape:?} from {} items",
                items.len()
            ),
        ));
    }
    let strides = contiguous_strides(shape, OBJECT_ITEMSIZE, fortran);
    let raw = items.into_iter().map(Owned::into_raw).collect();
    Ok(objects::alloc(Payload::Array(ArrayData {
        typecode: TypeCode::Object,
        shape: SmallVec::from_slice(shape),
        strides,
        offset: 0,
        storage: ArrayStorage::Objects(raw),
    })))
}

// ---------------------------------------------------------------------------
// Bridge-facing view
// ---------------------------------------------------------------------------

/// Element storage of an array view
pub enum ArrayBuffer {
    Bytes(Vec<u8>),
    Objects(Vec<Owned>),
}

/// Detached copy of an array: layout plus storage
pub struct ArrayView {
    pub typecode: TypeCode,
    pub shape: Vec<usize>,
    /// Byte strides (object arrays count `OBJECT_ITEMSIZE` per slot)
    pub strides: Vec<isize>,
    pub offset: usize,
    pub buffer: ArrayBuffer,
}

impl ArrayView {
    pub fn itemsize(&self) -> usize {
        self.typecode.itemsize()
    }
}

/// Copy out the layout and storage of an array object
pub fn view(obj: ObjRef) -> Option<ArrayView> {
    let (layout, buffer) = snapshot(obj)?;
    let buffer = match buffer {
        RawBuffer::Bytes(bytes) => ArrayBuffer::Bytes(bytes),
        RawBuffer::Objects(items) => {
            ArrayBuffer::Objects(items.into_iter().map(Owned::from_borrowed).collect())
        }
    };
    Some(ArrayView {
        typecode: layout.typecode,
        shape: layout.shape.to_vec(),
        strides: layout.strides.to_vec(),
        offset: layout.offset,
        buffer,
    })
}

// ---------------------------------------------------------------------------
// Methods and attributes
// ---------------------------------------------------------------------------

fn frombytes(receiver: ObjRef, args: Args<'_>) -> RtResult<Owned> {
    args.check_count("frombytes", 1, 1)?;
    let (layout, _) = expect_array(receiver)?;
    let Some(bytes) = objects::bytes_data(args.positional[0]) else {
        return Err(err::raise(
            BuiltinType::TypeError,
            format!(
                "a bytes-like object is required, not '{}'",
                objects::type_name(args.positional[0])
            ),
        ));
    };
    if layout.typecode == TypeCode::Object {
        return Err(err::raise(
            BuiltinType::TypeError,
            "frombytes() is not supported for object arrays",
        ));
    }
    let contiguous = heap::view(receiver, |payload| match payload {
        Payload::Array(data) => data.is_contiguous_1d(),
        _ => false,
    });
    if !contiguous {
        return Err(err::raise(
            BuiltinType::ValueError,
            "frombytes() requires a contiguous 1-D array",
        ));
    }
    let itemsize = layout.typecode.itemsize();
    if bytes.len() % itemsize != 0 {
        return Err(err::raise(
            BuiltinType::ValueError,
            "bytes length not a multiple of item size",
        ));
    }
    append_raw(receiver, &bytes, bytes.len() / itemsize);
    Ok(objects::new_none())
}

fn tobytes(receiver: ObjRef, args: Args<'_>) -> RtResult<Owned> {
    args.check_count("tobytes", 0, 0)?;
    let (layout, buffer) = expect_array(receiver)?;
    let RawBuffer::Bytes(bytes) = buffer else {
        return Err(err::raise(
            BuiltinType::TypeError,
            "tobytes() is not supported for object arrays",
        ));
    };
    let itemsize = layout.typecode.itemsize();
    let mut out = Vec::with_capacity(layout.shape.iter().product::<usize>() * itemsize);
    for offset in layout.element_offsets(false) {
        out.extend_from_slice(&bytes[offset..offset + itemsize]);
    }
    Ok(objects::new_bytes(&out))
}

fn append(receiver: ObjRef, args: Args<'_>) -> RtResult<Owned> {
    args.check_count("append", 1, 1)?;
    let (layout, _) = expect_array(receiver)?;
    let contiguous = heap::view(receiver, |payload| match payload {
        Payload::Array(data) => data.is_contiguous_1d(),
        _ => false,
    });
    if !contiguous {
        return Err(err::raise(
            BuiltinType::ValueError,
            "append() requires a contiguous 1-D array",
        ));
    }
    append_items(receiver, layout.typecode, &[args.positional[0]])?;
    Ok(objects::new_none())
}

fn parse_shape(obj: ObjRef) -> RtResult<Vec<usize>> {
    let dims = match objects::as_int(obj) {
        Some(_) => vec![Owned::from_borrowed(obj)],
        None => super::iterate(obj)?,
    };
    dims.iter()
        .map(|dim| {
            let value = numbers::expect_index(dim.raw(), "shape entry")?;
            usize::try_from(value).map_err(|_| {
                err::raise(BuiltinType::ValueError, "negative dimensions are not allowed")
            })
        })
        .collect()
}

/// Copy elements in the given order into a fresh contiguous array
fn relayout(
    layout: &Layout,
    buffer: &RawBuffer,
    shape: &[usize],
    fortran: bool,
) -> Owned {
    let offsets = layout.element_offsets(fortran);
    let itemsize = layout.typecode.itemsize();
    let storage = match buffer {
        RawBuffer::Bytes(bytes) => {
            let mut out = Vec::with_capacity(offsets.len() * itemsize);
            for offset in &offsets {
                out.extend_from_slice(&bytes[*offset..*offset + itemsize]);
            }
            ArrayStorage::Bytes(out)
        }
        RawBuffer::Objects(items) => {
            let picked: Vec<ObjRef> = offsets
                .iter()
                .map(|offset| items[offset / OBJECT_ITEMSIZE])
                .collect();
            for item in &picked {
                heap::incref(*item);
            }
            ArrayStorage::Objects(picked)
        }
    };
    objects::alloc(Payload::Array(ArrayData {
        typecode: layout.typecode,
        shape: SmallVec::from_slice(shape),
        strides: contiguous_strides(shape, itemsize, fortran),
        offset: 0,
        storage,
    }))
}

fn reshape(receiver: ObjRef, args: Args<'_>) -> RtResult<Owned> {
    args.check_count("reshape", 1, 2)?;
    let (layout, buffer) = expect_array(receiver)?;
    let shape = parse_shape(args.positional[0])?;
    let fortran = match args.arg(1, "order") {
        Some(order) => match string::expect_str(order, "order")?.as_str() {
            "C" => false,
            "F" => true,
            other => {
                return Err(err::raise(
                    BuiltinType::ValueError,
                    format!("order must be 'C' or 'F', not '{other}'"),
                ))
            }
        },
        None => false,
    };

    let size: usize = layout.shape.iter().product();
    if shape.iter().product::<usize>() != size {
        return Err(err::raise(
            BuiltinType::ValueError,
            format!("cannot reshape array of size {size} into shape {shape:?}"),
        ));
    }
    Ok(relayout(&layout, &buffer, &shape, fortran))
}

fn transpose(receiver: ObjRef, args: Args<'_>) -> RtResult<Owned> {
    args.check_count("transpose", 0, 0)?;
    let (layout, buffer) = expect_array(receiver)?;
    let storage = match buffer {
        RawBuffer::Bytes(bytes) => ArrayStorage::Bytes(bytes),
        RawBuffer::Objects(items) => {
            for item in &items {
                heap::incref(*item);
            }
            ArrayStorage::Objects(items)
        }
    };
    Ok(objects::alloc(Payload::Array(ArrayData {
        typecode: layout.typecode,
        shape: layout.shape.iter().rev().copied().collect(),
        strides: layout.strides.iter().rev().copied().collect(),
        offset: layout.offset,
        storage,
    })))
}

fn tolist_method(receiver: ObjRef, args: Args<'_>) -> RtResult<Owned> {
    args.check_count("tolist", 0, 0)?;
    tolist(receiver)
}

pub(super) const ARRAY_METHODS: &[(&str, NativeMethod)] = &[
    ("frombytes", frombytes),
    ("tobytes", tobytes),
    ("append", append),
    ("reshape", reshape),
    ("transpose", transpose),
    ("tolist", tolist_method),
];

/// Data attributes (`typecode`, `itemsize`, `ndim`, `shape`, `strides`)
pub(super) fn attribute(obj: ObjRef, name: &str) -> Option<Owned> {
    let (layout, _) = snapshot(obj)?;
    let ints = |values: Vec<i64>| {
        objects::new_tuple(values.into_iter().map(objects::new_int_i64).collect())
    };
    Some(match name {
        "typecode" => objects::new_str(&layout.typecode.as_char().to_string()),
        "itemsize" => objects::new_int_i64(layout.typecode.itemsize() as i64),
        "ndim" => objects::new_int_i64(layout.ndim() as i64),
        "shape" => ints(layout.shape.iter().map(|d| *d as i64).collect()),
        "strides" => ints(layout.strides.iter().map(|s| *s as i64).collect()),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doubles(values: &[f64]) -> Owned {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_ne_bytes()).collect();
        from_parts(TypeCode::Float64, &[values.len()], &[8], 0, bytes).unwrap()
    }

    #[test]
    fn test_typecodes() {
        assert_eq!(TypeCode::from_char('d'), Some(TypeCode::Float64));
        assert_eq!(TypeCode::from_char('x'), None);
        assert_eq!(TypeCode::Long.itemsize(), std::mem::size_of::<c_long>());
        assert!(TypeCode::supported().contains('O'));
        #[cfg(feature = "long-long")]
        assert_eq!(TypeCode::from_char('q'), Some(TypeCode::LongLong));
    }

    #[test]
    fn test_construct_and_frombytes() {
        let code = objects::new_str("d");
        let array = construct(Args::new(&[code.raw()], &[])).unwrap();
        let payload: Vec<u8> = [1.0f64, 2.0].iter().flat_map(|v| v.to_ne_bytes()).collect();
        let bytes = objects::new_bytes(&payload);
        frombytes(array.raw(), Args::new(&[bytes.raw()], &[])).unwrap();

        let view = view(array.raw()).unwrap();
        assert_eq!(view.shape, vec![2]);
        match view.buffer {
            ArrayBuffer::Bytes(stored) => assert_eq!(stored, payload),
            ArrayBuffer::Objects(_) => panic!("expected bytes"),
        }
    }

    #[test]
    fn test_frombytes_rejects_partial_items() {
        let array = doubles(&[]);
        let bytes = objects::new_bytes(&[0, 1, 2]);
        assert!(frombytes(array.raw(), Args::new(&[bytes.raw()], &[])).is_err());
        err::clear();
    }

    #[test]
    fn test_reshape_fortran_order() {
        let array = doubles(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let shape = objects::new_tuple(vec![objects::new_int_i64(2), objects::new_int_i64(3)]);
        let order = objects::new_str("F");
        let shaped = reshape(array.raw(), Args::new(&[shape.raw(), order.raw()], &[])).unwrap();

        let view = view(shaped.raw()).unwrap();
        assert_eq!(view.shape, vec![2, 3]);
        assert_eq!(view.strides, vec![8, 16]);

        // row 0 holds the elements at linear (column-major) positions 0, 2, 4
        let rows = tolist(shaped.raw()).unwrap();
        let first = super::super::getitem(rows.raw(), objects::new_int_i64(0).raw()).unwrap();
        assert_eq!(super::super::repr(first.raw()).unwrap(), "[1.0, 3.0, 5.0]");
    }

    #[test]
    fn test_transpose_and_tobytes() {
        let array = doubles(&[1.0, 2.0, 3.0, 4.0]);
        let shape = objects::new_tuple(vec![objects::new_int_i64(2), objects::new_int_i64(2)]);
        let square = reshape(array.raw(), Args::new(&[shape.raw()], &[])).unwrap();
        let flipped = transpose(square.raw(), Args::new(&[], &[])).unwrap();
        let bytes = tobytes(flipped.raw(), Args::new(&[], &[])).unwrap();
        let expected: Vec<u8> = [1.0f64, 3.0, 2.0, 4.0].iter().flat_map(|v| v.to_ne_bytes()).collect();
        assert_eq!(objects::bytes_data(bytes.raw()).unwrap(), expected);
    }

    #[test]
    fn test_object_array_releases_items() {
        let before = heap::live_objects();
        let items = vec![objects::new_str("a"), objects::new_str("b")];
        let array = new_object_array(&[2, 1], true, items).unwrap();
        assert_eq!(super::super::repr(array.raw()).unwrap(), "array('O', [['a'], ['b']])");
        drop(array);
        assert_eq!(heap::live_objects(), before);
    }

    #[test]
    fn test_from_parts_bounds() {
        assert!(from_parts(TypeCode::Int32, &[2], &[4], 4, vec![0; 8]).is_err());
        err::clear();
        assert!(from_parts(TypeCode::Int32, &[2], &[-4], 4, vec![0; 8]).is_ok());
    }

    #[test]
    fn test_overflowing_element() {
        let code = objects::new_str("b");
        let init = objects::new_list(vec![objects::new_int_i64(300)]);
        assert!(construct(Args::new(&[code.raw(), init.raw()], &[])).is_err());
        assert!(err::pending_matches(BuiltinType::OverflowError));
        err::clear();
    }
}
