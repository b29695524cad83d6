//! Conversion dispatcher
//!
//! `Converter` is the top-level pair of conversions. Encode inspects the
//! host value's variant in a fixed priority order; decode inspects the
//! foreign object's exact type and falls back to the object store, so it
//! never fails on an unrecognized type.
//!
//! Aggregate decodes run under a store checkpoint: when one element fails,
//! the handles already stored for its siblings are dropped again.

use pythonic_runtime::objects::{self, Int};
use pythonic_runtime::ObjRef;

use crate::codec::{aggregate, array, primitive, Decode, Encode, ForeignKind};
use crate::config::{self, BridgeConfig};
use crate::errors::{ConvResult, ConversionError};
use crate::handle::ForeignHandle;
use crate::logging::{log_decode, log_encode};
use crate::store::ObjectStore;
use crate::value::{
    CellArray, CharArray, ComplexScalar, FloatScalar, HostValue, IntScalar, NumericArray,
    ScalarKind, StructValue,
};

/// Converts values in both directions, holding the object store that backs
/// opaque handles
#[derive(Debug)]
pub struct Converter {
    store: ObjectStore,
    wrap_integers: bool,
}

impl Default for Converter {
    fn default() -> Self {
        Self::new()
    }
}

impl Converter {
    /// Converter with the process-wide default configuration
    pub fn new() -> Self {
        Self::with_config(config::defaults())
    }

    pub fn with_config(config: &BridgeConfig) -> Self {
        Self {
            store: ObjectStore::with_repr_width(config.store.repr_width),
            wrap_integers: config.conversion.wrap_integers,
        }
    }

    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ObjectStore {
        &mut self.store
    }

    pub fn wrap_integers(&self) -> bool {
        self.wrap_integers
    }

    /// Store `obj` and return an opaque handle to it
    pub fn wrap(&mut self, obj: ObjRef) -> ConvResult<HostValue> {
        let key = self.store.put(ForeignHandle::borrowed(obj))?;
        Ok(HostValue::Handle(key))
    }

    fn encode_numeric(&self, array: &NumericArray) -> ConvResult<ForeignHandle> {
        if array.numel() == 1 && array.dims().is_scalar() {
            if let Some(element) = array.element(0) {
                return self.encode(&element);
            }
        }
        if array::is_vector_candidate(array) {
            return array::encode_vector(array);
        }
        log_encode(array.element_type().name(), "object-array");
        let items: Vec<HostValue> = (0..array.numel())
            .filter_map(|index| array.element(index))
            .collect();
        array::encode_object_array(self, array.dims(), &items)
    }

    /// Run `decode` so that a failure leaves the store untouched
    fn atomically<T>(&mut self, decode: impl FnOnce(&mut Self) -> ConvResult<T>) -> ConvResult<T> {
        let checkpoint = self.store.checkpoint();
        let result = decode(self);
        match result {
            Ok(_) => self.store.commit(checkpoint),
            Err(_) => self.store.rollback(checkpoint),
        }
        result
    }

    /// Mapping to struct
    pub fn decode_struct(&mut self, obj: ObjRef) -> ConvResult<StructValue> {
        self.atomically(|conv| aggregate::decode_struct(conv, obj))
    }

    /// `list` or `tuple` to a 1xN cell
    pub fn decode_cell(&mut self, obj: ObjRef) -> ConvResult<CellArray> {
        self.atomically(|conv| aggregate::decode_sequence(conv, obj))
    }

    /// Decode `obj` as one specific scalar kind
    pub fn decode_as(&mut self, obj: ObjRef, kind: ScalarKind) -> ConvResult<HostValue> {
        let value = match kind {
            ScalarKind::Bool => HostValue::Bool(primitive::decode_bool(obj)?),
            ScalarKind::Int64 => HostValue::Int(IntScalar::I64(primitive::decode_int64(obj)?)),
            ScalarKind::UInt64 => HostValue::Int(IntScalar::U64(primitive::decode_uint64(obj)?)),
            ScalarKind::Double => HostValue::from(primitive::decode_float(obj)?),
            ScalarKind::Complex => {
                HostValue::Complex(ComplexScalar::Double(primitive::decode_complex(obj)?))
            }
            ScalarKind::String => {
                HostValue::String(CharArray::from_bytes(primitive::decode_string(obj)?))
            }
        };
        Ok(value)
    }
}

impl Encode for Converter {
    fn encode(&self, value: &HostValue) -> ConvResult<ForeignHandle> {
        log_encode(value.class_name(), "dispatch");
        match value {
            HostValue::Handle(key) => self.store.lookup(*key).ok_or_else(|| {
                ConversionError::object_convert(format!("no Python object stored under key {key}"))
            }),
            HostValue::String(text) if text.is_multirow() => Err(ConversionError::value_convert(
                "multirow char array cannot be converted to a Python object",
            )),
            HostValue::String(text) => Ok(primitive::encode_string(text.data())),
            HostValue::Bool(v) => Ok(primitive::encode_bool(*v)),
            HostValue::Int(v) => Ok(primitive::encode_int(*v)),
            HostValue::Float(FloatScalar::Single(v)) => Ok(primitive::encode_float(f64::from(*v))),
            HostValue::Float(FloatScalar::Double(v)) => Ok(primitive::encode_float(*v)),
            HostValue::Complex(v) => Ok(primitive::encode_complex(v.to_c64())),
            HostValue::Cell(cell) => aggregate::encode_cell(self, cell),
            HostValue::Array(array) => self.encode_numeric(array),
            HostValue::Struct(fields) => aggregate::encode_struct(self, fields),
            HostValue::Undefined | HostValue::StructArray(_) => Err(
                ConversionError::value_convert("unable to convert unhandled Octave type"),
            ),
        }
    }
}

impl Decode for Converter {
    fn decode(&mut self, obj: ObjRef) -> ConvResult<HostValue> {
        let value = match ForeignKind::of(obj) {
            ForeignKind::Bool => HostValue::Bool(primitive::decode_bool(obj)?),
            ForeignKind::Int if !self.wrap_integers => match objects::as_int(obj) {
                Some(Int::Small(v)) => HostValue::Int(IntScalar::I64(v)),
                _ => self.wrap(obj)?,
            },
            ForeignKind::Float => HostValue::from(primitive::decode_float(obj)?),
            ForeignKind::Complex => {
                HostValue::Complex(ComplexScalar::Double(primitive::decode_complex(obj)?))
            }
            ForeignKind::Array => self.atomically(|conv| array::decode_array(conv, obj))?,
            ForeignKind::Str | ForeignKind::Bytes => {
                HostValue::String(CharArray::from_bytes(primitive::decode_string(obj)?))
            }
            _ => self.wrap(obj)?,
        };
        log_decode(objects::type_name(obj), value.class_name());
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::value::Dims;
    use num_complex::Complex64;
    use pythonic_runtime::builtins::array as runtime_array;
    use pythonic_runtime::{run_string, Mode, Owned, TypeCode};

    fn eval(code: &str) -> Owned {
        let globals = objects::new_dict();
        run_string(code, Mode::Eval, globals.raw(), globals.raw()).unwrap()
    }

    fn converter() -> Converter {
        Converter::with_config(&BridgeConfig::default())
    }

    #[test]
    fn test_scalars_decode_natively() {
        let mut conv = converter();
        assert_eq!(conv.decode(eval("True").raw()).unwrap(), HostValue::Bool(true));
        assert_eq!(conv.decode(eval("10.1").raw()).unwrap(), HostValue::from(10.1));
        assert_eq!(
            conv.decode(eval("-99999999999999").raw()).unwrap(),
            HostValue::Int(IntScalar::I64(-99999999999999))
        );
        assert_eq!(
            conv.decode(eval("2j").raw()).unwrap(),
            HostValue::from(Complex64::new(0.0, 2.0))
        );
        assert_eq!(conv.decode(eval("'I <3 Octave'").raw()).unwrap(), HostValue::from("I <3 Octave"));
        assert!(conv.store().is_empty());
    }

    #[test]
    fn test_everything_else_becomes_a_handle() {
        let mut conv = converter();
        for code in ["None", "[1.0, 2.0]", "{'x': 1.0}", "(4.0,)", "object()", "2**70"] {
            let value = conv.decode(eval(code).raw()).unwrap();
            assert!(value.is_handle(), "{code} decoded to {value:?}");
        }
        assert_eq!(conv.store().len(), 6);
    }

    #[test]
    fn test_wrap_integers() {
        let mut config = BridgeConfig::default();
        config.conversion.wrap_integers = true;
        let mut conv = Converter::with_config(&config);
        assert!(conv.decode(eval("5").raw()).unwrap().is_handle());
        assert_eq!(conv.decode(eval("False").raw()).unwrap(), HostValue::Bool(false));
    }

    #[test]
    fn test_handle_encodes_to_stored_object() {
        let mut conv = converter();
        let obj = eval("[1.0]");
        let handle = conv.decode(obj.raw()).unwrap();
        let key = handle.as_handle().unwrap();

        let encoded = conv.encode(&handle).unwrap();
        assert_eq!(encoded.get(), Some(obj.raw()));
        assert_eq!(conv.store().count(key), Some(1));

        conv.store_mut().drop_ref(key);
        assert_eq!(
            conv.encode(&handle).unwrap_err().message,
            format!("no Python object stored under key {key}")
        );
    }

    #[test]
    fn test_encode_priority() {
        let conv = converter();

        let multirow = HostValue::String(CharArray::from_rows(&["hello", "world"]));
        assert_eq!(
            conv.encode(&multirow).unwrap_err().message,
            "multirow char array cannot be converted to a Python object"
        );

        let scalar = HostValue::Array(NumericArray::row(vec![7i32]));
        let encoded = conv.encode(&scalar).unwrap();
        assert_eq!(objects::type_name(encoded.get().unwrap()), "int");

        let vector = HostValue::Array(NumericArray::column(vec![1.0, 2.0]));
        let encoded = conv.encode(&vector).unwrap();
        let view = runtime_array::view(encoded.get().unwrap()).unwrap();
        assert_eq!(view.typecode, TypeCode::Float64);
        assert_eq!(view.shape, vec![2]);

        let error = conv.encode(&HostValue::Undefined).unwrap_err();
        assert_eq!(error.kind, ErrorKind::ValueConvert);
        assert_eq!(error.message, "unable to convert unhandled Octave type");
    }

    #[test]
    fn test_matrix_round_trips_through_object_array() {
        let mut conv = converter();
        let matrix = NumericArray::new(Dims::matrix(2, 2), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let encoded = conv.encode(&HostValue::Array(matrix.clone())).unwrap();
        let view = runtime_array::view(encoded.get().unwrap()).unwrap();
        assert_eq!(view.typecode, TypeCode::Object);
        assert_eq!(view.shape, vec![2, 2]);

        let back = conv.decode(encoded.get().unwrap()).unwrap();
        assert_eq!(back, HostValue::Array(matrix));
        assert!(conv.store().is_empty());
    }

    #[test]
    fn test_failed_struct_decode_leaves_store_unchanged() {
        let mut conv = converter();
        conv.decode(eval("object()").raw()).unwrap();
        assert_eq!(conv.store().len(), 1);

        let error = conv.decode_struct(eval("{'a': [1.0], 1: 2.0}").raw()).unwrap_err();
        assert_eq!(error.message, "failed to extract map: all keys must be strings");
        assert_eq!(conv.store().len(), 1);
    }

    #[test]
    fn test_failed_sequence_decode_leaves_store_unchanged() {
        let mut conv = converter();
        let list = eval("[[1.0], {'k': 2.0}, __import__('array').array('u', 'x')]");
        assert!(conv.decode_cell(list.raw()).is_err());
        assert!(conv.store().is_empty());

        let object_array = eval("__import__('array').array('O', [[1.0], __import__('array').array('u', 'x')])");
        assert!(conv.decode(object_array.raw()).is_err());
        assert!(conv.store().is_empty());
    }

    #[test]
    fn test_failed_decode_keeps_existing_counts() {
        let mut conv = converter();
        let shared = eval("[1.0]");
        let key = conv.decode(shared.raw()).unwrap().as_handle().unwrap();

        let globals = objects::new_dict();
        let shared_name = objects::new_str("shared");
        pythonic_runtime::builtins::dict_set_item(globals.raw(), shared_name.raw(), shared.raw()).unwrap();
        let tuple = run_string(
            "(shared, shared, __import__('array').array('u', 'x'))",
            Mode::Eval,
            globals.raw(),
            globals.raw(),
        )
        .unwrap();
        assert!(conv.decode_cell(tuple.raw()).is_err());
        assert_eq!(conv.store().count(key), Some(1));
    }

    #[test]
    fn test_struct_round_trip() {
        let mut conv = converter();
        let value = StructValue::from_fields([("a", HostValue::from(1.0))]).unwrap();
        let encoded = conv.encode(&HostValue::Struct(value.clone())).unwrap();
        assert_eq!(conv.decode_struct(encoded.get().unwrap()).unwrap(), value);
        assert!(conv.decode(encoded.get().unwrap()).unwrap().is_handle());
    }

    #[test]
    fn test_decode_as() {
        let mut conv = converter();
        let big = eval("2**128");
        assert_eq!(
            conv.decode_as(big.raw(), ScalarKind::Int64).unwrap(),
            HostValue::Int(IntScalar::I64(i64::MAX))
        );
        assert_eq!(
            conv.decode_as(big.raw(), ScalarKind::UInt64).unwrap(),
            HostValue::Int(IntScalar::U64(u64::MAX))
        );
        assert!(conv.decode_as(big.raw(), ScalarKind::Double).is_err());
        assert_eq!(
            conv.decode_as(eval("b'abc'").raw(), ScalarKind::String).unwrap(),
            HostValue::from("abc")
        );
    }
}
