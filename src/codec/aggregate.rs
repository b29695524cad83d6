//! Structs, cells and their foreign counterparts
//!
//! A struct becomes a `dict` keyed by field name and a cell vector becomes a
//! `tuple`. Going back, a `dict` with identifier keys becomes a struct and a
//! `list` or `tuple` becomes a 1xN cell. Elements recurse through the
//! supplied encoder or decoder.

use pythonic_runtime::builtins::{dict_items, dict_set_item};
use pythonic_runtime::objects;
use pythonic_runtime::{ObjRef, Owned};

use crate::codec::{primitive, Decode, Encode, ForeignKind};
use crate::error_bridge::type_mismatch;
use crate::errors::{ConvResult, ConversionError};
use crate::handle::ForeignHandle;
use crate::value::{CellArray, HostValue, StructValue};

fn encode_owned<E>(encoder: &E, value: &HostValue) -> ConvResult<Owned>
where
    E: Encode + ?Sized,
{
    encoder
        .encode(value)?
        .into_owned()
        .ok_or_else(|| ConversionError::object_convert("element encoded to a null object"))
}

/// Struct to `dict`, one entry per field in field order
pub fn encode_struct<E>(encoder: &E, value: &StructValue) -> ConvResult<ForeignHandle>
where
    E: Encode + ?Sized,
{
    let dict = objects::new_dict();
    for (name, field) in value.fields() {
        let key = objects::new_str(name);
        let item = encode_owned(encoder, field)?;
        dict_set_item(dict.raw(), key.raw(), item.raw())?;
    }
    Ok(dict.into())
}

/// Cell vector (or empty cell) to `tuple`
pub fn encode_cell<E>(encoder: &E, cell: &CellArray) -> ConvResult<ForeignHandle>
where
    E: Encode + ?Sized,
{
    if !cell.is_empty() && !cell.dims().is_vector() {
        return Err(ConversionError::value_convert(
            "unable to convert multidimensional cell array into Python tuple",
        ));
    }
    let items = cell
        .items()
        .iter()
        .map(|item| encode_owned(encoder, item))
        .collect::<ConvResult<Vec<_>>>()?;
    Ok(objects::new_tuple(items).into())
}

fn field_name(key: ObjRef) -> ConvResult<String> {
    if !ForeignKind::of(key).is_string() {
        return Err(ConversionError::object_convert(
            "failed to extract map: all keys must be strings",
        ));
    }
    let bytes = primitive::decode_string(key)?;
    String::from_utf8(bytes).map_err(|error| {
        ConversionError::invalid_identifier(&String::from_utf8_lossy(error.as_bytes()))
    })
}

/// `dict` to struct; keys must be strings naming valid identifiers
pub fn decode_struct<D>(decoder: &mut D, obj: ObjRef) -> ConvResult<StructValue>
where
    D: Decode + ?Sized,
{
    let items = dict_items(obj).ok_or_else(|| type_mismatch("an Octave struct", "dict"))?;
    let mut value = StructValue::new();
    for (key, item) in items {
        let name = field_name(key.raw())?;
        let field = decoder.decode(item.raw())?;
        value.insert(name, field)?;
    }
    Ok(value)
}

/// `list` or `tuple` to a 1xN cell
pub fn decode_sequence<D>(decoder: &mut D, obj: ObjRef) -> ConvResult<CellArray>
where
    D: Decode + ?Sized,
{
    let items = objects::sequence_items(obj)
        .ok_or_else(|| type_mismatch("a cell array", "list or tuple"))?;
    let decoded = items
        .iter()
        .map(|item| decoder.decode(item.raw()))
        .collect::<ConvResult<Vec<_>>>()?;
    Ok(CellArray::row(decoded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::value::Dims;
    use pythonic_runtime::builtins::dict_len;
    use pythonic_runtime::{run_string, Mode};

    /// Floats and strings only
    struct Leaves;

    impl Encode for Leaves {
        fn encode(&self, value: &HostValue) -> ConvResult<ForeignHandle> {
            match value {
                HostValue::String(text) => Ok(primitive::encode_string(text.data())),
                other => other
                    .as_f64()
                    .map(primitive::encode_float)
                    .ok_or_else(|| ConversionError::value_convert("not a leaf")),
            }
        }
    }

    impl Decode for Leaves {
        fn decode(&mut self, obj: ObjRef) -> ConvResult<HostValue> {
            match ForeignKind::of(obj) {
                ForeignKind::Str | ForeignKind::Bytes => {
                    let bytes = primitive::decode_string(obj)?;
                    Ok(HostValue::from(String::from_utf8_lossy(&bytes).into_owned()))
                }
                _ => primitive::decode_float(obj).map(HostValue::from),
            }
        }
    }

    fn eval(code: &str) -> Owned {
        let globals = objects::new_dict();
        run_string(code, Mode::Eval, globals.raw(), globals.raw()).unwrap()
    }

    #[test]
    fn test_struct_to_dict_keeps_field_order() {
        let value = StructValue::from_fields([
            ("zeta", HostValue::from(1.0)),
            ("alpha", HostValue::from("a")),
        ])
        .unwrap();
        let dict = encode_struct(&Leaves, &value).unwrap();
        let obj = dict.get().unwrap();
        assert_eq!(dict_len(obj), Some(2));

        let back = decode_struct(&mut Leaves, obj).unwrap();
        assert_eq!(back.field_names(), vec!["zeta", "alpha"]);
        assert_eq!(back, value);
    }

    #[test]
    fn test_dict_keys_must_be_identifiers() {
        let error = decode_struct(&mut Leaves, eval("{'1abc': 1.0}").raw()).unwrap_err();
        assert_eq!(error.kind, ErrorKind::InvalidIdentifier);

        let error = decode_struct(&mut Leaves, eval("{1: 1.0}").raw()).unwrap_err();
        assert_eq!(error.message, "failed to extract map: all keys must be strings");

        let value = decode_struct(&mut Leaves, eval("{b'x': 2.0}").raw()).unwrap();
        assert_eq!(value.get("x"), Some(&HostValue::from(2.0)));
    }

    #[test]
    fn test_non_dict_rejected() {
        let error = decode_struct(&mut Leaves, eval("[1.0]").raw()).unwrap_err();
        assert_eq!(
            error.message,
            "unable to convert to an Octave struct, must be a Python dict"
        );
    }

    #[test]
    fn test_cell_vectors_and_matrices() {
        let cell = CellArray::column(vec![HostValue::from(1.0), HostValue::from("two")]);
        let tuple = encode_cell(&Leaves, &cell).unwrap();
        let back = decode_sequence(&mut Leaves, tuple.get().unwrap()).unwrap();
        assert_eq!(back.items(), cell.items());
        assert_eq!(back.dims(), &Dims::row(2));

        let empty = encode_cell(&Leaves, &CellArray::empty()).unwrap();
        assert_eq!(objects::sequence_items(empty.get().unwrap()).map(|v| v.len()), Some(0));

        let grid = CellArray::new(Dims::matrix(2, 2), vec![HostValue::from(1.0); 4]).unwrap();
        let error = encode_cell(&Leaves, &grid).unwrap_err();
        assert_eq!(error.kind, ErrorKind::ValueConvert);
        assert_eq!(
            error.message,
            "unable to convert multidimensional cell array into Python tuple"
        );
    }

    #[test]
    fn test_list_decodes_to_row_cell() {
        let cell = decode_sequence(&mut Leaves, eval("[1.0, 'x', 3.0]").raw()).unwrap();
        assert_eq!(cell.dims(), &Dims::row(3));
        assert_eq!(cell.get(1), Some(&HostValue::from("x")));
    }
}
