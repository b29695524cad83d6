//! Scalars and strings
//!
//! Decoders check the exact foreign type first and fail with
//! `failed to extract <what>: wrong type`. Integer decoders saturate: a
//! foreign integer outside the target range clamps to its min or max.

use num_bigint::{BigInt, Sign};
use num_complex::Complex64;
use num_traits::ToPrimitive;
use pythonic_runtime::objects::{self, Int};
use pythonic_runtime::{BuiltinType, ObjRef};
use tracing::warn;

use crate::errors::{ConvResult, ConversionError};
use crate::handle::ForeignHandle;
use crate::value::IntScalar;

fn wrong_type(what: &str) -> ConversionError {
    ConversionError::object_convert(format!("failed to extract {what}: wrong type"))
}

/// The object held by `handle`, or `failed to extract <what>: null object`
pub fn require(handle: &ForeignHandle, what: &str) -> ConvResult<ObjRef> {
    handle
        .get()
        .ok_or_else(|| ConversionError::object_convert(format!("failed to extract {what}: null object")))
}

pub fn encode_bool(value: bool) -> ForeignHandle {
    objects::new_bool(value).into()
}

/// Small integers stay machine-sized; `u64` values above `i64::MAX` take
/// the big-integer form
pub fn encode_int(value: IntScalar) -> ForeignHandle {
    let int = match value {
        IntScalar::I8(v) => Int::from(i64::from(v)),
        IntScalar::I16(v) => Int::from(i64::from(v)),
        IntScalar::I32(v) => Int::from(i64::from(v)),
        IntScalar::I64(v) => Int::from(v),
        IntScalar::U8(v) => Int::from(i64::from(v)),
        IntScalar::U16(v) => Int::from(i64::from(v)),
        IntScalar::U32(v) => Int::from(i64::from(v)),
        IntScalar::U64(v) => Int::from(v),
    };
    objects::new_int(int).into()
}

pub fn encode_float(value: f64) -> ForeignHandle {
    objects::new_float(value).into()
}

pub fn encode_complex(value: Complex64) -> ForeignHandle {
    objects::new_complex(value).into()
}

/// Encode host string bytes as a foreign `str`
///
/// Host strings are UTF-8 by contract; invalid sequences are replaced with
/// U+FFFD.
pub fn encode_string(bytes: &[u8]) -> ForeignHandle {
    let text = match std::str::from_utf8(bytes) {
        Ok(text) => std::borrow::Cow::Borrowed(text),
        Err(error) => {
            warn!(target: "pythonic::convert", %error, "host string is not valid UTF-8");
            String::from_utf8_lossy(bytes)
        }
    };
    objects::new_str(&text).into()
}

pub fn decode_bool(obj: ObjRef) -> ConvResult<bool> {
    objects::as_bool(obj).ok_or_else(|| wrong_type("boolean"))
}

fn decode_int(obj: ObjRef) -> ConvResult<Int> {
    if !objects::isinstance(obj, BuiltinType::Int) {
        return Err(wrong_type("integer"));
    }
    objects::as_int(obj).ok_or_else(|| wrong_type("integer"))
}

fn clamp_i64(value: &BigInt) -> i64 {
    value.to_i64().unwrap_or(match value.sign() {
        Sign::Minus => i64::MIN,
        _ => i64::MAX,
    })
}

fn clamp_u64(value: &BigInt) -> u64 {
    match value.sign() {
        Sign::Minus => 0,
        _ => value.to_u64().unwrap_or(u64::MAX),
    }
}

/// Foreign `int` (or `bool`) to `i64`, saturating
pub fn decode_int64(obj: ObjRef) -> ConvResult<i64> {
    match decode_int(obj)? {
        Int::Small(v) => Ok(v),
        Int::Big(v) => Ok(clamp_i64(&v)),
    }
}

/// Foreign `int` (or `bool`) to `u64`, saturating; negatives give 0
pub fn decode_uint64(obj: ObjRef) -> ConvResult<u64> {
    match decode_int(obj)? {
        Int::Small(v) => Ok(u64::try_from(v).unwrap_or(0)),
        Int::Big(v) => Ok(clamp_u64(&v)),
    }
}

pub fn decode_float(obj: ObjRef) -> ConvResult<f64> {
    objects::as_float(obj).ok_or_else(|| wrong_type("float"))
}

pub fn decode_complex(obj: ObjRef) -> ConvResult<Complex64> {
    objects::as_complex(obj).ok_or_else(|| wrong_type("complex"))
}

/// Bytes of a foreign `bytes`, or the strict UTF-8 encoding of a `str`
pub fn decode_string(obj: ObjRef) -> ConvResult<Vec<u8>> {
    if let Some(bytes) = objects::bytes_data(obj) {
        return Ok(bytes);
    }
    match objects::str_wtf8(obj) {
        Some(stored) => match String::from_utf8(stored) {
            Ok(text) => Ok(text.into_bytes()),
            Err(_) => Err(ConversionError::object_convert(
                "failed to extract string: UTF-8 error",
            )),
        },
        None => Err(wrong_type("string")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pythonic_runtime::{run_string, Mode, Owned};

    fn eval(code: &str) -> Owned {
        let globals = objects::new_dict();
        run_string(code, Mode::Eval, globals.raw(), globals.raw()).unwrap()
    }

    #[test]
    fn test_int64_clamps() {
        assert_eq!(decode_int64(eval("2**128").raw()).unwrap(), i64::MAX);
        assert_eq!(decode_int64(eval("-2**128").raw()).unwrap(), i64::MIN);
        assert_eq!(decode_int64(eval("-2**62").raw()).unwrap(), -(1i64 << 62));
        assert_eq!(decode_int64(eval("True").raw()).unwrap(), 1);
    }

    #[test]
    fn test_uint64_clamps() {
        assert_eq!(decode_uint64(eval("2**128").raw()).unwrap(), u64::MAX);
        assert_eq!(decode_uint64(eval("-2**128").raw()).unwrap(), 0);
        assert_eq!(decode_uint64(eval("-1").raw()).unwrap(), 0);
        assert_eq!(decode_uint64(eval("2**64 - 1").raw()).unwrap(), u64::MAX);
    }

    #[test]
    fn test_wrong_types() {
        let none = objects::none();
        assert_eq!(
            decode_int64(none).unwrap_err().message,
            "failed to extract integer: wrong type"
        );
        assert!(decode_float(eval("1").raw()).is_err());
        assert!(decode_bool(eval("1").raw()).is_err());
        assert_eq!(
            decode_string(eval("[]").raw()).unwrap_err().message,
            "failed to extract string: wrong type"
        );
    }

    #[test]
    fn test_null_object() {
        let error = require(&ForeignHandle::empty(), "string").unwrap_err();
        assert_eq!(error.message, "failed to extract string: null object");
    }

    #[test]
    fn test_strings() {
        assert_eq!(decode_string(eval("'I <3 Octave'").raw()).unwrap(), b"I <3 Octave");
        assert_eq!(decode_string(eval("b'\\xff'").raw()).unwrap(), vec![0xff]);
        assert_eq!(
            decode_string(eval("chr(0xDC80)").raw()).unwrap_err().message,
            "failed to extract string: UTF-8 error"
        );

        let encoded = encode_string("héllo".as_bytes());
        assert_eq!(decode_string(encoded.get().unwrap()).unwrap(), "héllo".as_bytes());
    }

    #[test]
    fn test_integer_encoding_width() {
        let big = encode_int(IntScalar::U64(u64::MAX));
        assert_eq!(decode_uint64(big.get().unwrap()).unwrap(), u64::MAX);
        assert!(!objects::as_int(big.get().unwrap()).unwrap().is_small());

        let small = encode_int(IntScalar::I8(-5));
        assert_eq!(objects::as_int(small.get().unwrap()), Some(Int::Small(-5)));
    }
}
