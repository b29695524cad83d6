//! Type constructors - what calling a builtin class does

use num_bigint::BigInt;
use num_complex::Complex64;
use num_traits::{FromPrimitive, Num};

use crate::builtins::{array, dict, numbers, string};
use crate::err::{self, RtResult};
use crate::objects::{self, Args, Int, ObjRef, Payload};
use crate::refcount::Owned;
use crate::types::BuiltinType;
use crate::heap;

/// Instantiate `ty` with `args`
pub(super) fn construct(ty: BuiltinType, args: Args<'_>) -> RtResult<Owned> {
    if ty.is_exception() {
        args.no_keywords(ty.name())?;
        let values = args.positional.iter().map(|a| Owned::from_borrowed(*a)).collect();
        return Ok(err::new_exception(ty, values));
    }

    match ty {
        BuiltinType::Int => int(args),
        BuiltinType::Float => float(args),
        BuiltinType::Complex => complex(args),
        BuiltinType::Str => str(args),
        BuiltinType::Bytes => bytes(args),
        BuiltinType::Bool => {
            args.check_count("bool", 0, 1)?;
            Ok(objects::new_bool(args.get(0).map_or(false, objects::is_truthy)))
        }
        BuiltinType::Tuple => {
            args.check_count("tuple", 0, 1)?;
            let items = match args.get(0) {
                Some(source) => super::iterate(source)?,
                None => Vec::new(),
            };
            Ok(objects::new_tuple(items))
        }
        BuiltinType::List => {
            args.check_count("list", 0, 1)?;
            let items = match args.get(0) {
                Some(source) => super::iterate(source)?,
                None => Vec::new(),
            };
            Ok(objects::new_list(items))
        }
        BuiltinType::Dict => {
            args.check_count("dict", 0, 1)?;
            let result = objects::new_dict();
            if let Some(source) = args.get(0) {
                dict::dict_update(result.raw(), source)?;
            }
            for (key, value) in args.keywords {
                dict::dict_set_str(result.raw(), key, *value)?;
            }
            Ok(result)
        }
        BuiltinType::Object => {
            args.check_count("object", 0, 0)?;
            Ok(objects::new_object())
        }
        BuiltinType::Type => {
            args.check_count("type", 1, 1)?;
            Ok(Owned::from_raw(objects::type_of(args.positional[0]).type_object()))
        }
        BuiltinType::Array => array::construct(args),
        _ => Err(err::raise(
            BuiltinType::TypeError,
            format!("cannot create '{}' instances", ty.name()),
        )),
    }
}

fn parse_int_text(text: &str, base: u32) -> Option<BigInt> {
    let cleaned: String = text.trim().chars().filter(|c| *c != '_').collect();
    let (negative, digits) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, cleaned.strip_prefix('+').unwrap_or(&cleaned)),
    };
    let digits = match base {
        16 => digits.trim_start_matches("0x").trim_start_matches("0X"),
        8 => digits.trim_start_matches("0o").trim_start_matches("0O"),
        2 => digits.trim_start_matches("0b").trim_start_matches("0B"),
        _ => digits,
    };
    if digits.is_empty() {
        return None;
    }
    let value = BigInt::from_str_radix(digits, base).ok()?;
    Some(if negative { -value } else { value })
}

fn int(args: Args<'_>) -> RtResult<Owned> {
    args.check_count("int", 0, 2)?;
    let Some(value) = args.get(0) else {
        return Ok(objects::new_int_i64(0));
    };

    if let Some(base) = args.arg(1, "base") {
        let base = numbers::expect_index(base, "int() base")?;
        let text = string::expect_str(value, "int() argument")?;
        if !(2..=36).contains(&base) {
            return Err(err::raise(
                BuiltinType::ValueError,
                "int() base must be >= 2 and <= 36",
            ));
        }
        return parse_int_text(&text, base as u32)
            .map(objects::new_int_big)
            .ok_or_else(|| {
                err::raise(
                    BuiltinType::ValueError,
                    format!("invalid literal for int() with base {base}: '{text}'"),
                )
            });
    }

    if let Some(value) = objects::as_int(value) {
        return Ok(objects::new_int(value));
    }
    if let Some(f) = objects::as_float(value) {
        if f.is_nan() {
            return Err(err::raise(
                BuiltinType::ValueError,
                "cannot convert float NaN to integer",
            ));
        }
        return BigInt::from_f64(f.trunc())
            .map(objects::new_int_big)
            .ok_or_else(|| {
                err::raise(
                    BuiltinType::OverflowError,
                    "cannot convert float infinity to integer",
                )
            });
    }
    if let Some(text) = objects::str_wtf8(value) {
        let text = string::wtf8_to_string(&text);
        return parse_int_text(&text, 10)
            .map(objects::new_int_big)
            .ok_or_else(|| {
                err::raise(
                    BuiltinType::ValueError,
                    format!("invalid literal for int() with base 10: '{text}'"),
                )
            });
    }
    Err(err::raise(
        BuiltinType::TypeError,
        format!(
            "int() argument must be a string or a real number, not '{}'",
            objects::type_name(value)
        ),
    ))
}

fn parse_float_text(text: &str) -> Option<f64> {
    let text = text.trim();
    match text.to_ascii_lowercase().as_str() {
        "inf" | "+inf" | "infinity" | "+infinity" => Some(f64::INFINITY),
        "-inf" | "-infinity" => Some(f64::NEG_INFINITY),
        "nan" | "+nan" | "-nan" => Some(f64::NAN),
        _ => text.parse().ok(),
    }
}

fn float(args: Args<'_>) -> RtResult<Owned> {
    args.check_count("float", 0, 1)?;
    let Some(value) = args.get(0) else {
        return Ok(objects::new_float(0.0));
    };

    if let Some(text) = objects::str_wtf8(value) {
        let text = string::wtf8_to_string(&text);
        return parse_float_text(&text).map(objects::new_float).ok_or_else(|| {
            err::raise(
                BuiltinType::ValueError,
                format!("could not convert string to float: '{text}'"),
            )
        });
    }
    match objects::type_of(value) {
        BuiltinType::Bool | BuiltinType::Int => match objects::as_int(value).and_then(|i| i.to_f64()) {
            Some(f) => Ok(objects::new_float(f)),
            None => Err(err::raise(
                BuiltinType::OverflowError,
                "int too large to convert to float",
            )),
        },
        BuiltinType::Float => Ok(Owned::from_borrowed(value)),
        _ => Err(err::raise(
            BuiltinType::TypeError,
            format!(
                "float() argument must be a string or a real number, not '{}'",
                objects::type_name(value)
            ),
        )),
    }
}

fn complex(args: Args<'_>) -> RtResult<Owned> {
    args.check_count("complex", 0, 2)?;
    let part = |obj: Option<ObjRef>, what: &str| -> RtResult<Complex64> {
        match obj {
            None => Ok(Complex64::new(0.0, 0.0)),
            Some(obj) => objects::as_number(obj).ok_or_else(|| {
                err::raise(
                    BuiltinType::TypeError,
                    format!(
                        "complex() {what} must be a number, not '{}'",
                        objects::type_name(obj)
                    ),
                )
            }),
        }
    };
    let real = part(args.arg(0, "real"), "first argument")?;
    let imag = part(args.arg(1, "imag"), "second argument")?;
    Ok(objects::new_complex(real + Complex64::new(0.0, 1.0) * imag))
}

fn str(args: Args<'_>) -> RtResult<Owned> {
    args.check_count("str", 0, 3)?;
    let Some(value) = args.get(0) else {
        return Ok(objects::new_str(""));
    };
    if args.len() > 1 || !args.keywords.is_empty() {
        // str(bytes, encoding[, errors]) decodes
        let method = super::getattr(value, "decode")?;
        return super::call(method.raw(), &args.positional[1..], args.keywords);
    }
    string::str_object(value)
}

fn bytes(args: Args<'_>) -> RtResult<Owned> {
    args.check_count("bytes", 0, 3)?;
    let Some(value) = args.get(0) else {
        return Ok(objects::new_bytes(&[]));
    };

    if objects::type_of(value) == BuiltinType::Str {
        let method = super::getattr(value, "encode")?;
        return super::call(method.raw(), &args.positional[1..], args.keywords);
    }
    if let Some(data) = objects::bytes_data(value) {
        return Ok(objects::new_bytes(&data));
    }
    if let Some(Int::Small(count)) = objects::as_int(value) {
        let count = usize::try_from(count)
            .map_err(|_| err::raise(BuiltinType::ValueError, "negative count"))?;
        return Ok(objects::new_bytes(&vec![0; count]));
    }
    if heap::view(value, |payload| matches!(payload, Payload::Array(_))) {
        let method = super::getattr(value, "tobytes")?;
        return super::call(method.raw(), &[], &[]);
    }

    let mut out = Vec::new();
    for item in super::iterate(value)? {
        let byte = numbers::expect_index(item.raw(), "bytes item")?;
        let byte = u8::try_from(byte).map_err(|_| {
            err::raise(BuiltinType::ValueError, "bytes must be in range(0, 256)")
        })?;
        out.push(byte);
    }
    Ok(objects::new_bytes(&out))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(ty: BuiltinType, args: &[ObjRef]) -> RtResult<Owned> {
        construct(ty, Args::new(args, &[]))
    }

    #[test]
    fn test_int_parsing() {
        let text = objects::new_str(" -12_345 ");
        let value = build(BuiltinType::Int, &[text.raw()]).unwrap();
        assert_eq!(objects::as_int(value.raw()), Some(Int::Small(-12345)));

        let hex = objects::new_str("ff");
        let base = objects::new_int_i64(16);
        let value = build(BuiltinType::Int, &[hex.raw(), base.raw()]).unwrap();
        assert_eq!(objects::as_int(value.raw()), Some(Int::Small(255)));

        let float = objects::new_float(-2.7);
        let value = build(BuiltinType::Int, &[float.raw()]).unwrap();
        assert_eq!(objects::as_int(value.raw()), Some(Int::Small(-2)));
    }

    #[test]
    fn test_int_rejects_garbage() {
        let text = objects::new_str("12a");
        assert!(build(BuiltinType::Int, &[text.raw()]).is_err());
        assert!(err::pending_matches(BuiltinType::ValueError));
        err::clear();
    }

    #[test]
    fn test_complex_and_float() {
        let re = objects::new_int_i64(1);
        let im = objects::new_float(2.0);
        let value = build(BuiltinType::Complex, &[re.raw(), im.raw()]).unwrap();
        assert_eq!(objects::as_complex(value.raw()), Some(Complex64::new(1.0, 2.0)));

        let text = objects::new_str("inf");
        let value = build(BuiltinType::Float, &[text.raw()]).unwrap();
        assert_eq!(objects::as_float(value.raw()), Some(f64::INFINITY));
    }

    #[test]
    fn test_bytes_from_str_and_list() {
        let text = objects::new_str("hé");
        let encoding = objects::new_str("utf-8");
        let value = build(BuiltinType::Bytes, &[text.raw(), encoding.raw()]).unwrap();
        assert_eq!(objects::bytes_data(value.raw()).unwrap(), "hé".as_bytes());

        let list = objects::new_list(vec![objects::new_int_i64(1), objects::new_int_i64(255)]);
        let value = build(BuiltinType::Bytes, &[list.raw()]).unwrap();
        assert_eq!(objects::bytes_data(value.raw()).unwrap(), vec![1, 255]);
    }

    #[test]
    fn test_exception_instances() {
        let message = objects::new_str("boom");
        let exc = build(BuiltinType::ValueError, &[message.raw()]).unwrap();
        assert_eq!(err::exception_class(exc.raw()), Some(BuiltinType::ValueError));
        assert_eq!(err::exception_message(exc.raw()).unwrap(), "boom");
    }

    #[test]
    fn test_dict_keywords() {
        let one = objects::new_int_i64(1);
        let kwargs = vec![("a".to_string(), one.raw())];
        let value = construct(BuiltinType::Dict, Args::new(&[], &kwargs)).unwrap();
        assert_eq!(dict::dict_len(value.raw()), Some(1));
    }
}
