//! The small slice of the standard library the runtime ships:
//! `math`, `cmath`, `sys` and `traceback`

use num_bigint::BigInt;
use num_complex::Complex64;
use num_traits::FromPrimitive;

use crate::builtins::dict;
use crate::err::{self, RtResult};
use crate::objects::{self, Args, NativeFn, ObjRef};
use crate::refcount::Owned;
use crate::types::BuiltinType;

fn real_arg(obj: ObjRef) -> RtResult<f64> {
    if objects::type_of(obj) == BuiltinType::Complex {
        return Err(err::raise(
            BuiltinType::TypeError,
            "must be real number, not complex",
        ));
    }
    match objects::as_number(obj) {
        Some(value) => Ok(value.re),
        None => Err(err::raise(
            BuiltinType::TypeError,
            format!("must be real number, not {}", objects::type_name(obj)),
        )),
    }
}

fn float_to_int(value: f64) -> RtResult<Owned> {
    if value.is_nan() {
        return Err(err::raise(
            BuiltinType::ValueError,
            "cannot convert float NaN to integer",
        ));
    }
    BigInt::from_f64(value)
        .map(objects::new_int_big)
        .ok_or_else(|| {
            err::raise(
                BuiltinType::OverflowError,
                "cannot convert float infinity to integer",
            )
        })
}

fn math_sqrt(args: Args<'_>) -> RtResult<Owned> {
    args.check_count("sqrt", 1, 1)?;
    let x = real_arg(args.positional[0])?;
    if x < 0.0 {
        return Err(err::raise(BuiltinType::ValueError, "math domain error"));
    }
    Ok(objects::new_float(x.sqrt()))
}

fn math_exp(args: Args<'_>) -> RtResult<Owned> {
    args.check_count("exp", 1, 1)?;
    let x = real_arg(args.positional[0])?;
    let result = x.exp();
    if result.is_infinite() && x.is_finite() {
        return Err(err::raise(BuiltinType::OverflowError, "math range error"));
    }
    Ok(objects::new_float(result))
}

fn math_trunc(args: Args<'_>) -> RtResult<Owned> {
    args.check_count("trunc", 1, 1)?;
    let value = args.positional[0];
    if let Some(int) = objects::as_int(value) {
        return Ok(objects::new_int(int));
    }
    float_to_int(real_arg(value)?.trunc())
}

fn math_floor(args: Args<'_>) -> RtResult<Owned> {
    args.check_count("floor", 1, 1)?;
    let value = args.positional[0];
    if let Some(int) = objects::as_int(value) {
        return Ok(objects::new_int(int));
    }
    float_to_int(real_arg(value)?.floor())
}

fn math_isnan(args: Args<'_>) -> RtResult<Owned> {
    args.check_count("isnan", 1, 1)?;
    Ok(objects::new_bool(real_arg(args.positional[0])?.is_nan()))
}

fn cmath_sqrt(args: Args<'_>) -> RtResult<Owned> {
    args.check_count("sqrt", 1, 1)?;
    let value = args.positional[0];
    let z = objects::as_number(value).ok_or_else(|| {
        err::raise(
            BuiltinType::TypeError,
            format!("must be real number, not {}", objects::type_name(value)),
        )
    })?;
    Ok(objects::new_complex(z.sqrt()))
}

fn traceback_format_exception_only(args: Args<'_>) -> RtResult<Owned> {
    args.check_count("format_exception_only", 1, 2)?;
    let lines = err::format_exception_only(args.positional[0], args.get(1))?;
    let items = lines.iter().map(|line| objects::new_str(line)).collect();
    Ok(objects::new_list(items))
}

const MATH_FUNCTIONS: &[(&str, NativeFn)] = &[
    ("sqrt", math_sqrt),
    ("exp", math_exp),
    ("trunc", math_trunc),
    ("floor", math_floor),
    ("isnan", math_isnan),
];

const CMATH_FUNCTIONS: &[(&str, NativeFn)] = &[("sqrt", cmath_sqrt)];

const TRACEBACK_FUNCTIONS: &[(&str, NativeFn)] =
    &[("format_exception_only", traceback_format_exception_only)];

fn install_functions(module_dict: ObjRef, functions: &[(&'static str, NativeFn)]) -> RtResult<()> {
    for (name, func) in functions {
        let function = objects::new_builtin(name, *func);
        dict::dict_set_str(module_dict, name, function.raw())?;
    }
    Ok(())
}

/// Fill in a standard library module; `false` when `name` is not one
pub(super) fn populate(name: &str, module_dict: ObjRef) -> RtResult<bool> {
    match name {
        "math" => {
            install_functions(module_dict, MATH_FUNCTIONS)?;
            let pi = objects::new_float(std::f64::consts::PI);
            dict::dict_set_str(module_dict, "pi", pi.raw())?;
            let e = objects::new_float(std::f64::consts::E);
            dict::dict_set_str(module_dict, "e", e.raw())?;
            let inf = objects::new_float(f64::INFINITY);
            dict::dict_set_str(module_dict, "inf", inf.raw())?;
            let nan = objects::new_float(f64::NAN);
            dict::dict_set_str(module_dict, "nan", nan.raw())?;
        }
        "cmath" => {
            install_functions(module_dict, CMATH_FUNCTIONS)?;
            let pi = objects::new_float(std::f64::consts::PI);
            dict::dict_set_str(module_dict, "pi", pi.raw())?;
            let infj = objects::new_complex(Complex64::new(0.0, f64::INFINITY));
            dict::dict_set_str(module_dict, "infj", infj.raw())?;
        }
        "sys" => {
            let version = objects::new_str(concat!(env!("CARGO_PKG_VERSION"), " (pythonic-runtime)"));
            dict::dict_set_str(module_dict, "version", version.raw())?;
            let maxsize = objects::new_int_i64(i64::MAX);
            dict::dict_set_str(module_dict, "maxsize", maxsize.raw())?;
            let byteorder = objects::new_str(if cfg!(target_endian = "little") {
                "little"
            } else {
                "big"
            });
            dict::dict_set_str(module_dict, "byteorder", byteorder.raw())?;
        }
        "traceback" => install_functions(module_dict, TRACEBACK_FUNCTIONS)?,
        _ => return Ok(false),
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqrt_domain_error() {
        let negative = objects::new_float(-1.0);
        assert!(math_sqrt(Args::new(&[negative.raw()], &[])).is_err());
        assert!(err::pending_matches(BuiltinType::ValueError));
        err::clear();

        let z = cmath_sqrt(Args::new(&[negative.raw()], &[])).unwrap();
        assert_eq!(objects::as_complex(z.raw()), Some(Complex64::new(0.0, 1.0)));
    }

    #[test]
    fn test_floor_returns_int() {
        let value = objects::new_float(-1.5);
        let floored = math_floor(Args::new(&[value.raw()], &[])).unwrap();
        assert_eq!(objects::as_int(floored.raw()), Some(objects::Int::Small(-2)));
    }

    #[test]
    fn test_format_exception_only_list() {
        let exc = err::new_exception(BuiltinType::NameError, vec![objects::new_str("oops")]);
        let ptype = BuiltinType::NameError.type_object();
        let lines = traceback_format_exception_only(Args::new(&[ptype, exc.raw()], &[])).unwrap();
        assert_eq!(
            crate::builtins::repr(lines.raw()).unwrap(),
            "['NameError: oops\\n']"
        );
    }
}
