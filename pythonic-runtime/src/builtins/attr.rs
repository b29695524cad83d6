//! Attribute protocol - `getattr` / `setattr` / `hasattr`

use crate::builtins::{array, dict, sequence, string};
use crate::err::{self, RtResult};
use crate::heap::{self, with_interp};
use crate::objects::{self, NativeMethod, ObjRef, Payload};
use crate::refcount::Owned;
use crate::types::BuiltinType;

fn method_table(ty: BuiltinType) -> &'static [(&'static str, NativeMethod)] {
    match ty {
        BuiltinType::Str => string::STR_METHODS,
        BuiltinType::Bytes => string::BYTES_METHODS,
        BuiltinType::List => sequence::LIST_METHODS,
        BuiltinType::Tuple => sequence::TUPLE_METHODS,
        BuiltinType::Dict => dict::DICT_METHODS,
        BuiltinType::Array => array::ARRAY_METHODS,
        _ => &[],
    }
}

enum Target {
    Module(ObjRef, String),
    Type(BuiltinType),
    Complex(f64, f64),
    Exception,
    Function(String),
    Other(BuiltinType),
}

fn target(obj: ObjRef) -> Target {
    heap::view(obj, |payload| match payload {
        Payload::Module(module) => Target::Module(module.dict, module.name.clone()),
        Payload::Type(ty) => Target::Type(*ty),
        Payload::Complex(value) => Target::Complex(value.re, value.im),
        Payload::Exception(_) => Target::Exception,
        Payload::Function(function) => Target::Function(function.name.clone()),
        Payload::Builtin(function) => Target::Function(function.name.to_string()),
        other => Target::Other(other.builtin_type()),
    })
}

fn lookup(obj: ObjRef, name: &str) -> RtResult<Option<Owned>> {
    if name == "__class__" {
        return Ok(Some(Owned::from_raw(objects::type_of(obj).type_object())));
    }

    let ty = match target(obj) {
        Target::Module(dict, module_name) => {
            if name == "__name__" {
                return Ok(Some(objects::new_str(&module_name)));
            }
            return Ok(dict::dict_get_str(dict, name));
        }
        Target::Type(ty) => {
            return Ok(match name {
                "__name__" | "__qualname__" => Some(objects::new_str(ty.name())),
                "__module__" => Some(objects::new_str(ty.module())),
                _ => None,
            })
        }
        Target::Complex(re, im) => match name {
            "real" => return Ok(Some(objects::new_float(re))),
            "imag" => return Ok(Some(objects::new_float(im))),
            _ => BuiltinType::Complex,
        },
        Target::Exception => {
            if name == "args" {
                let args = err::exception_args(obj).unwrap_or_default();
                return Ok(Some(objects::new_tuple(args)));
            }
            BuiltinType::BaseException
        }
        Target::Function(function_name) => {
            if name == "__name__" {
                return Ok(Some(objects::new_str(&function_name)));
            }
            BuiltinType::Function
        }
        Target::Other(ty) => ty,
    };

    if ty == BuiltinType::Array {
        if let Some(value) = array::attribute(obj, name) {
            return Ok(Some(value));
        }
    }

    Ok(method_table(ty)
        .iter()
        .find(|(method, _)| *method == name)
        .map(|(method, func)| objects::new_method(obj, *method, *func)))
}

/// `getattr(obj, name)`
pub fn getattr(obj: ObjRef, name: &str) -> RtResult<Owned> {
    match lookup(obj, name)? {
        Some(value) => Ok(value),
        None => {
            let message = match target(obj) {
                Target::Module(_, module_name) => {
                    format!("module '{module_name}' has no attribute '{name}'")
                }
                Target::Type(ty) => format!("type object '{}' has no attribute '{name}'", ty.name()),
                _ => format!(
                    "'{}' object has no attribute '{name}'",
                    objects::type_name(obj)
                ),
            };
            Err(err::raise(BuiltinType::AttributeError, message))
        }
    }
}

/// `hasattr(obj, name)`
pub fn hasattr(obj: ObjRef, name: &str) -> bool {
    match lookup(obj, name) {
        Ok(found) => found.is_some(),
        Err(_) => {
            err::clear();
            false
        }
    }
}

/// `setattr(obj, name, value)`; only module attributes are writable
pub fn setattr(obj: ObjRef, name: &str, value: ObjRef) -> RtResult<()> {
    let module_dict = with_interp(|interp| match interp.payload(obj) {
        Payload::Module(module) => Some(module.dict),
        _ => None,
    });
    match module_dict {
        Some(dict) => dict::dict_set_str(dict, name, value),
        None => Err(err::raise(
            BuiltinType::AttributeError,
            format!(
                "'{}' object attribute '{name}' is read-only",
                objects::type_name(obj)
            ),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_binding() {
        let text = objects::new_str("abc");
        let upper = getattr(text.raw(), "upper").unwrap();
        assert_eq!(objects::type_of(upper.raw()), BuiltinType::Method);
        assert_eq!(heap::refcount(text.raw()), 2);
        drop(upper);
        assert_eq!(heap::refcount(text.raw()), 1);
    }

    #[test]
    fn test_missing_attribute() {
        let value = objects::new_float(1.0);
        assert!(getattr(value.raw(), "nope").is_err());
        assert!(err::pending_matches(BuiltinType::AttributeError));
        err::clear();
        assert!(!hasattr(value.raw(), "nope"));
        assert!(hasattr(value.raw(), "__class__"));
    }

    #[test]
    fn test_complex_parts() {
        let value = objects::new_complex(num_complex::Complex64::new(1.0, -2.0));
        let imag = getattr(value.raw(), "imag").unwrap();
        assert_eq!(objects::as_float(imag.raw()), Some(-2.0));
    }

    #[test]
    fn test_setattr_rejects_plain_objects() {
        let value = objects::new_object();
        assert!(setattr(value.raw(), "x", objects::none()).is_err());
        err::clear();
    }
}
