//! Call protocol

use crate::builtins::{attr, constructors};
use crate::err::{self, RtResult};
use crate::eval;
use crate::heap;
use crate::logging::log_call;
use crate::objects::{self, Args, NativeFn, NativeMethod, ObjRef, Payload};
use crate::refcount::Owned;
use crate::types::BuiltinType;

enum Callee {
    Builtin(&'static str, NativeFn),
    Method(ObjRef, &'static str, NativeMethod),
    Function,
    Type(BuiltinType),
    NotCallable,
}

/// `callable(*args, **kwargs)`
pub fn call(callable: ObjRef, args: &[ObjRef], kwargs: &[(String, ObjRef)]) -> RtResult<Owned> {
    let callee = heap::view(callable, |payload| match payload {
        Payload::Builtin(function) => Callee::Builtin(function.name, function.func),
        Payload::Method(method) => Callee::Method(method.receiver, method.name, method.func),
        Payload::Function(_) => Callee::Function,
        Payload::Type(ty) if ty.is_instantiable() => Callee::Type(*ty),
        _ => Callee::NotCallable,
    });
    let call_args = Args::new(args, kwargs);

    match callee {
        Callee::Builtin(name, func) => {
            log_call(name, args.len());
            func(call_args)
        }
        Callee::Method(receiver, name, func) => {
            log_call(name, args.len());
            // keep the receiver alive even if the method object goes away
            let _receiver = Owned::from_borrowed(receiver);
            func(receiver, call_args)
        }
        Callee::Function => eval::call_function(callable, call_args),
        Callee::Type(ty) => {
            log_call(ty.name(), args.len());
            constructors::construct(ty, call_args)
        }
        Callee::NotCallable => Err(err::raise(
            BuiltinType::TypeError,
            format!("'{}' object is not callable", objects::type_name(callable)),
        )),
    }
}

/// `obj.name(*args)`
pub fn call_method(obj: ObjRef, name: &str, args: &[ObjRef]) -> RtResult<Owned> {
    let method = attr::getattr(obj, name)?;
    call(method.raw(), args, &[])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_method() {
        let text = objects::new_str("Ab");
        let lower = call_method(text.raw(), "lower", &[]).unwrap();
        assert_eq!(objects::str_wtf8(lower.raw()).unwrap(), b"ab");
    }

    #[test]
    fn test_type_call_constructs() {
        let arg = objects::new_str("42");
        let value = call(BuiltinType::Int.type_object(), &[arg.raw()], &[]).unwrap();
        assert_eq!(objects::as_int(value.raw()), Some(objects::Int::Small(42)));
    }

    #[test]
    fn test_not_callable() {
        let value = objects::new_float(1.0);
        assert!(call(value.raw(), &[], &[]).is_err());
        assert!(err::pending_matches(BuiltinType::TypeError));
        err::clear();
    }
}
