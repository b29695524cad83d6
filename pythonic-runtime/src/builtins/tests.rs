//! Tests for builtins driven through source evaluation

use super::*;
use crate::err;
use crate::eval::{run_string, Mode};
use crate::objects::{self, Int};
use crate::refcount::Owned;
use crate::types::BuiltinType;

fn eval(code: &str) -> Owned {
    let globals = objects::new_dict();
    run_string(code, Mode::Eval, globals.raw(), globals.raw()).unwrap()
}

fn eval_repr(code: &str) -> String {
    repr(eval(code).raw()).unwrap()
}

#[test]
fn test_len_of_containers() {
    assert_eq!(eval_repr("len([1, 2, 3])"), "3");
    assert_eq!(eval_repr("len({'a': 1})"), "1");
    assert_eq!(eval_repr("len('héllo')"), "5");
    assert_eq!(eval_repr("len(b'ab')"), "2");
}

#[test]
fn test_isinstance_hierarchy() {
    assert_eq!(eval_repr("isinstance(True, int)"), "True");
    assert_eq!(eval_repr("isinstance(1, bool)"), "False");
    assert_eq!(eval_repr("isinstance(KeyError('k'), LookupError)"), "True");
    assert_eq!(eval_repr("isinstance(1.5, (str, float))"), "True");
}

#[test]
fn test_zip_and_dict() {
    assert_eq!(
        eval_repr("dict(zip(['a', 'b'], [1, 2]))"),
        "{'a': 1, 'b': 2}"
    );
}

#[test]
fn test_big_integer_literals() {
    let value = eval("2 ** 128");
    match objects::as_int(value.raw()) {
        Some(Int::Big(big)) => assert_eq!(big.to_string(), "340282366920938463463374607431768211456"),
        other => panic!("expected a big int, got {other:?}"),
    }
}

#[test]
fn test_array_module() {
    let globals = objects::new_dict();
    let code = "import array\nx = array.array('d', [1.0, 2.0, 3.0])\nn = len(x)\nt = x.typecode\n";
    run_string(code, Mode::Exec, globals.raw(), globals.raw()).unwrap();
    let n = dict_get_str(globals.raw(), "n").unwrap();
    assert_eq!(objects::as_int(n.raw()), Some(Int::Small(3)));
    let t = dict_get_str(globals.raw(), "t").unwrap();
    assert_eq!(to_str(t.raw()).unwrap(), "d");
}

#[test]
fn test_from_import() {
    let globals = objects::new_dict();
    run_string(
        "from math import sqrt as root\nr = root(16)",
        Mode::Exec,
        globals.raw(),
        globals.raw(),
    )
    .unwrap();
    let r = dict_get_str(globals.raw(), "r").unwrap();
    assert_eq!(objects::as_float(r.raw()), Some(4.0));
}

#[test]
fn test_bad_import_name() {
    let globals = objects::new_dict();
    assert!(run_string("from math import nothing", Mode::Exec, globals.raw(), globals.raw()).is_err());
    assert!(err::pending_matches(BuiltinType::ImportError));
    err::clear();
}

#[test]
fn test_str_encode_surrogate_fails() {
    let globals = objects::new_dict();
    assert!(run_string("chr(0xDC80).encode()", Mode::Eval, globals.raw(), globals.raw()).is_err());
    let error = err::fetch().unwrap();
    let lines =
        err::format_exception_only(error.ptype.raw(), error.pvalue.as_ref().map(Owned::raw)).unwrap();
    assert!(lines[0].starts_with("UnicodeEncodeError: 'utf-8' codec can't encode"));
}

#[test]
fn test_call_with_keywords() {
    let globals = objects::new_dict();
    run_string(
        "def scale(x, factor=2):\n    return x * factor\n",
        Mode::Exec,
        globals.raw(),
        globals.raw(),
    )
    .unwrap();
    let scale = dict_get_str(globals.raw(), "scale").unwrap();
    let x = objects::new_int_i64(5);
    let factor = objects::new_int_i64(3);
    let kwargs = vec![("factor".to_string(), factor.raw())];
    let result = call(scale.raw(), &[x.raw()], &kwargs).unwrap();
    assert_eq!(objects::as_int(result.raw()), Some(Int::Small(15)));

    assert!(call(scale.raw(), &[], &[]).is_err());
    assert!(err::pending_matches(BuiltinType::TypeError));
    err::clear();
}

#[test]
fn test_key_error_message() {
    let globals = objects::new_dict();
    assert!(run_string("{}['missing']", Mode::Eval, globals.raw(), globals.raw()).is_err());
    let error = err::fetch().unwrap();
    let value = error.pvalue.unwrap();
    assert_eq!(err::exception_message(value.raw()).unwrap(), "'missing'");
}
