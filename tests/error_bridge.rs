use pythonic::error_bridge::{capture, capture_to, raise_in_foreign};
use pythonic::{ConversionError, ErrorKind};
use pythonic_runtime::builtins::{import_module, setattr};
use pythonic_runtime::{err, objects, run_string, BuiltinType, Mode};

#[test]
fn test_name_error_single_line() {
    let _ = err::raise(BuiltinType::NameError, "oops");
    let error = capture();
    assert!(error.message.contains("NameError"));
    assert!(error.message.contains("oops"));
    assert!(!error.message.ends_with('\n'));
    assert_eq!(error.kind, ErrorKind::ForeignRuntimeError);
}

#[test]
fn test_runtime_failure_is_captured() {
    let globals = objects::new_dict();
    let pending = run_string("undefined_name", Mode::Eval, globals.raw(), globals.raw()).unwrap_err();
    let error = ConversionError::from(pending);
    assert_eq!(error.message, "NameError: name 'undefined_name' is not defined");
    assert!(!err::occurred());
}

#[test]
fn test_syntax_error_is_parse_error() {
    let globals = objects::new_dict();
    let pending = run_string("1 +", Mode::Eval, globals.raw(), globals.raw()).unwrap_err();
    let error = ConversionError::from(pending);
    assert_eq!(error.kind, ErrorKind::ParseError);
    assert!(error.message.starts_with("SyntaxError"));
}

#[test]
fn test_formatter_failure_reports_original() {
    let traceback = import_module("traceback").unwrap();
    let broken = objects::new_int_i64(1);
    setattr(traceback.raw(), "format_exception_only", broken.raw()).unwrap();

    let _ = err::raise(BuiltinType::NameError, "oops");
    let mut diagnostics = Vec::new();
    let error = capture_to(&mut diagnostics);

    assert_eq!(
        error.message,
        "failed to get exception information from traceback.format_exception_only"
    );
    let printed = String::from_utf8(diagnostics).unwrap();
    assert!(printed.contains("NameError: oops"));
    assert!(!err::occurred());
}

#[test]
fn test_host_errors_raise_in_foreign() {
    let error = ConversionError::value_convert("bad shape");
    let _ = raise_in_foreign(&error);
    assert!(err::pending_matches(BuiltinType::ValueError));
    assert_eq!(capture().message, "ValueError: bad shape");
}
