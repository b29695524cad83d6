use pythonic::{BridgeConfig, CellArray, CharArray, ErrorKind, HostValue, NumericArray, Session, StructValue};

fn session() -> Session {
    Session::with_config(BridgeConfig::default())
}

fn typename(s: &mut Session, value: HostValue) -> String {
    let result = s.pycall(&"typename".into(), &[value], &[], 1).unwrap().unwrap();
    result.as_string().unwrap()
}

#[test]
fn test_argument_types_seen_by_foreign_code() {
    let mut s = session();
    s.pyexec("def typename(x):\n    return type(x).__name__\n", None).unwrap();

    assert_eq!(typename(&mut s, HostValue::from(0.0)), "float");
    assert_eq!(typename(&mut s, HostValue::from(num_complex::Complex64::new(0.0, 2.0))), "complex");
    assert_eq!(typename(&mut s, HostValue::from(0i32)), "int");
    assert_eq!(typename(&mut s, HostValue::from(false)), "bool");
    assert_eq!(typename(&mut s, HostValue::from("Hello world")), "str");
    assert_eq!(typename(&mut s, HostValue::Cell(CellArray::empty())), "tuple");
    assert_eq!(
        typename(&mut s, HostValue::Array(NumericArray::row(vec![1.0, 2.0]))),
        "array"
    );
    let record = StructValue::from_fields([("a", HostValue::from(1.0))]).unwrap();
    assert_eq!(typename(&mut s, HostValue::Struct(record)), "dict");
}

#[test]
fn test_sequences_from_cells() {
    let mut s = session();
    let cell = HostValue::Cell(CellArray::row(vec![
        HostValue::from(1.0),
        HostValue::from(2.0),
        HostValue::from(3.0),
    ]));
    let list = s.pycall(&"list".into(), &[cell], &[], 1).unwrap().unwrap();
    assert_eq!(s.string_value(&list).unwrap(), CharArray::new("[1.0, 2.0, 3.0]"));

    let ints = HostValue::Cell(CellArray::row(vec![HostValue::from(1i8), HostValue::from(2i8)]));
    let tuple = s.pycall(&"tuple".into(), &[ints], &[], 1).unwrap().unwrap();
    assert_eq!(s.string_value(&tuple).unwrap(), CharArray::new("(1, 2)"));
}

#[test]
fn test_argument_conversion_errors() {
    let mut s = session();
    let multirow = HostValue::String(CharArray::from_rows(&["hello", "world"]));
    let error = s.pycall(&"str".into(), &[multirow], &[], 1).unwrap_err();
    assert_eq!(error.kind, ErrorKind::ValueConvert);
    assert!(error.to_string().starts_with("pycall: multirow char array"));
}

#[test]
fn test_keyword_arguments() {
    let mut s = session();
    let kwargs = vec![
        ("a".to_string(), HostValue::from(1.0)),
        ("b".to_string(), HostValue::from(2.0)),
    ];
    let dict = s.pycall(&"dict".into(), &[], &kwargs, 1).unwrap().unwrap();
    assert_eq!(s.class_name(&dict).unwrap(), "dict");
    let record = s.struct_from_dict(&dict).unwrap();
    assert_eq!(record.field_names(), vec!["a", "b"]);
    assert_eq!(record.get("b"), Some(&HostValue::from(2.0)));
}

#[test]
fn test_foreign_exception_is_prefixed() {
    let mut s = session();
    let error = s.pyeval("undefined_name", None, 1).unwrap_err();
    assert_eq!(error.kind, ErrorKind::ForeignRuntimeError);
    assert_eq!(error.to_string(), "pyeval: NameError: name 'undefined_name' is not defined");

    let error = s.pyexec("raise ValueError('bad')", None).unwrap_err();
    assert_eq!(error.to_string(), "pyexec: ValueError: bad");
}

#[test]
fn test_handles_pass_back_unchanged() {
    let mut s = session();
    let list = s.pyeval("[4.0, 5.0]", None, 1).unwrap().unwrap();
    let length = s.pycall(&"len".into(), &[list.clone()], &[], 1).unwrap();
    assert_eq!(length, Some(HostValue::from(2i64)));

    let cell = s.cell_value(&list).unwrap();
    assert_eq!(cell.items(), &[HostValue::from(4.0), HostValue::from(5.0)]);
}

#[test]
fn test_pyexec_defaults_to_main() {
    let mut s = session();
    s.pyexec("answer = 42", None).unwrap();
    assert_eq!(s.pyeval("answer", None, 1).unwrap(), Some(HostValue::from(42i64)));
    assert_eq!(s.pyeval("None", None, 0).unwrap(), None);
}
