//! Command surface
//!
//! Each entry point marshals host arguments through the `Converter`, calls
//! into the foreign runtime and converts the result back. Every failure
//! comes out as a `HostError` prefixed with the command's name.

use pythonic_runtime::builtins::{self, find_function, main_dict};
use pythonic_runtime::objects;
use pythonic_runtime::{run_string, BuiltinType, Mode, ObjRef, Owned};

use crate::codec::{primitive, Decode, Encode, ForeignKind};
use crate::config::{self, BridgeConfig};
use crate::dispatch::Converter;
use crate::errors::{CommandContext, ConvResult, ConversionError, HostError};
use crate::handle::ForeignHandle;
use crate::logging;
use crate::store::StoreEntryInfo;
use crate::value::{CellArray, CharArray, HostValue, ScalarKind, StructValue};

pub const PYCALL: &str = "pycall";
pub const PYEVAL: &str = "pyeval";
pub const PYEXEC: &str = "pyexec";
pub const OBJSTORE_GET: &str = "objstore_get";
pub const OBJSTORE_PUT: &str = "objstore_put";
pub const CLASS_NAME: &str = "class_name";
pub const ISINSTANCE: &str = "pyobject.isa";
pub const INT64_VALUE: &str = "pyobject.int64";
pub const UINT64_VALUE: &str = "pyobject.uint64";
pub const STRING_VALUE: &str = "pyobject.char";
pub const STRUCT_VALUE: &str = "pyobject.struct";
pub const CELL_VALUE: &str = "pyobject.cell";

/// One host-side session with the foreign runtime
///
/// Owns the converter and therefore the object store; dropping the session
/// releases every stored object.
#[derive(Debug)]
pub struct Session {
    converter: Converter,
    config: BridgeConfig,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::with_config(config::defaults().clone())
    }

    pub fn with_config(config: BridgeConfig) -> Self {
        Self {
            converter: Converter::with_config(&config),
            config,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn converter(&self) -> &Converter {
        &self.converter
    }

    pub fn converter_mut(&mut self) -> &mut Converter {
        &mut self.converter
    }

    /// Install the global subscriber described by this session's config
    pub fn init_logging(&self) -> bool {
        logging::init_from_config(&self.config)
    }

    fn stored(&self, value: &HostValue) -> Option<Owned> {
        let key = value.as_handle()?;
        self.converter.store().lookup(key)?.into_owned()
    }

    fn require_object(&self, value: &HostValue, command: &str, message: &str) -> Result<Owned, HostError> {
        self.stored(value)
            .ok_or_else(|| HostError::usage(command, message))
    }

    /// Return `result` to the host only when it is wanted or is not `None`
    fn implicit_result(&mut self, result: Owned, nargout: usize, command: &str) -> Result<Option<HostValue>, HostError> {
        if nargout == 0 && objects::is_none(result.raw()) {
            return Ok(None);
        }
        self.converter.decode(result.raw()).command(command).map(Some)
    }

    /// Call a foreign function, given by name or by handle, with host
    /// arguments
    ///
    /// A name with a dot imports the module part; a bare name is looked up
    /// in `__main__`, then in `builtins`.
    pub fn pycall(
        &mut self,
        func: &HostValue,
        args: &[HostValue],
        kwargs: &[(String, HostValue)],
        nargout: usize,
    ) -> Result<Option<HostValue>, HostError> {
        let callable = match func {
            HostValue::String(name) if !name.is_multirow() => {
                let name = name.to_string_lossy();
                find_function(&name).ok_or_else(|| {
                    HostError::usage(PYCALL, format!("no such Python function or callable: {name}"))
                })?
            }
            HostValue::Handle(_) => {
                self.require_object(func, PYCALL, "FUNC must be a valid Python reference")?
            }
            _ => {
                return Err(HostError::usage(
                    PYCALL,
                    "FUNC must be a string or a Python reference",
                ))
            }
        };

        let positional = args
            .iter()
            .map(|arg| encode_owned(&self.converter, arg))
            .collect::<ConvResult<Vec<_>>>()
            .command(PYCALL)?;
        let keywords = kwargs
            .iter()
            .map(|(name, value)| -> ConvResult<(String, Owned)> {
                Ok((name.clone(), encode_owned(&self.converter, value)?))
            })
            .collect::<ConvResult<Vec<_>>>()
            .command(PYCALL)?;

        let arg_refs: Vec<ObjRef> = positional.iter().map(Owned::raw).collect();
        let kwarg_refs: Vec<(String, ObjRef)> = keywords
            .iter()
            .map(|(name, value)| (name.clone(), value.raw()))
            .collect();
        let result = builtins::call(callable.raw(), &arg_refs, &kwarg_refs)
            .map_err(ConversionError::from)
            .command(PYCALL)?;

        self.implicit_result(result, nargout, PYCALL)
    }

    fn run(&mut self, command: &str, code: &str, mode: Mode, namespace: Option<&HostValue>) -> Result<Owned, HostError> {
        let locals = match namespace {
            Some(value) => {
                Some(self.require_object(value, command, "NAMESPACE must be a valid Python reference")?)
            }
            None => None,
        };
        let globals = main_dict().map_err(ConversionError::from).command(command)?;
        let locals_ref = locals.as_ref().map_or(globals.raw(), Owned::raw);

        tracing::debug!(target: "pythonic::commands", command, bytes = code.len(), "running code");
        run_string(code, mode, globals.raw(), locals_ref)
            .map_err(ConversionError::from)
            .command(command)
    }

    /// Evaluate an expression with `__main__` as globals and `namespace`
    /// (a stored dict) as locals
    pub fn pyeval(&mut self, code: &str, namespace: Option<&HostValue>, nargout: usize) -> Result<Option<HostValue>, HostError> {
        let result = self.run(PYEVAL, code, Mode::Eval, namespace)?;
        self.implicit_result(result, nargout, PYEVAL)
    }

    /// Execute statements; assignments land in `namespace` when given,
    /// otherwise in `__main__`
    pub fn pyexec(&mut self, code: &str, namespace: Option<&HostValue>) -> Result<(), HostError> {
        self.run(PYEXEC, code, Mode::Exec, namespace).map(drop)
    }

    /// Convert `value` and store the result, returning its key
    pub fn objstore_put(&mut self, value: &HostValue) -> Result<u64, HostError> {
        let handle = self.converter.encode(value).command(OBJSTORE_PUT)?;
        self.converter.store_mut().put(handle).command(OBJSTORE_PUT)
    }

    /// Store the foreign `None`
    pub fn objstore_put_none(&mut self) -> Result<u64, HostError> {
        let none = ForeignHandle::borrowed(objects::none());
        self.converter.store_mut().put(none).command(OBJSTORE_PUT)
    }

    /// Check out one more reference to the object under `key`
    pub fn objstore_get(&mut self, key: u64) -> Result<HostValue, HostError> {
        match self.converter.store_mut().get(key) {
            Some(_) => Ok(HostValue::Handle(key)),
            None => Err(HostError::usage(
                OBJSTORE_GET,
                format!("no existing Python object found for key {key}"),
            )),
        }
    }

    /// Return one checked-out reference; unknown keys are ignored
    pub fn objstore_del(&mut self, key: u64) {
        if !self.converter.store_mut().drop_ref(key) {
            tracing::debug!(target: "pythonic::store", key, "delete of unknown key ignored");
        }
    }

    pub fn objstore_list(&self) -> Vec<StoreEntryInfo> {
        self.converter.store().list()
    }

    /// Release every stored object; outstanding handles become dangling
    pub fn objstore_clear(&mut self) {
        self.converter.store_mut().clear();
    }

    /// Whether `value` is a handle to the foreign `None`
    pub fn is_none(&self, value: &HostValue) -> bool {
        self.stored(value)
            .map_or(false, |obj| objects::is_none(obj.raw()))
    }

    /// Qualified class name of a stored object (`array.array`, `dict`, ...)
    pub fn class_name(&self, value: &HostValue) -> Result<String, HostError> {
        let obj = self.require_object(value, CLASS_NAME, "argument must be a valid Python object")?;
        Ok(objects::class_name(obj.raw()))
    }

    /// Whether a stored object is an instance of the type named `py.<name>`
    ///
    /// Names resolve like `pycall` functions; a name that does not resolve
    /// to a type gives false.
    pub fn isinstance(&self, value: &HostValue, type_name: &HostValue) -> Result<bool, HostError> {
        let obj = self.require_object(value, ISINSTANCE, "X must be a Python object")?;
        let name = type_name
            .as_string()
            .and_then(|name| name.strip_prefix("py.").map(str::to_string))
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                HostError::usage(ISINSTANCE, "TYPE must be a string naming a Python type (py.*)")
            })?;

        let ty = find_function(&name)
            .filter(|found| objects::type_of(found.raw()) == BuiltinType::Type)
            .and_then(|found| BuiltinType::from_type_object(found.raw()));
        Ok(ty.map_or(false, |ty| objects::isinstance(obj.raw(), ty)))
    }

    fn scalar_value(&mut self, value: &HostValue, command: &str, kind: ScalarKind) -> Result<HostValue, HostError> {
        let obj = self.require_object(value, command, "argument must be a Python object")?;
        self.converter.decode_as(obj.raw(), kind).command(command)
    }

    /// Saturating `int64` value of a stored integer
    pub fn int64_value(&mut self, value: &HostValue) -> Result<HostValue, HostError> {
        self.scalar_value(value, INT64_VALUE, ScalarKind::Int64)
    }

    /// Saturating `uint64` value of a stored integer; negatives give 0
    pub fn uint64_value(&mut self, value: &HostValue) -> Result<HostValue, HostError> {
        self.scalar_value(value, UINT64_VALUE, ScalarKind::UInt64)
    }

    /// Text of a stored `str` or `bytes`, otherwise its `str()`
    pub fn string_value(&mut self, value: &HostValue) -> Result<CharArray, HostError> {
        let obj = self.require_object(value, STRING_VALUE, "argument must be a valid Python object")?;
        let bytes = if ForeignKind::of(obj.raw()).is_string() {
            primitive::decode_string(obj.raw()).command(STRING_VALUE)?
        } else {
            builtins::to_str(obj.raw())
                .map_err(ConversionError::from)
                .command(STRING_VALUE)?
                .into_bytes()
        };
        Ok(CharArray::from_bytes(bytes))
    }

    /// Struct from a stored `dict`
    pub fn struct_from_dict(&mut self, value: &HostValue) -> Result<StructValue, HostError> {
        let obj = self.require_object(value, STRUCT_VALUE, "argument must be a Python object")?;
        self.converter.decode_struct(obj.raw()).command(STRUCT_VALUE)
    }

    /// Cell from a stored `list` or `tuple`
    pub fn cell_value(&mut self, value: &HostValue) -> Result<CellArray, HostError> {
        let obj = self.require_object(value, CELL_VALUE, "argument must be a Python object")?;
        self.converter.decode_cell(obj.raw()).command(CELL_VALUE)
    }
}

fn encode_owned(converter: &Converter, value: &HostValue) -> ConvResult<Owned> {
    converter
        .encode(value)?
        .into_owned()
        .ok_or_else(|| ConversionError::value_convert("argument encoded to a null object"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    fn session() -> Session {
        Session::with_config(BridgeConfig::default())
    }

    #[test]
    fn test_pycall_by_name() {
        let mut s = session();
        let root = s.pycall(&"math.sqrt".into(), &[HostValue::from(4.0)], &[], 1).unwrap();
        assert_eq!(root, Some(HostValue::from(2.0)));

        let truncated = s.pycall(&"int".into(), &[HostValue::from(10.2)], &[], 1).unwrap();
        assert_eq!(truncated, Some(HostValue::from(10i64)));
    }

    #[test]
    fn test_pycall_func_errors() {
        let mut s = session();
        let error = s.pycall(&HostValue::from(1.0), &[], &[], 0).unwrap_err();
        assert_eq!(error.to_string(), "pycall: FUNC must be a string or a Python reference");

        let error = s.pycall(&"no_such_function".into(), &[], &[], 0).unwrap_err();
        assert_eq!(
            error.to_string(),
            "pycall: no such Python function or callable: no_such_function"
        );

        let error = s.pycall(&HostValue::Handle(u64::MAX), &[], &[], 0).unwrap_err();
        assert_eq!(error.to_string(), "pycall: FUNC must be a valid Python reference");
    }

    #[test]
    fn test_pycall_none_result_is_dropped() {
        let mut s = session();
        let printed = s.pycall(&"print".into(), &[], &[], 0).unwrap();
        assert_eq!(printed, None);
        let wanted = s.pycall(&"print".into(), &[], &[], 1).unwrap();
        assert!(matches!(wanted, Some(HostValue::Handle(_))));
    }

    #[test]
    fn test_pyeval_namespace() {
        let mut s = session();
        let ns = s.pyeval("{}", None, 1).unwrap().unwrap();
        s.pyexec("x = 3.5", Some(&ns)).unwrap();
        assert_eq!(s.pyeval("x", Some(&ns), 1).unwrap(), Some(HostValue::from(3.5)));

        let error = s.pyeval("x", Some(&HostValue::from(1.0)), 1).unwrap_err();
        assert_eq!(error.to_string(), "pyeval: NAMESPACE must be a valid Python reference");
    }

    #[test]
    fn test_pyeval_syntax_error() {
        let mut s = session();
        let error = s.pyeval("1 +", None, 1).unwrap_err();
        assert_eq!(error.kind, ErrorKind::ParseError);
        assert!(error.to_string().starts_with("pyeval: SyntaxError"));
    }

    #[test]
    fn test_store_commands() {
        let mut s = session();
        let key = s.objstore_put(&HostValue::from("Octave")).unwrap();
        assert_eq!(s.objstore_get(key).unwrap(), HostValue::Handle(key));
        assert_eq!(s.converter().store().count(key), Some(2));

        s.objstore_del(key);
        s.objstore_del(key);
        assert!(s.objstore_get(key).is_err());

        let none = s.objstore_put_none().unwrap();
        assert!(s.is_none(&HostValue::Handle(none)));
        assert!(!s.is_none(&HostValue::from(1.0)));
        s.objstore_clear();
        assert!(s.objstore_list().is_empty());
    }

    #[test]
    fn test_accessors() {
        let mut s = session();
        let list = s.pyeval("[]", None, 1).unwrap().unwrap();
        assert_eq!(s.class_name(&list).unwrap(), "list");
        assert_eq!(s.string_value(&list).unwrap(), CharArray::new("[]"));
        assert!(s.isinstance(&list, &"py.list".into()).unwrap());
        assert!(s.isinstance(&list, &"py.object".into()).unwrap());
        assert!(!s.isinstance(&list, &"py.dict".into()).unwrap());
        assert!(!s.isinstance(&list, &"py.no.such.object".into()).unwrap());
        assert!(s.isinstance(&list, &"list".into()).is_err());

        let big = s.pyeval("2**128", None, 1).unwrap().unwrap();
        assert_eq!(s.int64_value(&big).unwrap(), HostValue::from(i64::MAX));
        assert_eq!(s.uint64_value(&big).unwrap(), HostValue::from(u64::MAX));

        let error = s.struct_from_dict(&list).unwrap_err();
        assert_eq!(
            error.to_string(),
            "pyobject.struct: unable to convert to an Octave struct, must be a Python dict"
        );
    }
}
