//! Module registry (`sys.modules`)
//!
//! Builtin modules are created on first import and then live in the
//! thread's interpreter state until `cleanup`.

use crate::builtins::{array::TypeCode, attr, dict, functions, stdlib};
use crate::err::{self, RtResult};
use crate::heap::{self, with_interp};
use crate::logging::{debug, log_import};
use crate::objects::{self, ModuleData, ObjRef, Payload};
use crate::refcount::Owned;
use crate::types::BuiltinType;

fn new_module(name: &str) -> Owned {
    let module_dict = objects::new_dict();
    objects::alloc(Payload::Module(ModuleData {
        name: name.to_string(),
        dict: module_dict.into_raw(),
    }))
}

fn registered(name: &str) -> Option<Owned> {
    let found = with_interp(|interp| {
        let module = interp
            .modules
            .iter()
            .find(|(registered, _)| registered == name)
            .map(|(_, module)| *module)?;
        interp.incref(module);
        Some(module)
    });
    found.map(Owned::from_raw)
}

fn populate_builtins(module_dict: ObjRef) -> RtResult<()> {
    for (name, func) in functions::BUILTIN_FUNCTIONS {
        let function = objects::new_builtin(name, *func);
        dict::dict_set_str(module_dict, name, function.raw())?;
    }
    for ty in BuiltinType::ALL {
        if ty.module() == "builtins" && (ty.is_instantiable() || ty == BuiltinType::Type) {
            dict::dict_set_str(module_dict, ty.name(), ty.type_object())?;
        }
    }
    Ok(())
}

/// Create and fill a builtin module; `None` when no such module exists
fn create(name: &str) -> RtResult<Option<Owned>> {
    let module = new_module(name);
    let module_dict = module_dict(module.raw()).ok_or_else(|| {
        err::raise(BuiltinType::RuntimeError, "module has no namespace")
    })?;

    match name {
        "builtins" => populate_builtins(module_dict.raw())?,
        "__main__" => {
            let builtins = import_module("builtins")?;
            dict::dict_set_str(module_dict.raw(), "__builtins__", builtins.raw())?;
        }
        "array" => {
            dict::dict_set_str(module_dict.raw(), "array", BuiltinType::Array.type_object())?;
            let typecodes = objects::new_str(&TypeCode::supported());
            dict::dict_set_str(module_dict.raw(), "typecodes", typecodes.raw())?;
        }
        other => {
            if !stdlib::populate(other, module_dict.raw())? {
                return Ok(None);
            }
        }
    }

    let name_value = objects::new_str(name);
    dict::dict_set_str(module_dict.raw(), "__name__", name_value.raw())?;
    Ok(Some(module))
}

/// `import name`
pub fn import_module(name: &str) -> RtResult<Owned> {
    if let Some(module) = registered(name) {
        log_import(name, false);
        return Ok(module);
    }

    match create(name)? {
        Some(module) => {
            let stored = module.clone().into_raw();
            with_interp(|interp| interp.modules.push((name.to_string(), stored)));
            log_import(name, true);
            Ok(module)
        }
        None => Err(err::raise(
            BuiltinType::ModuleNotFoundError,
            format!("No module named '{name}'"),
        )),
    }
}

/// New reference to a module's namespace dict
pub fn module_dict(module: ObjRef) -> Option<Owned> {
    let dict = heap::view(module, |payload| match payload {
        Payload::Module(data) => Some(data.dict),
        _ => None,
    })?;
    Some(Owned::from_borrowed(dict))
}

/// A module's `__name__`
pub fn module_name(module: ObjRef) -> Option<String> {
    heap::view(module, |payload| match payload {
        Payload::Module(data) => Some(data.name.clone()),
        _ => None,
    })
}

/// Globals of `__main__`
pub fn main_dict() -> RtResult<Owned> {
    let main = import_module("__main__")?;
    module_dict(main.raw())
        .ok_or_else(|| err::raise(BuiltinType::RuntimeError, "__main__ has no namespace"))
}

/// Resolve a callable by name
///
/// A bare name is looked up in `__main__`, then in `builtins`; `a.b` imports
/// `a` and fetches its attribute `b`. Lookup failures are not left pending.
pub fn find_function(name: &str) -> Option<Owned> {
    let found = match name.rsplit_once('.') {
        Some((module, attribute)) => import_module(module)
            .and_then(|module| attr::getattr(module.raw(), attribute))
            .ok(),
        None => {
            let in_main = main_dict()
                .ok()
                .and_then(|globals| dict::dict_get_str(globals.raw(), name));
            in_main.or_else(|| {
                let builtins = import_module("builtins").ok()?;
                let builtins_dict = module_dict(builtins.raw())?;
                dict::dict_get_str(builtins_dict.raw(), name)
            })
        }
    };
    err::clear();
    found.filter(|function| objects::is_callable(function.raw()))
}

/// Release every imported module and any pending exception
pub fn cleanup() {
    err::clear();
    let modules = with_interp(|interp| interp.take_modules());
    debug!(target: "import", count = modules.len(), "releasing modules");
    for module in modules {
        heap::decref(module);
    }
}
