//! Source evaluation - `eval` / `exec` over the rustpython AST
//!
//! Design: a direct tree-walking evaluator:
//! - Parsing is delegated to `rustpython-parser`; parse errors become
//!   `SyntaxError` with location details
//! - Namespaces are plain dicts; names resolve through locals, globals,
//!   then `builtins`
//! - Syntax outside the supported subset raises `NotImplementedError`

use std::cell::Cell;
use std::rc::Rc;

use num_bigint::BigInt;
use rustpython_parser::ast::{self, Constant, Expr, Stmt};
use rustpython_parser::{parse, Mode as ParseMode};

use crate::builtins::{
    self, binary_op, compare, dict_del_item, dict_get_str, dict_items, dict_set_str, dict_update,
    expect_str, getattr, import_module, iterate, module_dict, setattr, BinOp, CmpOp, UnaryOp,
};
use crate::err::{self, RtResult};
use crate::heap::{self, with_interp};
use crate::logging::log_run_string;
use crate::objects::{self, Args, ObjRef, Payload, SyntaxDetail, UserFunction};
use crate::refcount::Owned;
use crate::types::BuiltinType;

/// Nested calls of user functions allowed before `RuntimeError`
const MAX_CALL_DEPTH: usize = 64;

thread_local! {
    static CALL_DEPTH: Cell<usize> = Cell::new(0);
}

/// How a source string is compiled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// A single expression; its value is the result
    Eval,
    /// A statement block; the result is `None`
    Exec,
}

impl Mode {
    fn as_str(self) -> &'static str {
        match self {
            Mode::Eval => "eval",
            Mode::Exec => "exec",
        }
    }
}

/// Code of a user function
pub(crate) enum FunctionBody {
    Block(Vec<Stmt>),
    Lambda(Expr),
}

enum Flow {
    Normal,
    Return(Owned),
    Break,
    Continue,
}

struct Frame {
    globals: ObjRef,
    locals: ObjRef,
    builtins: Owned,
}

fn not_supported(what: &str) -> err::Pending {
    err::raise(
        BuiltinType::NotImplementedError,
        format!("{what} is not supported"),
    )
}

fn syntax_detail(code: &str, offset: usize) -> SyntaxDetail {
    let mut offset = offset.min(code.len());
    while !code.is_char_boundary(offset) {
        offset -= 1;
    }
    let before = &code[..offset];
    let line_start = before.rfind('\n').map_or(0, |pos| pos + 1);
    let line_end = code[offset..]
        .find('\n')
        .map_or(code.len(), |pos| offset + pos);

    SyntaxDetail {
        filename: "<string>".to_string(),
        lineno: before.matches('\n').count() + 1,
        offset: code[line_start..offset].chars().count() + 1,
        text: code[line_start..line_end].trim_end().to_string(),
    }
}

/// Evaluate `code` with the given namespaces
///
/// `globals` and `locals` must be dicts; pass the same dict twice for
/// module-level semantics.
pub fn run_string(code: &str, mode: Mode, globals: ObjRef, locals: ObjRef) -> RtResult<Owned> {
    log_run_string(mode.as_str(), code.len());
    for namespace in [globals, locals] {
        if objects::type_of(namespace) != BuiltinType::Dict {
            return Err(err::raise(
                BuiltinType::TypeError,
                format!(
                    "namespace must be a dict, not {}",
                    objects::type_name(namespace)
                ),
            ));
        }
    }

    let parse_mode = match mode {
        Mode::Eval => ParseMode::Expression,
        Mode::Exec => ParseMode::Module,
    };
    let parsed = match parse(code, parse_mode, "<string>") {
        Ok(parsed) => parsed,
        Err(error) => {
            let detail = syntax_detail(code, u32::from(error.offset) as usize);
            return Err(err::raise_syntax_error(&error.error.to_string(), detail));
        }
    };

    let frame = Frame::new(globals, locals)?;
    match parsed {
        ast::Mod::Expression(ast::ModExpression { body, .. }) => frame.eval(&body),
        ast::Mod::Module(ast::ModModule { body, .. }) => match frame.exec_block(&body)? {
            Flow::Normal => Ok(objects::new_none()),
            Flow::Return(_) => Err(outside("'return' outside function", code)),
            Flow::Break | Flow::Continue => Err(outside("'break' outside loop", code)),
        },
        _ => Err(not_supported("this compile mode")),
    }
}

fn outside(message: &str, code: &str) -> err::Pending {
    err::raise_syntax_error(message, syntax_detail(code, 0))
}

struct DepthGuard;

impl DepthGuard {
    fn enter() -> RtResult<Self> {
        let depth = CALL_DEPTH.with(|depth| {
            let next = depth.get() + 1;
            depth.set(next);
            next
        });
        let guard = DepthGuard;
        if depth > MAX_CALL_DEPTH {
            return Err(err::raise(
                BuiltinType::RuntimeError,
                "maximum recursion depth exceeded",
            ));
        }
        Ok(guard)
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        CALL_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Call a `def` or `lambda` function
pub(crate) fn call_function(func: ObjRef, args: Args<'_>) -> RtResult<Owned> {
    let (name, params, defaults, body, globals) = with_interp(|interp| {
        let snapshot = match interp.payload(func) {
            Payload::Function(function) => Some((
                function.name.clone(),
                function.params.clone(),
                function.defaults.clone(),
                Rc::clone(&function.body),
                function.globals,
            )),
            _ => None,
        };
        if let Some((_, _, defaults, _, globals)) = &snapshot {
            for value in defaults {
                interp.incref(*value);
            }
            interp.incref(*globals);
        }
        snapshot
    })
    .ok_or_else(|| err::raise(BuiltinType::TypeError, "not a user function"))?;
    let defaults: Vec<Owned> = defaults.into_iter().map(Owned::from_raw).collect();
    let globals = Owned::from_raw(globals);

    let _guard = DepthGuard::enter()?;
    crate::logging::log_call(&name, args.len());

    if args.len() > params.len() {
        return Err(err::raise(
            BuiltinType::TypeError,
            format!(
                "{name}() takes {} positional arguments but {} were given",
                params.len(),
                args.len()
            ),
        ));
    }

    let locals = objects::new_dict();
    for (param, value) in params.iter().zip(args.positional) {
        dict_set_str(locals.raw(), param, *value)?;
    }
    for (key, value) in args.keywords {
        let Some(position) = params.iter().position(|param| param == key) else {
            return Err(err::raise(
                BuiltinType::TypeError,
                format!("{name}() got an unexpected keyword argument '{key}'"),
            ));
        };
        if position < args.len() {
            return Err(err::raise(
                BuiltinType::TypeError,
                format!("{name}() got multiple values for argument '{key}'"),
            ));
        }
        dict_set_str(locals.raw(), key, *value)?;
    }

    let first_default = params.len() - defaults.len();
    for (position, param) in params.iter().enumerate() {
        if dict_get_str(locals.raw(), param).is_some() {
            continue;
        }
        match position.checked_sub(first_default) {
            Some(index) => dict_set_str(locals.raw(), param, defaults[index].raw())?,
            None => {
                return Err(err::raise(
                    BuiltinType::TypeError,
                    format!("{name}() missing required positional argument: '{param}'"),
                ))
            }
        }
    }

    let frame = Frame::new(globals.raw(), locals.raw())?;
    match &*body {
        FunctionBody::Lambda(expr) => frame.eval(expr),
        FunctionBody::Block(stmts) => match frame.exec_block(stmts)? {
            Flow::Return(value) => Ok(value),
            _ => Ok(objects::new_none()),
        },
    }
}

fn constant(value: &Constant) -> RtResult<Owned> {
    Ok(match value {
        Constant::None => objects::new_none(),
        Constant::Bool(value) => objects::new_bool(*value),
        Constant::Str(text) => objects::new_str(text),
        Constant::Bytes(bytes) => objects::new_bytes(bytes),
        Constant::Int(value) => {
            let value: BigInt = value
                .to_string()
                .parse()
                .map_err(|_| err::raise(BuiltinType::ValueError, "invalid integer literal"))?;
            objects::new_int_big(value)
        }
        Constant::Float(value) => objects::new_float(*value),
        Constant::Complex { real, imag } => {
            objects::new_complex(num_complex::Complex64::new(*real, *imag))
        }
        Constant::Tuple(items) => {
            let items = items.iter().map(constant).collect::<RtResult<Vec<_>>>()?;
            objects::new_tuple(items)
        }
        Constant::Ellipsis => return Err(not_supported("Ellipsis")),
    })
}

fn bin_op(op: &ast::Operator) -> RtResult<BinOp> {
    Ok(match op {
        ast::Operator::Add => BinOp::Add,
        ast::Operator::Sub => BinOp::Sub,
        ast::Operator::Mult => BinOp::Mul,
        ast::Operator::Div => BinOp::TrueDiv,
        ast::Operator::FloorDiv => BinOp::FloorDiv,
        ast::Operator::Mod => BinOp::Mod,
        ast::Operator::Pow => BinOp::Pow,
        ast::Operator::BitAnd => BinOp::BitAnd,
        ast::Operator::BitOr => BinOp::BitOr,
        ast::Operator::BitXor => BinOp::BitXor,
        ast::Operator::LShift => BinOp::LShift,
        ast::Operator::RShift => BinOp::RShift,
        ast::Operator::MatMult => return Err(not_supported("matrix multiplication")),
    })
}

fn cmp_op(op: &ast::CmpOp) -> CmpOp {
    match op {
        ast::CmpOp::Eq => CmpOp::Eq,
        ast::CmpOp::NotEq => CmpOp::NotEq,
        ast::CmpOp::Lt => CmpOp::Lt,
        ast::CmpOp::LtE => CmpOp::LtE,
        ast::CmpOp::Gt => CmpOp::Gt,
        ast::CmpOp::GtE => CmpOp::GtE,
        ast::CmpOp::Is => CmpOp::Is,
        ast::CmpOp::IsNot => CmpOp::IsNot,
        ast::CmpOp::In => CmpOp::In,
        ast::CmpOp::NotIn => CmpOp::NotIn,
    }
}

fn expr_kind(expr: &Expr) -> &'static str {
    match expr {
        Expr::ListComp(_) | Expr::SetComp(_) | Expr::DictComp(_) => "a comprehension",
        Expr::GeneratorExp(_) => "a generator expression",
        Expr::Set(_) => "a set display",
        Expr::JoinedStr(_) | Expr::FormattedValue(_) => "an f-string",
        Expr::Slice(_) => "slicing",
        Expr::NamedExpr(_) => "an assignment expression",
        Expr::Await(_) | Expr::Yield(_) | Expr::YieldFrom(_) => "a coroutine expression",
        _ => "this expression",
    }
}

fn stmt_kind(stmt: &Stmt) -> &'static str {
    match stmt {
        Stmt::ClassDef(_) => "class definition",
        Stmt::Try(_) => "try statement",
        Stmt::With(_) => "with statement",
        Stmt::Assert(_) => "assert statement",
        Stmt::Global(_) | Stmt::Nonlocal(_) => "scope declaration",
        _ => "this statement",
    }
}

impl Frame {
    fn new(globals: ObjRef, locals: ObjRef) -> RtResult<Self> {
        let builtins_module = import_module("builtins")?;
        let builtins = module_dict(builtins_module.raw())
            .ok_or_else(|| err::raise(BuiltinType::RuntimeError, "builtins has no namespace"))?;
        Ok(Self {
            globals,
            locals,
            builtins,
        })
    }

    fn load_name(&self, name: &str) -> RtResult<Owned> {
        dict_get_str(self.locals, name)
            .or_else(|| dict_get_str(self.globals, name))
            .or_else(|| dict_get_str(self.builtins.raw(), name))
            .ok_or_else(|| {
                err::raise(
                    BuiltinType::NameError,
                    format!("name '{name}' is not defined"),
                )
            })
    }

    fn store_name(&self, name: &str, value: ObjRef) -> RtResult<()> {
        dict_set_str(self.locals, name, value)
    }

    /// Evaluate each element, expanding `*iterable` entries
    fn eval_elements(&self, elts: &[Expr]) -> RtResult<Vec<Owned>> {
        let mut items = Vec::with_capacity(elts.len());
        for elt in elts {
            match elt {
                Expr::Starred(ast::ExprStarred { value, .. }) => {
                    let source = self.eval(value)?;
                    items.extend(iterate(source.raw())?);
                }
                other => items.push(self.eval(other)?),
            }
        }
        Ok(items)
    }

    fn eval(&self, expr: &Expr) -> RtResult<Owned> {
        match expr {
            Expr::Constant(ast::ExprConstant { value, .. }) => constant(value),
            Expr::Name(ast::ExprName { id, .. }) => self.load_name(id.as_str()),
            Expr::Attribute(ast::ExprAttribute { value, attr, .. }) => {
                let target = self.eval(value)?;
                getattr(target.raw(), attr.as_str())
            }
            Expr::Tuple(ast::ExprTuple { elts, .. }) => {
                Ok(objects::new_tuple(self.eval_elements(elts)?))
            }
            Expr::List(ast::ExprList { elts, .. }) => Ok(objects::new_list(self.eval_elements(elts)?)),
            Expr::Dict(ast::ExprDict { keys, values, .. }) => {
                let result = objects::new_dict();
                for (key, value) in keys.iter().zip(values) {
                    let value = self.eval(value)?;
                    match key {
                        Some(key) => {
                            let key = self.eval(key)?;
                            builtins::dict_set_item(result.raw(), key.raw(), value.raw())?;
                        }
                        None => dict_update(result.raw(), value.raw())?,
                    }
                }
                Ok(result)
            }
            Expr::BinOp(ast::ExprBinOp { left, op, right, .. }) => {
                let op = bin_op(op)?;
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                binary_op(op, left.raw(), right.raw())
            }
            Expr::UnaryOp(ast::ExprUnaryOp { op, operand, .. }) => {
                let operand = self.eval(operand)?;
                match op {
                    ast::UnaryOp::Not => Ok(objects::new_bool(!objects::is_truthy(operand.raw()))),
                    ast::UnaryOp::USub => builtins::unary_op(UnaryOp::Neg, operand.raw()),
                    ast::UnaryOp::UAdd => builtins::unary_op(UnaryOp::Pos, operand.raw()),
                    ast::UnaryOp::Invert => builtins::unary_op(UnaryOp::Invert, operand.raw()),
                }
            }
            Expr::BoolOp(ast::ExprBoolOp { op, values, .. }) => {
                let mut last = objects::new_none();
                for value in values {
                    last = self.eval(value)?;
                    let truthy = objects::is_truthy(last.raw());
                    match op {
                        ast::BoolOp::And if !truthy => break,
                        ast::BoolOp::Or if truthy => break,
                        _ => {}
                    }
                }
                Ok(last)
            }
            Expr::Compare(ast::ExprCompare {
                left,
                ops,
                comparators,
                ..
            }) => {
                let mut current = self.eval(left)?;
                for (op, comparator) in ops.iter().zip(comparators) {
                    let next = self.eval(comparator)?;
                    if !compare(cmp_op(op), current.raw(), next.raw())? {
                        return Ok(objects::new_bool(false));
                    }
                    current = next;
                }
                Ok(objects::new_bool(true))
            }
            Expr::Call(ast::ExprCall {
                func,
                args,
                keywords,
                ..
            }) => {
                let callable = self.eval(func)?;
                let positional = self.eval_elements(args)?;

                let mut named: Vec<(String, Owned)> = Vec::with_capacity(keywords.len());
                for keyword in keywords {
                    let value = self.eval(&keyword.value)?;
                    match &keyword.arg {
                        Some(name) => named.push((name.as_str().to_string(), value)),
                        None => {
                            for (key, item) in dict_items(value.raw()).unwrap_or_default() {
                                named.push((expect_str(key.raw(), "keyword")?, item));
                            }
                        }
                    }
                }

                let raw_args: Vec<ObjRef> = positional.iter().map(Owned::raw).collect();
                let raw_kwargs: Vec<(String, ObjRef)> = named
                    .iter()
                    .map(|(name, value)| (name.clone(), value.raw()))
                    .collect();
                builtins::call(callable.raw(), &raw_args, &raw_kwargs)
            }
            Expr::Subscript(ast::ExprSubscript { value, slice, .. }) => {
                if matches!(**slice, Expr::Slice(_)) {
                    return Err(not_supported("slicing"));
                }
                let target = self.eval(value)?;
                let key = self.eval(slice)?;
                builtins::getitem(target.raw(), key.raw())
            }
            Expr::IfExp(ast::ExprIfExp {
                test, body, orelse, ..
            }) => {
                let test = self.eval(test)?;
                if objects::is_truthy(test.raw()) {
                    self.eval(body)
                } else {
                    self.eval(orelse)
                }
            }
            Expr::Lambda(ast::ExprLambda { args, body, .. }) => {
                let body = FunctionBody::Lambda((**body).clone());
                self.make_function("<lambda>", args, body)
            }
            other => Err(not_supported(expr_kind(other))),
        }
    }

    fn make_function(
        &self,
        name: &str,
        arguments: &ast::Arguments,
        body: FunctionBody,
    ) -> RtResult<Owned> {
        if arguments.vararg.is_some() || arguments.kwarg.is_some() || !arguments.kwonlyargs.is_empty() {
            return Err(not_supported("variadic or keyword-only parameters"));
        }

        let mut params = Vec::new();
        let mut defaults = Vec::new();
        for arg in arguments.posonlyargs.iter().chain(&arguments.args) {
            params.push(arg.def.arg.as_str().to_string());
            if let Some(default) = &arg.default {
                defaults.push(self.eval(default)?);
            } else if !defaults.is_empty() {
                return Err(err::raise(
                    BuiltinType::SyntaxError,
                    "non-default argument follows default argument",
                ));
            }
        }

        heap::incref(self.globals);
        let defaults = defaults.into_iter().map(Owned::into_raw).collect();
        Ok(objects::alloc(Payload::Function(UserFunction {
            name: name.to_string(),
            params,
            defaults,
            body: Rc::new(body),
            globals: self.globals,
        })))
    }

    fn assign(&self, target: &Expr, value: ObjRef) -> RtResult<()> {
        match target {
            Expr::Name(ast::ExprName { id, .. }) => self.store_name(id.as_str(), value),
            Expr::Attribute(ast::ExprAttribute {
                value: object,
                attr,
                ..
            }) => {
                let object = self.eval(object)?;
                setattr(object.raw(), attr.as_str(), value)
            }
            Expr::Subscript(ast::ExprSubscript {
                value: object,
                slice,
                ..
            }) => {
                let object = self.eval(object)?;
                let key = self.eval(slice)?;
                builtins::setitem(object.raw(), key.raw(), value)
            }
            Expr::Tuple(ast::ExprTuple { elts, .. }) | Expr::List(ast::ExprList { elts, .. }) => {
                let items = iterate(value)?;
                if items.len() != elts.len() {
                    let message = if items.len() > elts.len() {
                        format!("too many values to unpack (expected {})", elts.len())
                    } else {
                        format!(
                            "not enough values to unpack (expected {}, got {})",
                            elts.len(),
                            items.len()
                        )
                    };
                    return Err(err::raise(BuiltinType::ValueError, message));
                }
                for (elt, item) in elts.iter().zip(&items) {
                    self.assign(elt, item.raw())?;
                }
                Ok(())
            }
            _ => Err(err::raise(
                BuiltinType::SyntaxError,
                "cannot assign to expression",
            )),
        }
    }

    fn exec_block(&self, body: &[Stmt]) -> RtResult<Flow> {
        for stmt in body {
            match self.exec(stmt)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_loop_body(&self, body: &[Stmt]) -> RtResult<Option<Flow>> {
        match self.exec_block(body)? {
            Flow::Break => Ok(None),
            Flow::Return(value) => Ok(Some(Flow::Return(value))),
            Flow::Normal | Flow::Continue => Ok(Some(Flow::Normal)),
        }
    }

    fn exec(&self, stmt: &Stmt) -> RtResult<Flow> {
        match stmt {
            Stmt::Expr(ast::StmtExpr { value, .. }) => {
                self.eval(value)?;
            }
            Stmt::Assign(ast::StmtAssign { targets, value, .. }) => {
                let value = self.eval(value)?;
                for target in targets {
                    self.assign(target, value.raw())?;
                }
            }
            Stmt::AugAssign(ast::StmtAugAssign { target, op, value, .. }) => {
                let op = bin_op(op)?;
                let current = self.eval(target)?;
                let operand = self.eval(value)?;
                let updated = binary_op(op, current.raw(), operand.raw())?;
                self.assign(target, updated.raw())?;
            }
            Stmt::FunctionDef(ast::StmtFunctionDef {
                name,
                args,
                body,
                decorator_list,
                ..
            }) => {
                if !decorator_list.is_empty() {
                    return Err(not_supported("decorators"));
                }
                let function =
                    self.make_function(name.as_str(), args, FunctionBody::Block(body.clone()))?;
                self.store_name(name.as_str(), function.raw())?;
            }
            Stmt::Return(ast::StmtReturn { value, .. }) => {
                let value = match value {
                    Some(value) => self.eval(value)?,
                    None => objects::new_none(),
                };
                return Ok(Flow::Return(value));
            }
            Stmt::Pass(_) => {}
            Stmt::Break(_) => return Ok(Flow::Break),
            Stmt::Continue(_) => return Ok(Flow::Continue),
            Stmt::If(ast::StmtIf {
                test, body, orelse, ..
            }) => {
                let test = self.eval(test)?;
                let branch = if objects::is_truthy(test.raw()) {
                    body
                } else {
                    orelse
                };
                return self.exec_block(branch);
            }
            Stmt::While(ast::StmtWhile {
                test, body, orelse, ..
            }) => {
                loop {
                    let condition = self.eval(test)?;
                    if !objects::is_truthy(condition.raw()) {
                        return self.exec_block(orelse);
                    }
                    match self.exec_loop_body(body)? {
                        None => break,
                        Some(Flow::Normal) => {}
                        Some(flow) => return Ok(flow),
                    }
                }
            }
            Stmt::For(ast::StmtFor {
                target,
                iter,
                body,
                orelse,
                ..
            }) => {
                let source = self.eval(iter)?;
                let mut broke = false;
                for item in iterate(source.raw())? {
                    self.assign(target, item.raw())?;
                    match self.exec_loop_body(body)? {
                        None => {
                            broke = true;
                            break;
                        }
                        Some(Flow::Normal) => {}
                        Some(flow) => return Ok(flow),
                    }
                }
                if !broke {
                    return self.exec_block(orelse);
                }
            }
            Stmt::Import(ast::StmtImport { names, .. }) => {
                for alias in names {
                    let full = alias.name.as_str();
                    let module = import_module(full)?;
                    let bound = alias
                        .asname
                        .as_ref()
                        .map_or_else(|| full.split('.').next().unwrap_or(full), |name| name.as_str());
                    self.store_name(bound, module.raw())?;
                }
            }
            Stmt::ImportFrom(ast::StmtImportFrom { module, names, .. }) => {
                let Some(module_name) = module.as_ref().map(|name| name.as_str()) else {
                    return Err(err::raise(
                        BuiltinType::ImportError,
                        "attempted relative import with no known parent package",
                    ));
                };
                let module = import_module(module_name)?;
                for alias in names {
                    let name = alias.name.as_str();
                    if name == "*" {
                        let namespace = module_dict(module.raw()).ok_or_else(|| {
                            err::raise(BuiltinType::ImportError, "module has no namespace")
                        })?;
                        for (key, value) in dict_items(namespace.raw()).unwrap_or_default() {
                            let key = expect_str(key.raw(), "name")?;
                            if !key.starts_with('_') {
                                self.store_name(&key, value.raw())?;
                            }
                        }
                        continue;
                    }
                    let value = getattr(module.raw(), name).map_err(|_| {
                        err::raise(
                            BuiltinType::ImportError,
                            format!("cannot import name '{name}' from '{module_name}'"),
                        )
                    })?;
                    let bound = alias.asname.as_ref().map_or(name, |alias| alias.as_str());
                    self.store_name(bound, value.raw())?;
                }
            }
            Stmt::Raise(ast::StmtRaise { exc, .. }) => {
                let Some(exc) = exc else {
                    return Err(err::raise(
                        BuiltinType::RuntimeError,
                        "No active exception to reraise",
                    ));
                };
                let exc = self.eval(exc)?;
                return Err(err::raise_object(exc));
            }
            Stmt::Delete(ast::StmtDelete { targets, .. }) => {
                for target in targets {
                    self.delete(target)?;
                }
            }
            other => return Err(not_supported(stmt_kind(other))),
        }
        Ok(Flow::Normal)
    }

    fn delete(&self, target: &Expr) -> RtResult<()> {
        match target {
            Expr::Name(ast::ExprName { id, .. }) => {
                let name = objects::new_str(id.as_str());
                match dict_del_item(self.locals, name.raw())? {
                    Some(_) => Ok(()),
                    None => Err(err::raise(
                        BuiltinType::NameError,
                        format!("name '{}' is not defined", id.as_str()),
                    )),
                }
            }
            Expr::Subscript(ast::ExprSubscript { value, slice, .. }) => {
                let object = self.eval(value)?;
                if objects::type_of(object.raw()) != BuiltinType::Dict {
                    return Err(not_supported("item deletion outside dicts"));
                }
                let key = self.eval(slice)?;
                match dict_del_item(object.raw(), key.raw())? {
                    Some(_) => Ok(()),
                    None => {
                        let shown = builtins::repr(key.raw())?;
                        Err(err::raise(BuiltinType::KeyError, shown))
                    }
                }
            }
            other => Err(not_supported(expr_kind(other))),
        }
    }
}
