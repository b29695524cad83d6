//! Builtin functions exposed through the `builtins` module

use std::io::Write;

use crate::builtins::{attr, modules, numbers, sequence, string};
use crate::err::{self, RtResult};
use crate::objects::{self, Args, NativeFn, ObjRef};
use crate::refcount::Owned;
use crate::types::BuiltinType;

fn builtin_len(args: Args<'_>) -> RtResult<Owned> {
    args.check_count("len", 1, 1)?;
    let length = sequence::len(args.positional[0])?;
    Ok(objects::new_int_u64(length as u64))
}

fn builtin_repr(args: Args<'_>) -> RtResult<Owned> {
    args.check_count("repr", 1, 1)?;
    Ok(objects::new_str(&string::repr(args.positional[0])?))
}

fn class_matches(obj: ObjRef, classinfo: ObjRef) -> RtResult<bool> {
    if let Some(ty) = BuiltinType::from_type_object(classinfo) {
        return Ok(objects::isinstance(obj, ty));
    }
    if objects::type_of(classinfo) == BuiltinType::Tuple {
        for candidate in objects::sequence_items(classinfo).unwrap_or_default() {
            if class_matches(obj, candidate.raw())? {
                return Ok(true);
            }
        }
        return Ok(false);
    }
    Err(err::raise(
        BuiltinType::TypeError,
        "isinstance() arg 2 must be a type or tuple of types",
    ))
}

fn builtin_isinstance(args: Args<'_>) -> RtResult<Owned> {
    args.check_count("isinstance", 2, 2)?;
    let matched = class_matches(args.positional[0], args.positional[1])?;
    Ok(objects::new_bool(matched))
}

fn builtin_callable(args: Args<'_>) -> RtResult<Owned> {
    args.check_count("callable", 1, 1)?;
    Ok(objects::new_bool(objects::is_callable(args.positional[0])))
}

/// `zip(*iterables)`, materialized as a list of tuples
fn builtin_zip(args: Args<'_>) -> RtResult<Owned> {
    args.no_keywords("zip")?;
    let columns = args
        .positional
        .iter()
        .map(|source| sequence::iterate(*source))
        .collect::<RtResult<Vec<_>>>()?;
    let rows = columns.iter().map(Vec::len).min().unwrap_or(0);

    let zipped = (0..rows)
        .map(|row| objects::new_tuple(columns.iter().map(|column| column[row].clone()).collect()))
        .collect();
    Ok(objects::new_list(zipped))
}

/// `range(stop)` / `range(start, stop[, step])`, materialized as a list
fn builtin_range(args: Args<'_>) -> RtResult<Owned> {
    args.check_count("range", 1, 3)?;
    let values = args
        .positional
        .iter()
        .map(|value| numbers::expect_index(*value, "range() argument"))
        .collect::<RtResult<Vec<_>>>()?;
    let (start, stop, step) = match values.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => unreachable!("argument count checked"),
    };
    if step == 0 {
        return Err(err::raise(
            BuiltinType::ValueError,
            "range() arg 3 must not be zero",
        ));
    }

    let mut items = Vec::new();
    let mut current = start;
    while (step > 0 && current < stop) || (step < 0 && current > stop) {
        items.push(objects::new_int_i64(current));
        current += step;
    }
    Ok(objects::new_list(items))
}

fn builtin_chr(args: Args<'_>) -> RtResult<Owned> {
    args.check_count("chr", 1, 1)?;
    let cp = numbers::expect_index(args.positional[0], "chr() argument")?;
    let cp = u32::try_from(cp)
        .ok()
        .filter(|cp| *cp <= 0x10FFFF)
        .ok_or_else(|| err::raise(BuiltinType::ValueError, "chr() arg not in range(0x110000)"))?;
    let mut buf = Vec::with_capacity(4);
    string::push_code_point(&mut buf, cp);
    Ok(objects::new_str_wtf8(buf))
}

fn builtin_ord(args: Args<'_>) -> RtResult<Owned> {
    args.check_count("ord", 1, 1)?;
    let value = args.positional[0];
    let cps = match objects::str_wtf8(value) {
        Some(text) => string::decode_wtf8(&text),
        None => match objects::bytes_data(value) {
            Some(bytes) => bytes.into_iter().map(u32::from).collect(),
            None => {
                return Err(err::raise(
                    BuiltinType::TypeError,
                    format!(
                        "ord() expected string of length 1, but {} found",
                        objects::type_name(value)
                    ),
                ))
            }
        },
    };
    match cps.as_slice() {
        [cp] => Ok(objects::new_int_i64(i64::from(*cp))),
        _ => Err(err::raise(
            BuiltinType::TypeError,
            format!(
                "ord() expected a character, but string of length {} found",
                cps.len()
            ),
        )),
    }
}

fn builtin_abs(args: Args<'_>) -> RtResult<Owned> {
    args.check_count("abs", 1, 1)?;
    numbers::absolute(args.positional[0])
}

fn builtin_id(args: Args<'_>) -> RtResult<Owned> {
    args.check_count("id", 1, 1)?;
    Ok(objects::new_int_u64(args.positional[0].id()))
}

fn builtin_getattr(args: Args<'_>) -> RtResult<Owned> {
    args.check_count("getattr", 2, 3)?;
    let name = string::expect_str(args.positional[1], "attribute name")?;
    match (attr::getattr(args.positional[0], &name), args.get(2)) {
        (Ok(value), _) => Ok(value),
        (Err(_), Some(default)) if err::pending_matches(BuiltinType::AttributeError) => {
            err::clear();
            Ok(Owned::from_borrowed(default))
        }
        (Err(pending), _) => Err(pending),
    }
}

fn builtin_hasattr(args: Args<'_>) -> RtResult<Owned> {
    args.check_count("hasattr", 2, 2)?;
    let name = string::expect_str(args.positional[1], "attribute name")?;
    Ok(objects::new_bool(attr::hasattr(args.positional[0], &name)))
}

fn builtin_import(args: Args<'_>) -> RtResult<Owned> {
    args.check_count("__import__", 1, 5)?;
    let name = string::expect_str(args.positional[0], "module name")?;
    modules::import_module(&name)
}

fn builtin_print(args: Args<'_>) -> RtResult<Owned> {
    let sep = match args.keyword("sep") {
        Some(sep) if !objects::is_none(sep) => string::expect_str(sep, "sep")?,
        _ => " ".to_string(),
    };
    let end = match args.keyword("end") {
        Some(end) if !objects::is_none(end) => string::expect_str(end, "end")?,
        _ => "\n".to_string(),
    };

    let parts = args
        .positional
        .iter()
        .map(|value| string::to_str(*value))
        .collect::<RtResult<Vec<_>>>()?;

    let mut stdout = std::io::stdout().lock();
    let _ = write!(stdout, "{}{}", parts.join(&sep), end);
    let _ = stdout.flush();
    Ok(objects::new_none())
}

/// Every function installed in the `builtins` module
pub(super) const BUILTIN_FUNCTIONS: &[(&str, NativeFn)] = &[
    ("len", builtin_len),
    ("repr", builtin_repr),
    ("isinstance", builtin_isinstance),
    ("callable", builtin_callable),
    ("zip", builtin_zip),
    ("range", builtin_range),
    ("chr", builtin_chr),
    ("ord", builtin_ord),
    ("abs", builtin_abs),
    ("id", builtin_id),
    ("getattr", builtin_getattr),
    ("hasattr", builtin_hasattr),
    ("__import__", builtin_import),
    ("print", builtin_print),
];
