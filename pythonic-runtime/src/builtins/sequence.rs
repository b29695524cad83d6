//! Sequence protocol - `len`, iteration, indexing and membership
//!
//! Iteration materializes the items eagerly; every container in this runtime
//! is finite and in memory.

use crate::builtins::{array, dict, string};
use crate::err::{self, RtResult};
use crate::heap::{self, with_interp};
use crate::objects::{self, Args, NativeMethod, ObjRef, Payload};
use crate::refcount::Owned;
use crate::types::BuiltinType;

/// `len(obj)`
pub fn len(obj: ObjRef) -> RtResult<usize> {
    let length = heap::view(obj, |payload| match payload {
        Payload::Str(bytes) => Some(string::decode_wtf8(bytes).len()),
        Payload::Bytes(bytes) => Some(bytes.len()),
        Payload::Tuple(items) | Payload::List(items) => Some(items.len()),
        Payload::Dict(data) => Some(data.entries.len()),
        Payload::Array(data) => data.shape.first().copied(),
        _ => None,
    });
    length.ok_or_else(|| {
        err::raise(
            BuiltinType::TypeError,
            format!("object of type '{}' has no len()", objects::type_name(obj)),
        )
    })
}

/// New references to the items `for x in obj` would produce
pub fn iterate(obj: ObjRef) -> RtResult<Vec<Owned>> {
    if let Some(items) = objects::sequence_items(obj) {
        return Ok(items);
    }
    if let Some(items) = dict::dict_items(obj) {
        return Ok(items.into_iter().map(|(key, _)| key).collect());
    }
    if let Some(text) = objects::str_wtf8(obj) {
        return Ok(string::decode_wtf8(&text)
            .into_iter()
            .map(|cp| {
                let mut buf = Vec::with_capacity(4);
                string::push_code_point(&mut buf, cp);
                objects::new_str_wtf8(buf)
            })
            .collect());
    }
    if let Some(bytes) = objects::bytes_data(obj) {
        return Ok(bytes
            .into_iter()
            .map(|b| objects::new_int_i64(i64::from(b)))
            .collect());
    }
    if objects::type_of(obj) == BuiltinType::Array {
        return array::iterate(obj);
    }
    Err(err::raise(
        BuiltinType::TypeError,
        format!("'{}' object is not iterable", objects::type_name(obj)),
    ))
}

/// Resolve a possibly negative index against `length`
fn normalize_index(index: i64, length: usize, kind: &str) -> RtResult<usize> {
    let length = length as i64;
    let resolved = if index < 0 { index + length } else { index };
    if resolved < 0 || resolved >= length {
        return Err(err::raise(
            BuiltinType::IndexError,
            format!("{kind} index out of range"),
        ));
    }
    Ok(resolved as usize)
}

/// `obj[key]`
pub fn getitem(obj: ObjRef, key: ObjRef) -> RtResult<Owned> {
    match objects::type_of(obj) {
        BuiltinType::Dict => match dict::dict_get_item(obj, key)? {
            Some(value) => Ok(value),
            None => {
                let shown = string::repr(key)?;
                Err(err::raise(BuiltinType::KeyError, shown))
            }
        },
        BuiltinType::Tuple | BuiltinType::List => {
            let index = super::numbers::expect_index(key, "sequence index")?;
            let kind = objects::type_name(obj);
            let items = objects::sequence_items(obj).unwrap_or_default();
            let position = normalize_index(index, items.len(), kind)?;
            Ok(items[position].clone())
        }
        BuiltinType::Str => {
            let index = super::numbers::expect_index(key, "string index")?;
            let cps = string::decode_wtf8(&objects::str_wtf8(obj).unwrap_or_default());
            let position = normalize_index(index, cps.len(), "string")?;
            let mut buf = Vec::with_capacity(4);
            string::push_code_point(&mut buf, cps[position]);
            Ok(objects::new_str_wtf8(buf))
        }
        BuiltinType::Bytes => {
            let index = super::numbers::expect_index(key, "byte index")?;
            let bytes = objects::bytes_data(obj).unwrap_or_default();
            let position = normalize_index(index, bytes.len(), "index")?;
            Ok(objects::new_int_i64(i64::from(bytes[position])))
        }
        BuiltinType::Array => {
            let index = super::numbers::expect_index(key, "array index")?;
            let length = len(obj)?;
            let position = normalize_index(index, length, "array")?;
            array::item(obj, position)
        }
        _ => Err(err::raise(
            BuiltinType::TypeError,
            format!("'{}' object is not subscriptable", objects::type_name(obj)),
        )),
    }
}

/// `obj[key] = value`
pub fn setitem(obj: ObjRef, key: ObjRef, value: ObjRef) -> RtResult<()> {
    match objects::type_of(obj) {
        BuiltinType::Dict => dict::dict_set_item(obj, key, value),
        BuiltinType::List => {
            let index = super::numbers::expect_index(key, "list index")?;
            let length = len(obj)?;
            let position = normalize_index(index, length, "list assignment")?;
            with_interp(|interp| {
                interp.incref(value);
                let old = match interp.payload_mut(obj) {
                    Payload::List(items) => Some(std::mem::replace(&mut items[position], value)),
                    _ => None,
                };
                if let Some(old) = old {
                    interp.decref(old);
                }
            });
            Ok(())
        }
        BuiltinType::Array => {
            let index = super::numbers::expect_index(key, "array index")?;
            let length = len(obj)?;
            let position = normalize_index(index, length, "array assignment")?;
            array::set_item(obj, position, value)
        }
        _ => Err(err::raise(
            BuiltinType::TypeError,
            format!(
                "'{}' object does not support item assignment",
                objects::type_name(obj)
            ),
        )),
    }
}

/// `item in container`
pub fn contains(container: ObjRef, item: ObjRef) -> RtResult<bool> {
    match objects::type_of(container) {
        BuiltinType::Dict => Ok(dict::dict_get_item(container, item)?.is_some()),
        BuiltinType::Str => {
            let needle = objects::str_wtf8(item).ok_or_else(|| {
                err::raise(
                    BuiltinType::TypeError,
                    format!(
                        "'in <string>' requires string as left operand, not {}",
                        objects::type_name(item)
                    ),
                )
            })?;
            let haystack = objects::str_wtf8(container).unwrap_or_default();
            Ok(needle.is_empty() || haystack.windows(needle.len()).any(|w| w == needle))
        }
        _ => {
            for candidate in iterate(container)? {
                if dict::objects_equal(candidate.raw(), item)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
    }
}

fn list_append(receiver: ObjRef, args: Args<'_>) -> RtResult<Owned> {
    args.check_count("append", 1, 1)?;
    let item = args.positional[0];
    with_interp(|interp| {
        interp.incref(item);
        if let Payload::List(items) = interp.payload_mut(receiver) {
            items.push(item);
        }
    });
    Ok(objects::new_none())
}

fn list_extend(receiver: ObjRef, args: Args<'_>) -> RtResult<Owned> {
    args.check_count("extend", 1, 1)?;
    let new_items = iterate(args.positional[0])?;
    with_interp(|interp| {
        if let Payload::List(items) = interp.payload_mut(receiver) {
            items.extend(new_items.into_iter().map(Owned::into_raw));
        }
    });
    Ok(objects::new_none())
}

fn list_pop(receiver: ObjRef, args: Args<'_>) -> RtResult<Owned> {
    args.check_count("pop", 0, 1)?;
    let length = len(receiver)?;
    if length == 0 {
        return Err(err::raise(BuiltinType::IndexError, "pop from empty list"));
    }
    let index = match args.get(0) {
        Some(index) => super::numbers::expect_index(index, "pop index")?,
        None => -1,
    };
    let position = normalize_index(index, length, "pop")?;
    let removed = with_interp(|interp| match interp.payload_mut(receiver) {
        Payload::List(items) => Some(items.remove(position)),
        _ => None,
    });
    Ok(removed.map(Owned::from_raw).unwrap_or_else(objects::new_none))
}

fn tuple_count(receiver: ObjRef, args: Args<'_>) -> RtResult<Owned> {
    args.check_count("count", 1, 1)?;
    let mut count = 0;
    for item in iterate(receiver)? {
        if dict::objects_equal(item.raw(), args.positional[0])? {
            count += 1;
        }
    }
    Ok(objects::new_int_i64(count))
}

fn tuple_index(receiver: ObjRef, args: Args<'_>) -> RtResult<Owned> {
    args.check_count("index", 1, 1)?;
    for (position, item) in iterate(receiver)?.iter().enumerate() {
        if dict::objects_equal(item.raw(), args.positional[0])? {
            return Ok(objects::new_int_i64(position as i64));
        }
    }
    Err(err::raise(BuiltinType::ValueError, "value is not in sequence"))
}

pub(super) const LIST_METHODS: &[(&str, NativeMethod)] = &[
    ("append", list_append),
    ("extend", list_extend),
    ("pop", list_pop),
    ("count", tuple_count),
    ("index", tuple_index),
];

pub(super) const TUPLE_METHODS: &[(&str, NativeMethod)] =
    &[("count", tuple_count), ("index", tuple_index)];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_len_and_index() {
        let list = objects::new_list(vec![objects::new_int_i64(10), objects::new_int_i64(20)]);
        assert_eq!(len(list.raw()).unwrap(), 2);

        let last = getitem(list.raw(), objects::new_int_i64(-1).raw()).unwrap();
        assert_eq!(objects::as_int(last.raw()), Some(objects::Int::Small(20)));

        assert!(getitem(list.raw(), objects::new_int_i64(2).raw()).is_err());
        assert!(err::pending_matches(BuiltinType::IndexError));
        err::clear();
    }

    #[test]
    fn test_str_len_counts_code_points() {
        let text = objects::new_str("héllo");
        assert_eq!(len(text.raw()).unwrap(), 5);
        let chars = iterate(text.raw()).unwrap();
        assert_eq!(objects::str_wtf8(chars[1].raw()).unwrap(), "é".as_bytes());
    }

    #[test]
    fn test_setitem_list_releases_old() {
        let old = objects::new_float(1.0);
        let list = objects::new_list(vec![old.clone()]);
        let new = objects::new_float(2.0);
        setitem(list.raw(), objects::new_int_i64(0).raw(), new.raw()).unwrap();
        assert_eq!(heap::refcount(old.raw()), 1);
        assert_eq!(heap::refcount(new.raw()), 2);
    }

    #[test]
    fn test_contains() {
        let text = objects::new_str("hello");
        assert!(contains(text.raw(), objects::new_str("ell").raw()).unwrap());
        let tuple = objects::new_tuple(vec![objects::new_int_i64(3)]);
        assert!(contains(tuple.raw(), objects::new_float(3.0).raw()).unwrap());
        assert!(!contains(tuple.raw(), objects::new_int_i64(4).raw()).unwrap());
    }

    #[test]
    fn test_not_iterable() {
        assert!(iterate(objects::new_float(1.0).raw()).is_err());
        assert!(err::pending_matches(BuiltinType::TypeError));
        err::clear();
    }
}
