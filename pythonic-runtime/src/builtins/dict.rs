//! Dict type - insertion ordered hash map over objects
//!
//! Design: entries keep `(hash, key, value)` in insertion order:
//! - Lookup filters by hash first, then runs Python equality
//! - Equal numbers hash equal across `bool`/`int`/`float`/`complex`
//! - Unhashable keys (`list`, `dict`, `array`) raise `TypeError`

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use num_bigint::BigInt;
use num_traits::FromPrimitive;

use crate::err::{self, RtResult};
use crate::heap::{self, with_interp};
use crate::objects::{self, Args, DictEntry, Int, NativeMethod, ObjRef, Payload};
use crate::refcount::Owned;
use crate::types::BuiltinType;

enum HashInput {
    Int(Int),
    Float(f64),
    Complex(f64, f64),
    Bytes(u8, Vec<u8>),
    Tuple(Vec<ObjRef>),
    Identity,
    Unhashable,
}

fn hash_int(value: &Int, hasher: &mut DefaultHasher) {
    match value {
        Int::Small(v) => v.hash(hasher),
        Int::Big(v) => v.to_signed_bytes_le().hash(hasher),
    }
}

fn hash_float(value: f64, hasher: &mut DefaultHasher) {
    if value.is_finite() && value.fract() == 0.0 {
        if let Some(int) = BigInt::from_f64(value) {
            return hash_int(&Int::from_bigint(int), hasher);
        }
    }
    value.to_bits().hash(hasher);
}

/// `hash(obj)`
pub fn hash_object(obj: ObjRef) -> RtResult<u64> {
    let input = heap::view(obj, |payload| match payload {
        Payload::None => HashInput::Identity,
        Payload::Bool(value) => HashInput::Int(Int::Small(i64::from(*value))),
        Payload::Int(value) => HashInput::Int(value.clone()),
        Payload::Float(value) => HashInput::Float(*value),
        Payload::Complex(value) => HashInput::Complex(value.re, value.im),
        Payload::Str(bytes) => HashInput::Bytes(b's', bytes.clone()),
        Payload::Bytes(bytes) => HashInput::Bytes(b'b', bytes.clone()),
        Payload::Tuple(items) => HashInput::Tuple(items.clone()),
        Payload::List(_) | Payload::Dict(_) | Payload::Array(_) => HashInput::Unhashable,
        _ => HashInput::Identity,
    });

    let mut hasher = DefaultHasher::new();
    match input {
        HashInput::Int(value) => hash_int(&value, &mut hasher),
        HashInput::Float(value) => hash_float(value, &mut hasher),
        HashInput::Complex(re, im) if im == 0.0 => hash_float(re, &mut hasher),
        HashInput::Complex(re, im) => {
            re.to_bits().hash(&mut hasher);
            im.to_bits().hash(&mut hasher);
        }
        HashInput::Bytes(tag, bytes) => {
            tag.hash(&mut hasher);
            bytes.hash(&mut hasher);
        }
        HashInput::Tuple(items) => {
            b't'.hash(&mut hasher);
            for item in items {
                hash_object(item)?.hash(&mut hasher);
            }
        }
        HashInput::Identity => obj.hash(&mut hasher),
        HashInput::Unhashable => {
            return Err(err::raise(
                BuiltinType::TypeError,
                format!("unhashable type: '{}'", objects::type_name(obj)),
            ))
        }
    }
    Ok(hasher.finish())
}

enum EqInput {
    Number,
    Text(u8, Vec<u8>),
    Seq(bool, Vec<ObjRef>),
    Dict(Vec<(ObjRef, ObjRef)>),
    Other,
}

fn eq_input(obj: ObjRef) -> EqInput {
    heap::view(obj, |payload| match payload {
        Payload::Bool(_) | Payload::Int(_) | Payload::Float(_) | Payload::Complex(_) => {
            EqInput::Number
        }
        Payload::Str(bytes) => EqInput::Text(b's', bytes.clone()),
        Payload::Bytes(bytes) => EqInput::Text(b'b', bytes.clone()),
        Payload::Tuple(items) => EqInput::Seq(true, items.clone()),
        Payload::List(items) => EqInput::Seq(false, items.clone()),
        Payload::Dict(dict) => EqInput::Dict(
            dict.entries
                .iter()
                .map(|entry| (entry.key, entry.value))
                .collect(),
        ),
        _ => EqInput::Other,
    })
}

/// Python `==`
pub fn objects_equal(a: ObjRef, b: ObjRef) -> RtResult<bool> {
    if a == b {
        return Ok(true);
    }

    match (eq_input(a), eq_input(b)) {
        (EqInput::Number, EqInput::Number) => {
            if let (Some(x), Some(y)) = (exact_int(a), exact_int(b)) {
                return Ok(x == y);
            }
            Ok(objects::as_number(a) == objects::as_number(b) && objects::as_number(a).is_some())
        }
        (EqInput::Text(ta, x), EqInput::Text(tb, y)) => Ok(ta == tb && x == y),
        (EqInput::Seq(ka, x), EqInput::Seq(kb, y)) => {
            if ka != kb || x.len() != y.len() {
                return Ok(false);
            }
            for (p, q) in x.into_iter().zip(y) {
                if !objects_equal(p, q)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        (EqInput::Dict(x), EqInput::Dict(y)) => {
            if x.len() != y.len() {
                return Ok(false);
            }
            for (key, value) in x {
                match dict_get_item(b, key)? {
                    Some(other) if objects_equal(value, other.raw())? => {}
                    _ => return Ok(false),
                }
            }
            Ok(true)
        }
        _ => Ok(false),
    }
}

fn exact_int(obj: ObjRef) -> Option<BigInt> {
    objects::as_int(obj).map(|value| value.to_bigint())
}

/// Index of the entry equal to `key`, if any
fn find_entry(dict: ObjRef, key: ObjRef, hash: u64) -> RtResult<Option<usize>> {
    let candidates: Vec<(usize, ObjRef)> = heap::view(dict, |payload| match payload {
        Payload::Dict(data) => data
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.hash == hash)
            .map(|(index, entry)| (index, entry.key))
            .collect(),
        _ => Vec::new(),
    });

    for (index, candidate) in candidates {
        if objects_equal(candidate, key)? {
            return Ok(Some(index));
        }
    }
    Ok(None)
}

fn expect_dict(dict: ObjRef) -> RtResult<()> {
    if objects::type_of(dict) == BuiltinType::Dict {
        Ok(())
    } else {
        Err(err::raise(
            BuiltinType::TypeError,
            format!("expected dict, got {}", objects::type_name(dict)),
        ))
    }
}

/// `dict[key] = value`
pub fn dict_set_item(dict: ObjRef, key: ObjRef, value: ObjRef) -> RtResult<()> {
    expect_dict(dict)?;
    let hash = hash_object(key)?;
    let found = find_entry(dict, key, hash)?;

    with_interp(|interp| {
        interp.incref(value);
        let old = match interp.payload_mut(dict) {
            Payload::Dict(data) => match found {
                Some(index) => Some(std::mem::replace(&mut data.entries[index].value, value)),
                None => {
                    data.entries.push(DictEntry { hash, key, value });
                    None
                }
            },
            _ => None,
        };
        match old {
            Some(old) => interp.decref(old),
            None => interp.incref(key),
        }
    });
    Ok(())
}

/// `dict.get(key)` as a new reference
pub fn dict_get_item(dict: ObjRef, key: ObjRef) -> RtResult<Option<Owned>> {
    expect_dict(dict)?;
    let hash = hash_object(key)?;
    let Some(index) = find_entry(dict, key, hash)? else {
        return Ok(None);
    };
    let value = heap::view(dict, |payload| match payload {
        Payload::Dict(data) => data.entries.get(index).map(|entry| entry.value),
        _ => None,
    });
    Ok(value.map(Owned::from_borrowed))
}

/// Remove `key`, returning its value
pub(crate) fn dict_del_item(dict: ObjRef, key: ObjRef) -> RtResult<Option<Owned>> {
    expect_dict(dict)?;
    let hash = hash_object(key)?;
    let Some(index) = find_entry(dict, key, hash)? else {
        return Ok(None);
    };
    let removed = with_interp(|interp| match interp.payload_mut(dict) {
        Payload::Dict(data) => Some(data.entries.remove(index)),
        _ => None,
    });
    Ok(removed.map(|entry| {
        heap::decref(entry.key);
        Owned::from_raw(entry.value)
    }))
}

/// Look up a str key (namespace access)
pub fn dict_get_str(dict: ObjRef, key: &str) -> Option<Owned> {
    let key = objects::new_str(key);
    match dict_get_item(dict, key.raw()) {
        Ok(value) => value,
        Err(_) => {
            err::clear();
            None
        }
    }
}

/// Store under a str key (namespace access)
pub fn dict_set_str(dict: ObjRef, key: &str, value: ObjRef) -> RtResult<()> {
    let key = objects::new_str(key);
    dict_set_item(dict, key.raw(), value)
}

/// New references to every `(key, value)` pair, in insertion order
pub fn dict_items(dict: ObjRef) -> Option<Vec<(Owned, Owned)>> {
    let raw = with_interp(|interp| {
        let pairs: Vec<(ObjRef, ObjRef)> = match interp.payload(dict) {
            Payload::Dict(data) => data
                .entries
                .iter()
                .map(|entry| (entry.key, entry.value))
                .collect(),
            _ => return None,
        };
        for (key, value) in &pairs {
            interp.incref(*key);
            interp.incref(*value);
        }
        Some(pairs)
    })?;
    Some(
        raw.into_iter()
            .map(|(key, value)| (Owned::from_raw(key), Owned::from_raw(value)))
            .collect(),
    )
}

pub fn dict_len(dict: ObjRef) -> Option<usize> {
    heap::view(dict, |payload| match payload {
        Payload::Dict(data) => Some(data.entries.len()),
        _ => None,
    })
}

/// Fill `dict` from a mapping or an iterable of pairs
pub(crate) fn dict_update(dict: ObjRef, source: ObjRef) -> RtResult<()> {
    if let Some(items) = dict_items(source) {
        for (key, value) in items {
            dict_set_item(dict, key.raw(), value.raw())?;
        }
        return Ok(());
    }

    for (index, item) in super::iterate(source)?.into_iter().enumerate() {
        let pair = super::iterate(item.raw())?;
        if pair.len() != 2 {
            return Err(err::raise(
                BuiltinType::ValueError,
                format!(
                    "dictionary update sequence element #{index} has length {}; 2 is required",
                    pair.len()
                ),
            ));
        }
        dict_set_item(dict, pair[0].raw(), pair[1].raw())?;
    }
    Ok(())
}

fn dict_keys(receiver: ObjRef, args: Args<'_>) -> RtResult<Owned> {
    args.check_count("keys", 0, 0)?;
    let items = dict_items(receiver).unwrap_or_default();
    Ok(objects::new_list(items.into_iter().map(|(key, _)| key).collect()))
}

fn dict_values(receiver: ObjRef, args: Args<'_>) -> RtResult<Owned> {
    args.check_count("values", 0, 0)?;
    let items = dict_items(receiver).unwrap_or_default();
    Ok(objects::new_list(items.into_iter().map(|(_, value)| value).collect()))
}

fn dict_items_method(receiver: ObjRef, args: Args<'_>) -> RtResult<Owned> {
    args.check_count("items", 0, 0)?;
    let items = dict_items(receiver).unwrap_or_default();
    Ok(objects::new_list(
        items
            .into_iter()
            .map(|(key, value)| objects::new_tuple(vec![key, value]))
            .collect(),
    ))
}

fn dict_get(receiver: ObjRef, args: Args<'_>) -> RtResult<Owned> {
    args.check_count("get", 1, 2)?;
    match dict_get_item(receiver, args.positional[0])? {
        Some(value) => Ok(value),
        None => Ok(args
            .get(1)
            .map(Owned::from_borrowed)
            .unwrap_or_else(objects::new_none)),
    }
}

fn dict_update_method(receiver: ObjRef, args: Args<'_>) -> RtResult<Owned> {
    args.check_count("update", 0, 1)?;
    if let Some(source) = args.get(0) {
        dict_update(receiver, source)?;
    }
    for (key, value) in args.keywords {
        dict_set_str(receiver, key, *value)?;
    }
    Ok(objects::new_none())
}

pub(super) const DICT_METHODS: &[(&str, NativeMethod)] = &[
    ("keys", dict_keys),
    ("values", dict_values),
    ("items", dict_items_method),
    ("get", dict_get),
    ("update", dict_update_method),
];
