//! Pending exception state
//!
//! Fallible runtime calls return `RtResult<T>`. The `Err` side carries no
//! data: the exception itself is parked in the thread's interpreter state
//! until someone fetches, prints or clears it.

use std::io::Write;

use crate::heap::{self, with_interp, RawPending};
use crate::logging::log_raise;
use crate::objects::{self, ExceptionData, ObjRef, Payload, SyntaxDetail};
use crate::refcount::Owned;
use crate::types::BuiltinType;

/// Marker: an exception is now pending on this thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct Pending(());

pub type RtResult<T> = Result<T, Pending>;

/// A fetched exception triple
#[derive(Debug)]
pub struct PendingError {
    pub ptype: Owned,
    pub pvalue: Option<Owned>,
    pub ptraceback: Option<Owned>,
}

/// Build an exception instance of class `kind`
pub fn new_exception(kind: BuiltinType, args: Vec<Owned>) -> Owned {
    objects::alloc_with(args, |args| {
        Payload::Exception(ExceptionData {
            class: kind,
            args,
            detail: None,
        })
    })
}

/// Build a `SyntaxError` carrying location details
pub fn new_syntax_error(message: &str, detail: SyntaxDetail) -> Owned {
    let args = vec![objects::new_str(message)];
    objects::alloc_with(args, |args| {
        Payload::Exception(ExceptionData {
            class: BuiltinType::SyntaxError,
            args,
            detail: Some(detail),
        })
    })
}

/// Raise `kind(message)`
pub fn raise(kind: BuiltinType, message: impl Into<String>) -> Pending {
    let message = message.into();
    log_raise(kind.name(), &message);
    let value = new_exception(kind, vec![objects::new_str(&message)]);
    set_pending(Owned::from_raw(kind.type_object()), Some(value))
}

/// Raise an exception instance, or instantiate and raise an exception class
pub fn raise_object(exc: Owned) -> Pending {
    if let Some(kind) = exception_class(exc.raw()) {
        log_raise(kind.name(), "");
        return set_pending(Owned::from_raw(kind.type_object()), Some(exc));
    }
    if let Some(kind) = BuiltinType::from_type_object(exc.raw()).filter(|ty| ty.is_exception()) {
        return set_pending(Owned::from_raw(kind.type_object()), None);
    }
    raise(
        BuiltinType::TypeError,
        "exceptions must derive from BaseException",
    )
}

/// Replace the pending exception with `SyntaxError`
pub fn raise_syntax_error(message: &str, detail: SyntaxDetail) -> Pending {
    log_raise("SyntaxError", message);
    let value = new_syntax_error(message, detail);
    set_pending(
        Owned::from_raw(BuiltinType::SyntaxError.type_object()),
        Some(value),
    )
}

fn set_pending(ptype: Owned, pvalue: Option<Owned>) -> Pending {
    restore(PendingError {
        ptype,
        pvalue,
        ptraceback: None,
    });
    Pending(())
}

/// Whether an exception is pending
pub fn occurred() -> bool {
    with_interp(|interp| interp.pending.is_some())
}

/// Whether the pending exception is an instance of `kind`
pub fn pending_matches(kind: BuiltinType) -> bool {
    let ptype = with_interp(|interp| interp.pending.map(|pending| pending.ptype));
    ptype
        .and_then(BuiltinType::from_type_object)
        .map_or(false, |ty| ty.is_subtype(kind))
}

/// Take the pending exception out of the thread state
pub fn fetch() -> Option<PendingError> {
    let raw = with_interp(|interp| interp.pending.take())?;
    Some(PendingError {
        ptype: Owned::from_raw(raw.ptype),
        pvalue: raw.pvalue.map(Owned::from_raw),
        ptraceback: raw.ptraceback.map(Owned::from_raw),
    })
}

/// Put an exception back as the pending one, replacing any current one
pub fn restore(error: PendingError) {
    let raw = RawPending {
        ptype: error.ptype.into_raw(),
        pvalue: error.pvalue.map(Owned::into_raw),
        ptraceback: error.ptraceback.map(Owned::into_raw),
    };
    let previous = with_interp(|interp| interp.pending.replace(raw));
    if let Some(previous) = previous {
        release_raw(previous);
    }
}

/// Drop the pending exception, if any
pub fn clear() {
    if let Some(previous) = with_interp(|interp| interp.pending.take()) {
        release_raw(previous);
    }
}

fn release_raw(raw: RawPending) {
    heap::decref(raw.ptype);
    if let Some(value) = raw.pvalue {
        heap::decref(value);
    }
    if let Some(traceback) = raw.ptraceback {
        heap::decref(traceback);
    }
}

/// Make sure `pvalue` is an instance of `ptype`
pub fn normalize(error: &mut PendingError) {
    let kind = BuiltinType::from_type_object(error.ptype.raw())
        .filter(|ty| ty.is_exception())
        .unwrap_or(BuiltinType::Exception);

    let needs_instance = match &error.pvalue {
        Some(value) => exception_class(value.raw()).is_none(),
        None => true,
    };
    if needs_instance {
        let args = match error.pvalue.take() {
            Some(value) if !objects::is_none(value.raw()) => vec![value],
            _ => Vec::new(),
        };
        error.pvalue = Some(new_exception(kind, args));
    }
}

/// Class of an exception instance
pub fn exception_class(obj: ObjRef) -> Option<BuiltinType> {
    heap::view(obj, |payload| match payload {
        Payload::Exception(exc) => Some(exc.class),
        _ => None,
    })
}

/// New references to an exception's `args`
pub fn exception_args(obj: ObjRef) -> Option<Vec<Owned>> {
    let args = heap::view(obj, |payload| match payload {
        Payload::Exception(exc) => Some(exc.args.clone()),
        _ => None,
    })?;
    Some(args.into_iter().map(Owned::from_borrowed).collect())
}

/// `str(exc)`: the single argument, nothing, or the args tuple
pub fn exception_message(obj: ObjRef) -> RtResult<String> {
    let args = exception_args(obj).unwrap_or_default();
    match args.as_slice() {
        [] => Ok(String::new()),
        [single] => crate::builtins::to_str(single.raw()),
        _ => crate::builtins::repr(objects::new_tuple(args).raw()),
    }
}

fn syntax_detail(obj: ObjRef) -> Option<SyntaxDetail> {
    heap::view(obj, |payload| match payload {
        Payload::Exception(exc) => exc.detail.clone(),
        _ => None,
    })
}

/// `traceback.format_exception_only(ptype, pvalue)`
///
/// Each entry ends with a newline; the `Type: message` line is always last.
pub fn format_exception_only(ptype: ObjRef, pvalue: Option<ObjRef>) -> RtResult<Vec<String>> {
    let kind = match BuiltinType::from_type_object(ptype) {
        Some(kind) if kind.is_exception() => kind,
        _ => {
            return Err(raise(
                BuiltinType::TypeError,
                "format_exception_only() expects an exception type",
            ))
        }
    };

    let mut lines = Vec::new();
    let message = match pvalue {
        Some(value) if exception_class(value).is_some() => {
            if let Some(detail) = syntax_detail(value) {
                lines.push(format!("  File \"{}\", line {}\n", detail.filename, detail.lineno));
                if !detail.text.is_empty() {
                    lines.push(format!("    {}\n", detail.text));
                    lines.push(format!("    {}^\n", " ".repeat(detail.offset.saturating_sub(1))));
                }
            }
            exception_message(value)?
        }
        Some(value) if !objects::is_none(value) => crate::builtins::to_str(value)?,
        _ => String::new(),
    };

    if message.is_empty() {
        lines.push(format!("{}\n", kind.name()));
    } else {
        lines.push(format!("{}: {}\n", kind.name(), message));
    }
    Ok(lines)
}

/// Print the pending exception with its traceback header and clear it
pub fn print_to(out: &mut dyn Write) {
    let Some(mut error) = fetch() else {
        return;
    };
    normalize(&mut error);

    let pvalue = error.pvalue.as_ref().map(Owned::raw);
    let lines = match format_exception_only(error.ptype.raw(), pvalue) {
        Ok(lines) => lines,
        Err(_) => {
            clear();
            vec![format!("{}\n", objects::type_name(error.ptype.raw()))]
        }
    };

    let _ = writeln!(out, "Traceback (most recent call last):");
    for line in lines {
        let _ = write!(out, "{line}");
    }
}

/// Print the pending exception to stderr and clear it
pub fn print() {
    print_to(&mut std::io::stderr());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raise_fetch_restore() {
        let pending = raise(BuiltinType::NameError, "name 'x' is not defined");
        assert_eq!(pending, Pending(()));
        assert!(occurred());
        assert!(pending_matches(BuiltinType::NameError));
        assert!(pending_matches(BuiltinType::Exception));
        assert!(!pending_matches(BuiltinType::TypeError));

        let error = fetch().unwrap();
        assert!(!occurred());
        assert_eq!(error.ptype.raw(), BuiltinType::NameError.type_object());

        restore(error);
        assert!(occurred());
        clear();
        assert!(!occurred());
    }

    #[test]
    fn test_format_exception_only() {
        let _ = raise(BuiltinType::NameError, "oops");
        let error = fetch().unwrap();
        let lines =
            format_exception_only(error.ptype.raw(), error.pvalue.as_ref().map(Owned::raw)).unwrap();
        assert_eq!(lines, vec!["NameError: oops\n".to_string()]);
    }

    #[test]
    fn test_normalize_instantiates_class() {
        let _ = raise_object(Owned::from_raw(BuiltinType::ValueError.type_object()));
        let mut error = fetch().unwrap();
        assert!(error.pvalue.is_none());
        normalize(&mut error);
        let value = error.pvalue.as_ref().unwrap().raw();
        assert_eq!(exception_class(value), Some(BuiltinType::ValueError));
        assert_eq!(exception_message(value).unwrap(), "");
    }

    #[test]
    fn test_syntax_error_lines() {
        let detail = SyntaxDetail {
            filename: "<string>".into(),
            lineno: 1,
            offset: 3,
            text: "1 +".into(),
        };
        let _ = raise_syntax_error("invalid syntax", detail);
        let error = fetch().unwrap();
        let lines =
            format_exception_only(error.ptype.raw(), error.pvalue.as_ref().map(Owned::raw)).unwrap();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines.last().unwrap(), "SyntaxError: invalid syntax\n");
    }

    #[test]
    fn test_print_to_clears() {
        let _ = raise(BuiltinType::KeyError, "k");
        let mut out = Vec::new();
        print_to(&mut out);
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Traceback (most recent call last):\n"));
        assert!(text.ends_with("KeyError: k\n"));
        assert!(!occurred());
    }
}
