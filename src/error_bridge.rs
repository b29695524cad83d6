//! Error bridge between the foreign runtime and the host
//!
//! A pending foreign exception is turned into a one-line
//! `ConversionError` by asking the foreign runtime's own
//! `traceback.format_exception_only`. Host-side failures travel the other
//! way through `raise_in_foreign`.

use std::io::Write;

use pythonic_runtime::builtins::{self, getattr, import_module};
use pythonic_runtime::err::{self, Pending, PendingError};
use pythonic_runtime::{BuiltinType, ObjRef, Owned};
use tracing::{error, warn};

use crate::errors::{ConversionError, ErrorKind};

const FORMATTER_FAILED: &str =
    "failed to get exception information from traceback.format_exception_only";

impl From<Pending> for ConversionError {
    fn from(_: Pending) -> Self {
        capture()
    }
}

/// Translate the pending foreign exception, printing double faults to stderr
pub fn capture() -> ConversionError {
    capture_to(&mut std::io::stderr())
}

/// Translate the pending foreign exception into a conversion error
///
/// The foreign exception state is always cleared. When formatting fails the
/// original exception is restored, printed to `diagnostics` in full, and a
/// generic error replaces it.
pub fn capture_to(diagnostics: &mut dyn Write) -> ConversionError {
    let Some(mut pending) = err::fetch() else {
        return ConversionError::host("foreign runtime failed without setting an exception");
    };
    err::normalize(&mut pending);

    let kind = if is_syntax_error(&pending) {
        ErrorKind::ParseError
    } else {
        ErrorKind::ForeignRuntimeError
    };

    match format_last_line(&pending) {
        Ok(message) => {
            error!(target: "pythonic::error", kind = %kind, message = %message, "foreign exception");
            ConversionError::new(kind, message)
        }
        Err(_) => {
            // drop the formatter's own exception, report the original one
            err::clear();
            warn!(target: "pythonic::error", "exception formatter failed");
            err::restore(pending);
            err::print_to(diagnostics);
            ConversionError::foreign(FORMATTER_FAILED)
        }
    }
}

fn is_syntax_error(pending: &PendingError) -> bool {
    BuiltinType::from_type_object(pending.ptype.raw())
        .map_or(false, |ty| ty.is_subtype(BuiltinType::SyntaxError))
}

/// Last line of `traceback.format_exception_only(ptype, pvalue)`
fn format_last_line(pending: &PendingError) -> Result<String, Pending> {
    let traceback = import_module("traceback")?;
    let formatter = getattr(traceback.raw(), "format_exception_only")?;

    let mut args: Vec<ObjRef> = vec![pending.ptype.raw()];
    if let Some(value) = &pending.pvalue {
        args.push(value.raw());
    }
    let lines = builtins::call(formatter.raw(), &args, &[])?;
    let lines = builtins::iterate(lines.raw())?;
    let last: &Owned = match lines.last() {
        Some(line) => line,
        None => {
            return Err(err::raise(
                BuiltinType::ValueError,
                "format_exception_only returned no lines",
            ))
        }
    };
    let text = builtins::to_str(last.raw())?;
    Ok(text.strip_suffix('\n').unwrap_or(&text).to_string())
}

/// Raise a host-side failure as a foreign exception
pub fn raise_in_foreign(error: &ConversionError) -> Pending {
    let kind = match error.kind {
        ErrorKind::ValueConvert | ErrorKind::InvalidIdentifier => BuiltinType::ValueError,
        ErrorKind::ObjectConvert => BuiltinType::TypeError,
        ErrorKind::ParseError => BuiltinType::SyntaxError,
        ErrorKind::ForeignRuntimeError | ErrorKind::HostRuntimeError => BuiltinType::RuntimeError,
    };
    err::raise(kind, error.message.clone())
}

/// `unable to convert to TARGET, invalid Python object`
pub fn invalid_object(target: &str) -> ConversionError {
    ConversionError::object_convert(format!(
        "unable to convert to {target}, invalid Python object"
    ))
}

/// `unable to convert to TARGET, must be a Python EXPECTED`
pub fn type_mismatch(target: &str, expected: &str) -> ConversionError {
    ConversionError::object_convert(format!(
        "unable to convert to {target}, must be a Python {expected}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_has_no_trailing_newline() {
        let _ = err::raise(BuiltinType::NameError, "oops");
        let error = capture();
        assert_eq!(error.kind, ErrorKind::ForeignRuntimeError);
        assert_eq!(error.message, "NameError: oops");
        assert!(!err::occurred());
    }

    #[test]
    fn test_nothing_pending() {
        let error = capture();
        assert_eq!(error.kind, ErrorKind::HostRuntimeError);
    }

    #[test]
    fn test_raise_in_foreign_round_trip() {
        let _ = raise_in_foreign(&ConversionError::value_convert("bad shape"));
        assert!(err::pending_matches(BuiltinType::ValueError));
        assert_eq!(capture().message, "ValueError: bad shape");
    }

    #[test]
    fn test_mismatch_messages() {
        assert_eq!(
            type_mismatch("an Octave struct", "dict").message,
            "unable to convert to an Octave struct, must be a Python dict"
        );
        assert_eq!(
            invalid_object("int64").message,
            "unable to convert to int64, invalid Python object"
        );
    }
}
