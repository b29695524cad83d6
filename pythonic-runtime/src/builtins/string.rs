//! String type - generalized UTF-8 text, bytes and `repr`/`str`
//!
//! Design: `str` payloads are WTF-8, i.e. UTF-8 that may also encode lone
//! surrogate code points:
//! - Anything built from Rust text is plain UTF-8
//! - `chr(0xDC80)` or a `surrogateescape` decode produce surrogates
//! - Strict `encode('utf-8')` rejects surrogates, like the real codec

use num_complex::Complex64;

use crate::builtins::array;
use crate::err::{self, RtResult};
use crate::heap::with_interp;
use crate::objects::{self, Args, NativeMethod, ObjRef, Payload};
use crate::refcount::Owned;
use crate::types::BuiltinType;

// ---------------------------------------------------------------------------
// WTF-8 helpers
// ---------------------------------------------------------------------------

#[inline]
pub(crate) fn is_surrogate(cp: u32) -> bool {
    (0xD800..=0xDFFF).contains(&cp)
}

/// Append one code point (surrogates included)
pub(crate) fn push_code_point(buf: &mut Vec<u8>, cp: u32) {
    match cp {
        0..=0x7F => buf.push(cp as u8),
        0x80..=0x7FF => {
            buf.push(0xC0 | (cp >> 6) as u8);
            buf.push(0x80 | (cp & 0x3F) as u8);
        }
        0x800..=0xFFFF => {
            buf.push(0xE0 | (cp >> 12) as u8);
            buf.push(0x80 | ((cp >> 6) & 0x3F) as u8);
            buf.push(0x80 | (cp & 0x3F) as u8);
        }
        _ => {
            buf.push(0xF0 | (cp >> 18) as u8);
            buf.push(0x80 | ((cp >> 12) & 0x3F) as u8);
            buf.push(0x80 | ((cp >> 6) & 0x3F) as u8);
            buf.push(0x80 | (cp & 0x3F) as u8);
        }
    }
}

/// Decode WTF-8 storage into code points
pub fn decode_wtf8(bytes: &[u8]) -> Vec<u32> {
    let mut out = Vec::with_capacity(bytes.len());
    let cont = |b: u8| u32::from(b & 0x3F);
    let mut i = 0;

    while i < bytes.len() {
        let b0 = bytes[i];
        let remaining = bytes.len() - i;
        let (cp, width) = if b0 < 0x80 {
            (u32::from(b0), 1)
        } else if b0 >> 5 == 0b110 && remaining >= 2 {
            ((u32::from(b0 & 0x1F) << 6) | cont(bytes[i + 1]), 2)
        } else if b0 >> 4 == 0b1110 && remaining >= 3 {
            (
                (u32::from(b0 & 0x0F) << 12) | (cont(bytes[i + 1]) << 6) | cont(bytes[i + 2]),
                3,
            )
        } else if b0 >> 3 == 0b11110 && remaining >= 4 {
            (
                (u32::from(b0 & 0x07) << 18)
                    | (cont(bytes[i + 1]) << 12)
                    | (cont(bytes[i + 2]) << 6)
                    | cont(bytes[i + 3]),
                4,
            )
        } else {
            (0xFFFD, 1)
        };
        out.push(cp);
        i += width;
    }
    out
}

/// Lossy conversion to Rust text (surrogates become U+FFFD)
pub fn wtf8_to_string(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => decode_wtf8(bytes)
            .into_iter()
            .map(|cp| char::from_u32(cp).unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect(),
    }
}

/// Text of a `str` argument, raising `TypeError` otherwise
pub(crate) fn expect_str(obj: ObjRef, what: &str) -> RtResult<String> {
    match objects::str_wtf8(obj) {
        Some(bytes) => Ok(wtf8_to_string(&bytes)),
        None => Err(err::raise(
            BuiltinType::TypeError,
            format!("{what} must be str, not {}", objects::type_name(obj)),
        )),
    }
}

// ---------------------------------------------------------------------------
// repr / str
// ---------------------------------------------------------------------------

/// Python `repr(float)`
pub fn float_repr(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    // Debug already picks the shortest round-trip digits and switches to
    // exponent form at the same thresholds (1e-4, 1e16)
    let text = format!("{value:?}");
    match text.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => text,
    }
}

fn complex_part(value: f64) -> String {
    let text = float_repr(value);
    match text.strip_suffix(".0") {
        Some(short) => short.to_string(),
        None => text,
    }
}

/// Python `repr(complex)`
pub fn complex_repr(value: Complex64) -> String {
    if value.re == 0.0 && value.re.is_sign_positive() {
        return format!("{}j", complex_part(value.im));
    }
    let imag = complex_part(value.im);
    let sign = if imag.starts_with('-') { "" } else { "+" };
    format!("({}{sign}{imag}j)", complex_part(value.re))
}

fn str_repr(bytes: &[u8]) -> String {
    let cps = decode_wtf8(bytes);
    let has_single = cps.contains(&u32::from(b'\''));
    let has_double = cps.contains(&u32::from(b'"'));
    let quote = if has_single && !has_double { '"' } else { '\'' };

    let mut out = String::with_capacity(bytes.len() + 2);
    out.push(quote);
    for cp in cps {
        match char::from_u32(cp) {
            Some('\\') => out.push_str("\\\\"),
            Some('\n') => out.push_str("\\n"),
            Some('\r') => out.push_str("\\r"),
            Some('\t') => out.push_str("\\t"),
            Some(c) if c == quote => {
                out.push('\\');
                out.push(c);
            }
            Some(_) if cp < 0x20 || cp == 0x7F => out.push_str(&format!("\\x{cp:02x}")),
            Some(c) => out.push(c),
            None => out.push_str(&format!("\\u{cp:04x}")),
        }
    }
    out.push(quote);
    out
}

fn bytes_repr(bytes: &[u8]) -> String {
    let has_single = bytes.contains(&b'\'');
    let has_double = bytes.contains(&b'"');
    let quote = if has_single && !has_double { b'"' } else { b'\'' };

    let mut out = String::with_capacity(bytes.len() + 3);
    out.push('b');
    out.push(char::from(quote));
    for &b in bytes {
        match b {
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            _ if b == quote => {
                out.push('\\');
                out.push(char::from(b));
            }
            0x20..=0x7E => out.push(char::from(b)),
            _ => out.push_str(&format!("\\x{b:02x}")),
        }
    }
    out.push(char::from(quote));
    out
}

enum Snapshot {
    Text(String),
    Seq {
        open: &'static str,
        close: &'static str,
        items: Vec<ObjRef>,
        tuple: bool,
    },
    Dict(Vec<(ObjRef, ObjRef)>),
    Array(char),
    Exception(&'static str, Vec<ObjRef>),
}

fn snapshot(obj: ObjRef) -> Snapshot {
    with_interp(|interp| match interp.payload(obj) {
        Payload::None => Snapshot::Text("None".into()),
        Payload::Bool(value) => Snapshot::Text(if *value { "True" } else { "False" }.into()),
        Payload::Int(value) => Snapshot::Text(value.to_string()),
        Payload::Float(value) => Snapshot::Text(float_repr(*value)),
        Payload::Complex(value) => Snapshot::Text(complex_repr(*value)),
        Payload::Str(bytes) => Snapshot::Text(str_repr(bytes)),
        Payload::Bytes(bytes) => Snapshot::Text(bytes_repr(bytes)),
        Payload::Tuple(items) => Snapshot::Seq {
            open: "(",
            close: ")",
            items: items.clone(),
            tuple: true,
        },
        Payload::List(items) => Snapshot::Seq {
            open: "[",
            close: "]",
            items: items.clone(),
            tuple: false,
        },
        Payload::Dict(dict) => Snapshot::Dict(
            dict.entries
                .iter()
                .map(|entry| (entry.key, entry.value))
                .collect(),
        ),
        Payload::Array(data) => Snapshot::Array(data.typecode.as_char()),
        Payload::Type(ty) => Snapshot::Text(match ty.module() {
            "builtins" => format!("<class '{}'>", ty.name()),
            module => format!("<class '{module}.{}'>", ty.name()),
        }),
        Payload::Module(module) => Snapshot::Text(format!("<module '{}'>", module.name)),
        Payload::Builtin(function) => {
            Snapshot::Text(format!("<built-in function {}>", function.name))
        }
        Payload::Method(method) => Snapshot::Text(format!(
            "<built-in method {} of {} object>",
            method.name,
            interp.payload(method.receiver).kind_name()
        )),
        Payload::Function(function) => Snapshot::Text(format!("<function {}>", function.name)),
        Payload::Instance => Snapshot::Text(format!("<object object at {:#x}>", obj.id())),
        Payload::Exception(exc) => Snapshot::Exception(exc.class.name(), exc.args.clone()),
    })
}

fn write_repr(obj: ObjRef, out: &mut String) -> RtResult<()> {
    match snapshot(obj) {
        Snapshot::Text(text) => out.push_str(&text),
        Snapshot::Seq {
            open,
            close,
            items,
            tuple,
        } => {
            out.push_str(open);
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_repr(*item, out)?;
            }
            if tuple && items.len() == 1 {
                out.push(',');
            }
            out.push_str(close);
        }
        Snapshot::Dict(entries) => {
            out.push('{');
            for (i, (key, value)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_repr(*key, out)?;
                out.push_str(": ");
                write_repr(*value, out)?;
            }
            out.push('}');
        }
        Snapshot::Array(typecode) => {
            let items = array::tolist(obj)?;
            out.push_str(&format!("array('{typecode}'"));
            if objects::is_truthy(items.raw()) {
                out.push_str(", ");
                write_repr(items.raw(), out)?;
            }
            out.push(')');
        }
        Snapshot::Exception(name, args) => {
            out.push_str(name);
            out.push('(');
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_repr(*arg, out)?;
            }
            out.push(')');
        }
    }
    Ok(())
}

/// `repr(obj)`
pub fn repr(obj: ObjRef) -> RtResult<String> {
    let mut out = String::new();
    write_repr(obj, &mut out)?;
    Ok(out)
}

/// `str(obj)` as Rust text
pub fn to_str(obj: ObjRef) -> RtResult<String> {
    if let Some(bytes) = objects::str_wtf8(obj) {
        return Ok(wtf8_to_string(&bytes));
    }
    if err::exception_class(obj).is_some() {
        return err::exception_message(obj);
    }
    repr(obj)
}

/// `str(obj)` as a new str object (surrogates preserved)
pub(crate) fn str_object(obj: ObjRef) -> RtResult<Owned> {
    if objects::type_of(obj) == BuiltinType::Str {
        return Ok(Owned::from_borrowed(obj));
    }
    Ok(objects::new_str(&to_str(obj)?))
}

// ---------------------------------------------------------------------------
// Codecs
// ---------------------------------------------------------------------------

fn check_encoding(args: &Args<'_>) -> RtResult<String> {
    let encoding = match args.arg(0, "encoding") {
        Some(obj) => expect_str(obj, "encoding")?,
        None => "utf-8".to_string(),
    };
    let normalized = encoding.to_ascii_lowercase().replace('_', "-");
    if normalized != "utf-8" && normalized != "utf8" {
        return Err(err::raise(
            BuiltinType::LookupError,
            format!("unknown encoding: {encoding}"),
        ));
    }
    let errors = match args.arg(1, "errors") {
        Some(obj) => expect_str(obj, "errors")?,
        None => "strict".to_string(),
    };
    Ok(errors)
}

/// Encode WTF-8 storage as UTF-8 bytes under an error handler
pub(crate) fn encode_utf8(bytes: &[u8], errors: &str) -> RtResult<Vec<u8>> {
    if std::str::from_utf8(bytes).is_ok() {
        return Ok(bytes.to_vec());
    }

    let mut out = Vec::with_capacity(bytes.len());
    for (position, cp) in decode_wtf8(bytes).into_iter().enumerate() {
        if !is_surrogate(cp) {
            push_code_point(&mut out, cp);
            continue;
        }
        match errors {
            "surrogatepass" => push_code_point(&mut out, cp),
            "surrogateescape" if (0xDC80..=0xDCFF).contains(&cp) => out.push((cp - 0xDC00) as u8),
            "replace" => out.push(b'?'),
            "ignore" => {}
            _ => {
                return Err(err::raise(
                    BuiltinType::UnicodeEncodeError,
                    format!(
                        "'utf-8' codec can't encode character '\\u{cp:04x}' in position {position}: surrogates not allowed"
                    ),
                ))
            }
        }
    }
    Ok(out)
}

/// Decode UTF-8 bytes into WTF-8 storage under an error handler
pub(crate) fn decode_utf8(bytes: &[u8], errors: &str) -> RtResult<Vec<u8>> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut rest = bytes;
    let mut consumed = 0;

    loop {
        match std::str::from_utf8(rest) {
            Ok(text) => {
                out.extend_from_slice(text.as_bytes());
                return Ok(out);
            }
            Err(e) => {
                let valid = e.valid_up_to();
                let bad = e.error_len().unwrap_or(rest.len() - valid);
                out.extend_from_slice(&rest[..valid]);
                for &b in &rest[valid..valid + bad] {
                    match errors {
                        "surrogateescape" => push_code_point(&mut out, 0xDC00 + u32::from(b)),
                        "replace" => push_code_point(&mut out, 0xFFFD),
                        "ignore" => {}
                        _ => {
                            return Err(err::raise(
                                BuiltinType::UnicodeError,
                                format!(
                                    "'utf-8' codec can't decode byte {b:#04x} in position {}: invalid start byte",
                                    consumed + valid
                                ),
                            ))
                        }
                    }
                }
                consumed += valid + bad;
                rest = &rest[valid + bad..];
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Methods
// ---------------------------------------------------------------------------

fn receiver_text(receiver: ObjRef) -> Vec<u8> {
    objects::str_wtf8(receiver).unwrap_or_default()
}

fn map_case(receiver: ObjRef, upper: bool) -> Owned {
    let mut out = Vec::new();
    for cp in decode_wtf8(&receiver_text(receiver)) {
        match char::from_u32(cp) {
            Some(c) if upper => c.to_uppercase().for_each(|u| push_code_point(&mut out, u32::from(u))),
            Some(c) => c.to_lowercase().for_each(|l| push_code_point(&mut out, u32::from(l))),
            None => push_code_point(&mut out, cp),
        }
    }
    objects::new_str_wtf8(out)
}

fn str_upper(receiver: ObjRef, args: Args<'_>) -> RtResult<Owned> {
    args.check_count("upper", 0, 0)?;
    Ok(map_case(receiver, true))
}

fn str_lower(receiver: ObjRef, args: Args<'_>) -> RtResult<Owned> {
    args.check_count("lower", 0, 0)?;
    Ok(map_case(receiver, false))
}

fn str_encode(receiver: ObjRef, args: Args<'_>) -> RtResult<Owned> {
    args.check_count("encode", 0, 2)?;
    let errors = check_encoding(&args)?;
    let encoded = encode_utf8(&receiver_text(receiver), &errors)?;
    Ok(objects::new_bytes(&encoded))
}

fn str_join(receiver: ObjRef, args: Args<'_>) -> RtResult<Owned> {
    args.check_count("join", 1, 1)?;
    let separator = receiver_text(receiver);
    let mut out = Vec::new();
    for (i, item) in super::iterate(args.positional[0])?.iter().enumerate() {
        let Some(text) = objects::str_wtf8(item.raw()) else {
            return Err(err::raise(
                BuiltinType::TypeError,
                format!(
                    "sequence item {i}: expected str instance, {} found",
                    objects::type_name(item.raw())
                ),
            ));
        };
        if i > 0 {
            out.extend_from_slice(&separator);
        }
        out.extend_from_slice(&text);
    }
    Ok(objects::new_str_wtf8(out))
}

fn str_startswith(receiver: ObjRef, args: Args<'_>) -> RtResult<Owned> {
    args.check_count("startswith", 1, 1)?;
    let prefix = objects::str_wtf8(args.positional[0]).ok_or_else(|| {
        err::raise(
            BuiltinType::TypeError,
            "startswith first arg must be str",
        )
    })?;
    Ok(objects::new_bool(receiver_text(receiver).starts_with(&prefix)))
}

fn bytes_decode(receiver: ObjRef, args: Args<'_>) -> RtResult<Owned> {
    args.check_count("decode", 0, 2)?;
    let errors = check_encoding(&args)?;
    let data = objects::bytes_data(receiver).unwrap_or_default();
    Ok(objects::new_str_wtf8(decode_utf8(&data, &errors)?))
}

fn bytes_hex(receiver: ObjRef, args: Args<'_>) -> RtResult<Owned> {
    args.check_count("hex", 0, 0)?;
    let data = objects::bytes_data(receiver).unwrap_or_default();
    let hex: String = data.iter().map(|b| format!("{b:02x}")).collect();
    Ok(objects::new_str(&hex))
}

pub(super) const STR_METHODS: &[(&str, NativeMethod)] = &[
    ("upper", str_upper),
    ("lower", str_lower),
    ("encode", str_encode),
    ("join", str_join),
    ("startswith", str_startswith),
];

pub(super) const BYTES_METHODS: &[(&str, NativeMethod)] = &[
    ("decode", bytes_decode),
    ("hex", bytes_hex),
];
