//! Numeric operations - arithmetic and comparison over the numeric tower
//!
//! Design: operands are promoted to the widest kind involved:
//! - `bool`/`int` compute exactly on big integers, results are normalized
//!   back to the small form when they fit
//! - `float` follows IEEE semantics except where Python raises
//!   (`ZeroDivisionError`)
//! - `complex` uses `num-complex`, integer powers by repeated squaring

use num_bigint::BigInt;
use num_complex::Complex64;
use num_traits::{Signed, ToPrimitive, Zero};

use crate::err::{self, RtResult};
use crate::heap;
use crate::objects::{self, Int, ObjRef, Payload};
use crate::refcount::Owned;
use crate::types::BuiltinType;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    TrueDiv,
    FloorDiv,
    Mod,
    Pow,
    BitAnd,
    BitOr,
    BitXor,
    LShift,
    RShift,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::TrueDiv => "/",
            BinOp::FloorDiv => "//",
            BinOp::Mod => "%",
            BinOp::Pow => "**",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::LShift => "<<",
            BinOp::RShift => ">>",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Invert,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    Is,
    IsNot,
    In,
    NotIn,
}

/// Operand promoted for arithmetic
enum Num {
    Int(BigInt),
    Float(f64),
    Complex(Complex64),
}

fn to_num(obj: ObjRef) -> Option<Num> {
    heap::view(obj, |payload| match payload {
        Payload::Bool(value) => Some(Num::Int(BigInt::from(u8::from(*value)))),
        Payload::Int(value) => Some(Num::Int(value.to_bigint())),
        Payload::Float(value) => Some(Num::Float(*value)),
        Payload::Complex(value) => Some(Num::Complex(*value)),
        _ => None,
    })
}

fn int_to_f64(value: &BigInt) -> RtResult<f64> {
    value
        .to_f64()
        .filter(|f| f.is_finite())
        .ok_or_else(|| err::raise(BuiltinType::OverflowError, "int too large to convert to float"))
}

fn zero_division(message: &str) -> err::Pending {
    err::raise(BuiltinType::ZeroDivisionError, message)
}

/// Python floor division on integers
fn floor_div(a: &BigInt, b: &BigInt) -> BigInt {
    let q = a / b;
    let r = a - &q * b;
    if !r.is_zero() && (r.is_negative() != b.is_negative()) {
        q - 1
    } else {
        q
    }
}

/// Python modulo on integers (result takes the divisor's sign)
fn floor_mod(a: &BigInt, b: &BigInt) -> BigInt {
    let r = a % b;
    if !r.is_zero() && (r.is_negative() != b.is_negative()) {
        r + b
    } else {
        r
    }
}

fn int_op(op: BinOp, a: BigInt, b: BigInt) -> RtResult<Owned> {
    let result = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::TrueDiv => {
            if b.is_zero() {
                return Err(zero_division("division by zero"));
            }
            return Ok(objects::new_float(int_to_f64(&a)? / int_to_f64(&b)?));
        }
        BinOp::FloorDiv => {
            if b.is_zero() {
                return Err(zero_division("integer division or modulo by zero"));
            }
            floor_div(&a, &b)
        }
        BinOp::Mod => {
            if b.is_zero() {
                return Err(zero_division("integer division or modulo by zero"));
            }
            floor_mod(&a, &b)
        }
        BinOp::Pow => {
            if b.is_negative() {
                return float_op(op, int_to_f64(&a)?, int_to_f64(&b)?);
            }
            let exponent = b.to_u32().ok_or_else(|| {
                err::raise(BuiltinType::OverflowError, "exponent too large")
            })?;
            a.pow(exponent)
        }
        BinOp::BitAnd => a & b,
        BinOp::BitOr => a | b,
        BinOp::BitXor => a ^ b,
        BinOp::LShift | BinOp::RShift => {
            if b.is_negative() {
                return Err(err::raise(BuiltinType::ValueError, "negative shift count"));
            }
            let shift = b.to_usize().ok_or_else(|| {
                err::raise(BuiltinType::OverflowError, "shift count too large")
            })?;
            if op == BinOp::LShift {
                a << shift
            } else {
                a >> shift
            }
        }
    };
    Ok(objects::new_int_big(result))
}

fn float_op(op: BinOp, a: f64, b: f64) -> RtResult<Owned> {
    let result = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::TrueDiv => {
            if b == 0.0 {
                return Err(zero_division("float division by zero"));
            }
            a / b
        }
        BinOp::FloorDiv => {
            if b == 0.0 {
                return Err(zero_division("float floor division by zero"));
            }
            (a / b).floor()
        }
        BinOp::Mod => {
            if b == 0.0 {
                return Err(zero_division("float modulo"));
            }
            let r = a % b;
            if r != 0.0 && (r < 0.0) != (b < 0.0) {
                r + b
            } else {
                r
            }
        }
        BinOp::Pow => {
            if a == 0.0 && b < 0.0 {
                return Err(zero_division("0.0 cannot be raised to a negative power"));
            }
            if a < 0.0 && b.fract() != 0.0 {
                return complex_op(op, Complex64::new(a, 0.0), Complex64::new(b, 0.0));
            }
            a.powf(b)
        }
        _ => return Err(unsupported(op, "float", "float")),
    };
    Ok(objects::new_float(result))
}

fn complex_op(op: BinOp, a: Complex64, b: Complex64) -> RtResult<Owned> {
    let result = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::TrueDiv => {
            if b.is_zero() {
                return Err(zero_division("complex division by zero"));
            }
            a / b
        }
        BinOp::Pow => {
            if b.im == 0.0 && b.re.fract() == 0.0 && b.re.abs() <= 1024.0 {
                if a.is_zero() && b.re < 0.0 {
                    return Err(zero_division("0.0 to a negative or complex power"));
                }
                a.powi(b.re as i32)
            } else {
                a.powc(b)
            }
        }
        _ => return Err(unsupported(op, "complex", "complex")),
    };
    Ok(objects::new_complex(result))
}

fn unsupported(op: BinOp, left: &str, right: &str) -> err::Pending {
    err::raise(
        BuiltinType::TypeError,
        format!(
            "unsupported operand type(s) for {}: '{left}' and '{right}'",
            op.symbol()
        ),
    )
}

enum SeqOperand {
    Str(Vec<u8>),
    Bytes(Vec<u8>),
    Tuple(Vec<ObjRef>),
    List(Vec<ObjRef>),
}

fn seq_operand(obj: ObjRef) -> Option<SeqOperand> {
    heap::view(obj, |payload| match payload {
        Payload::Str(bytes) => Some(SeqOperand::Str(bytes.clone())),
        Payload::Bytes(bytes) => Some(SeqOperand::Bytes(bytes.clone())),
        Payload::Tuple(items) => Some(SeqOperand::Tuple(items.clone())),
        Payload::List(items) => Some(SeqOperand::List(items.clone())),
        _ => None,
    })
}

fn borrowed_all(items: &[ObjRef]) -> Vec<Owned> {
    items.iter().map(|item| Owned::from_borrowed(*item)).collect()
}

fn repeat(seq: SeqOperand, count: &BigInt) -> RtResult<Owned> {
    let count = count.to_usize().unwrap_or(0);
    Ok(match seq {
        SeqOperand::Str(bytes) => objects::new_str_wtf8(bytes.repeat(count)),
        SeqOperand::Bytes(bytes) => objects::new_bytes(&bytes.repeat(count)),
        SeqOperand::Tuple(items) => objects::new_tuple(borrowed_all(&items.repeat(count))),
        SeqOperand::List(items) => objects::new_list(borrowed_all(&items.repeat(count))),
    })
}

fn sequence_op(op: BinOp, a: ObjRef, b: ObjRef) -> Option<RtResult<Owned>> {
    match (op, seq_operand(a), seq_operand(b)) {
        (BinOp::Add, Some(x), Some(y)) => Some(match (x, y) {
            (SeqOperand::Str(mut x), SeqOperand::Str(y)) => {
                x.extend_from_slice(&y);
                Ok(objects::new_str_wtf8(x))
            }
            (SeqOperand::Bytes(mut x), SeqOperand::Bytes(y)) => {
                x.extend_from_slice(&y);
                Ok(objects::new_bytes(&x))
            }
            (SeqOperand::Tuple(mut x), SeqOperand::Tuple(y)) => {
                x.extend(y);
                Ok(objects::new_tuple(borrowed_all(&x)))
            }
            (SeqOperand::List(mut x), SeqOperand::List(y)) => {
                x.extend(y);
                Ok(objects::new_list(borrowed_all(&x)))
            }
            _ => Err(unsupported(op, objects::type_name(a), objects::type_name(b))),
        }),
        (BinOp::Mul, Some(seq), None) => {
            exact_int(b).map(|count| repeat(seq, &count))
        }
        (BinOp::Mul, None, Some(seq)) => {
            exact_int(a).map(|count| repeat(seq, &count))
        }
        _ => None,
    }
}

fn exact_int(obj: ObjRef) -> Option<BigInt> {
    objects::as_int(obj).map(|value| value.to_bigint())
}

/// Evaluate `a <op> b`
pub fn binary_op(op: BinOp, a: ObjRef, b: ObjRef) -> RtResult<Owned> {
    if let Some(result) = sequence_op(op, a, b) {
        return result;
    }

    let (Some(x), Some(y)) = (to_num(a), to_num(b)) else {
        return Err(unsupported(op, objects::type_name(a), objects::type_name(b)));
    };

    match (x, y) {
        (Num::Int(x), Num::Int(y)) => int_op(op, x, y),
        (Num::Complex(x), y) => complex_op(op, x, to_complex(y)?),
        (x, Num::Complex(y)) => complex_op(op, to_complex(x)?, y),
        (x, y) => {
            if matches!(
                op,
                BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor | BinOp::LShift | BinOp::RShift
            ) {
                return Err(unsupported(op, objects::type_name(a), objects::type_name(b)));
            }
            float_op(op, to_f64(x)?, to_f64(y)?)
        }
    }
}

fn to_f64(num: Num) -> RtResult<f64> {
    match num {
        Num::Int(value) => int_to_f64(&value),
        Num::Float(value) => Ok(value),
        Num::Complex(value) => Ok(value.re),
    }
}

fn to_complex(num: Num) -> RtResult<Complex64> {
    match num {
        Num::Complex(value) => Ok(value),
        other => Ok(Complex64::new(to_f64(other)?, 0.0)),
    }
}

/// Evaluate `<op> a`
pub fn unary_op(op: UnaryOp, a: ObjRef) -> RtResult<Owned> {
    let Some(value) = to_num(a) else {
        let symbol = match op {
            UnaryOp::Neg => "unary -",
            UnaryOp::Pos => "unary +",
            UnaryOp::Invert => "unary ~",
        };
        return Err(err::raise(
            BuiltinType::TypeError,
            format!("bad operand type for {symbol}: '{}'", objects::type_name(a)),
        ));
    };

    Ok(match (op, value) {
        (UnaryOp::Neg, Num::Int(v)) => objects::new_int_big(-v),
        (UnaryOp::Pos, Num::Int(v)) => objects::new_int_big(v),
        (UnaryOp::Invert, Num::Int(v)) => objects::new_int_big(-v - 1),
        (UnaryOp::Neg, Num::Float(v)) => objects::new_float(-v),
        (UnaryOp::Pos, Num::Float(v)) => objects::new_float(v),
        (UnaryOp::Neg, Num::Complex(v)) => objects::new_complex(-v),
        (UnaryOp::Pos, Num::Complex(v)) => objects::new_complex(v),
        (UnaryOp::Invert, _) => {
            return Err(err::raise(
                BuiltinType::TypeError,
                format!("bad operand type for unary ~: '{}'", objects::type_name(a)),
            ))
        }
    })
}

/// `abs(x)`
pub(crate) fn absolute(a: ObjRef) -> RtResult<Owned> {
    match to_num(a) {
        Some(Num::Int(v)) => Ok(objects::new_int_big(v.abs())),
        Some(Num::Float(v)) => Ok(objects::new_float(v.abs())),
        Some(Num::Complex(v)) => Ok(objects::new_float(v.norm())),
        None => Err(err::raise(
            BuiltinType::TypeError,
            format!("bad operand type for abs(): '{}'", objects::type_name(a)),
        )),
    }
}

fn order(a: ObjRef, b: ObjRef, symbol: &str) -> RtResult<std::cmp::Ordering> {
    use std::cmp::Ordering;

    match (to_num(a), to_num(b)) {
        (Some(Num::Int(x)), Some(Num::Int(y))) => return Ok(x.cmp(&y)),
        (Some(x), Some(y)) if !matches!(x, Num::Complex(_)) && !matches!(y, Num::Complex(_)) => {
            let (x, y) = (to_f64(x)?, to_f64(y)?);
            return Ok(x.partial_cmp(&y).unwrap_or(Ordering::Equal));
        }
        _ => {}
    }

    match (seq_operand(a), seq_operand(b)) {
        (Some(SeqOperand::Str(x)), Some(SeqOperand::Str(y)))
        | (Some(SeqOperand::Bytes(x)), Some(SeqOperand::Bytes(y))) => return Ok(x.cmp(&y)),
        (Some(SeqOperand::Tuple(x)), Some(SeqOperand::Tuple(y)))
        | (Some(SeqOperand::List(x)), Some(SeqOperand::List(y))) => {
            for (p, q) in x.iter().zip(&y) {
                if !super::objects_equal(*p, *q)? {
                    return order(*p, *q, symbol);
                }
            }
            return Ok(x.len().cmp(&y.len()));
        }
        _ => {}
    }

    Err(err::raise(
        BuiltinType::TypeError,
        format!(
            "'{symbol}' not supported between instances of '{}' and '{}'",
            objects::type_name(a),
            objects::type_name(b)
        ),
    ))
}

fn has_nan(a: ObjRef, b: ObjRef) -> bool {
    let nan = |obj| matches!(objects::as_float(obj), Some(v) if v.is_nan());
    nan(a) || nan(b)
}

/// Evaluate `a <op> b` as a Rust bool
pub fn compare(op: CmpOp, a: ObjRef, b: ObjRef) -> RtResult<bool> {
    use std::cmp::Ordering;

    Ok(match op {
        CmpOp::Eq => super::objects_equal(a, b)?,
        CmpOp::NotEq => !super::objects_equal(a, b)?,
        CmpOp::Is => a == b,
        CmpOp::IsNot => a != b,
        CmpOp::In => super::contains(b, a)?,
        CmpOp::NotIn => !super::contains(b, a)?,
        CmpOp::Lt => !has_nan(a, b) && order(a, b, "<")? == Ordering::Less,
        CmpOp::LtE => !has_nan(a, b) && order(a, b, "<=")? != Ordering::Greater,
        CmpOp::Gt => !has_nan(a, b) && order(a, b, ">")? == Ordering::Greater,
        CmpOp::GtE => !has_nan(a, b) && order(a, b, ">=")? != Ordering::Less,
    })
}

/// Integer value of an index-like argument
pub(crate) fn expect_index(obj: ObjRef, what: &str) -> RtResult<i64> {
    match objects::as_int(obj) {
        Some(Int::Small(value)) => Ok(value),
        Some(Int::Big(_)) => Err(err::raise(
            BuiltinType::OverflowError,
            format!("{what} is too large"),
        )),
        None => Err(err::raise(
            BuiltinType::TypeError,
            format!(
                "{what} must be an integer, not {}",
                objects::type_name(obj)
            ),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_value(obj: &Owned) -> Int {
        objects::as_int(obj.raw()).unwrap()
    }

    #[test]
    fn test_big_integer_exact() {
        let two = objects::new_int_i64(2);
        let exp = objects::new_int_i64(128);
        let big = binary_op(BinOp::Pow, two.raw(), exp.raw()).unwrap();
        let expected: BigInt = "340282366920938463463374607431768211456".parse().unwrap();
        assert_eq!(int_value(&big), Int::Big(expected));

        let back = binary_op(BinOp::FloorDiv, big.raw(), big.raw()).unwrap();
        assert_eq!(int_value(&back), Int::Small(1));
    }

    #[test]
    fn test_floor_semantics() {
        let a = objects::new_int_i64(-7);
        let b = objects::new_int_i64(2);
        assert_eq!(
            int_value(&binary_op(BinOp::FloorDiv, a.raw(), b.raw()).unwrap()),
            Int::Small(-4)
        );
        assert_eq!(
            int_value(&binary_op(BinOp::Mod, a.raw(), b.raw()).unwrap()),
            Int::Small(1)
        );
    }

    #[test]
    fn test_division_by_zero() {
        let a = objects::new_int_i64(1);
        let z = objects::new_int_i64(0);
        assert!(binary_op(BinOp::TrueDiv, a.raw(), z.raw()).is_err());
        assert!(err::pending_matches(BuiltinType::ZeroDivisionError));
        err::clear();
    }

    #[test]
    fn test_promotion() {
        let a = objects::new_int_i64(1);
        let b = objects::new_float(0.5);
        let sum = binary_op(BinOp::Add, a.raw(), b.raw()).unwrap();
        assert_eq!(objects::as_float(sum.raw()), Some(1.5));

        let j = objects::new_complex(Complex64::new(0.0, 1.0));
        let two = objects::new_int_i64(2);
        let sq = binary_op(BinOp::Pow, j.raw(), two.raw()).unwrap();
        assert_eq!(objects::as_complex(sq.raw()), Some(Complex64::new(-1.0, 0.0)));
    }

    #[test]
    fn test_sequence_ops() {
        let a = objects::new_str("ab");
        let three = objects::new_int_i64(3);
        let rep = binary_op(BinOp::Mul, a.raw(), three.raw()).unwrap();
        assert_eq!(objects::str_wtf8(rep.raw()).unwrap(), b"ababab");

        let t = objects::new_tuple(vec![objects::new_int_i64(1)]);
        let joined = binary_op(BinOp::Add, t.raw(), t.raw()).unwrap();
        assert_eq!(objects::sequence_items(joined.raw()).unwrap().len(), 2);
    }

    #[test]
    fn test_comparisons() {
        let one = objects::new_int_i64(1);
        let half = objects::new_float(0.5);
        assert!(compare(CmpOp::Gt, one.raw(), half.raw()).unwrap());
        assert!(compare(CmpOp::Lt, objects::new_str("a").raw(), objects::new_str("b").raw()).unwrap());
        assert!(compare(CmpOp::Lt, one.raw(), objects::new_str("b").raw()).is_err());
        err::clear();
    }
}
