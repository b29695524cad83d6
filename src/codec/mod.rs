//! Codecs: paired encode/decode functions per category of value
//!
//! - `primitive` - bools, integers, floats, complex numbers, strings
//! - `array` - numeric arrays and fixed-typecode `array.array` objects
//! - `aggregate` - structs and dicts, cells and sequences
//!
//! Aggregates recurse through whatever implements `Encode` / `Decode`,
//! normally the `Converter`.

pub mod aggregate;
pub mod array;
pub mod primitive;

use pythonic_runtime::objects;
use pythonic_runtime::{BuiltinType, ObjRef};

use crate::errors::ConvResult;
use crate::handle::ForeignHandle;
use crate::value::HostValue;

/// Host value to foreign object
pub trait Encode {
    fn encode(&self, value: &HostValue) -> ConvResult<ForeignHandle>;
}

/// Foreign object to host value
pub trait Decode {
    fn decode(&mut self, obj: ObjRef) -> ConvResult<HostValue>;
}

/// What the bridge can do with a foreign object, by its exact type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForeignKind {
    None,
    Bool,
    Int,
    Float,
    Complex,
    Str,
    Bytes,
    Array,
    Mapping,
    Sequence,
    Other,
}

impl ForeignKind {
    pub fn of(obj: ObjRef) -> Self {
        match objects::type_of(obj) {
            BuiltinType::NoneType => Self::None,
            BuiltinType::Bool => Self::Bool,
            BuiltinType::Int => Self::Int,
            BuiltinType::Float => Self::Float,
            BuiltinType::Complex => Self::Complex,
            BuiltinType::Str => Self::Str,
            BuiltinType::Bytes => Self::Bytes,
            BuiltinType::Array => Self::Array,
            BuiltinType::Dict => Self::Mapping,
            BuiltinType::List | BuiltinType::Tuple => Self::Sequence,
            _ => Self::Other,
        }
    }

    pub fn is_string(self) -> bool {
        matches!(self, Self::Str | Self::Bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert_eq!(ForeignKind::of(objects::none()), ForeignKind::None);
        assert_eq!(ForeignKind::of(objects::new_bool(true).raw()), ForeignKind::Bool);
        assert_eq!(ForeignKind::of(objects::new_int_i64(1).raw()), ForeignKind::Int);
        assert_eq!(ForeignKind::of(objects::new_tuple(Vec::new()).raw()), ForeignKind::Sequence);
        assert_eq!(ForeignKind::of(objects::new_dict().raw()), ForeignKind::Mapping);
        assert!(ForeignKind::of(objects::new_bytes(b"x").raw()).is_string());
        assert_eq!(ForeignKind::of(objects::new_object().raw()), ForeignKind::Other);
    }
}
