//! Builtin type table
//!
//! Every builtin class is a `BuiltinType`; its type object lives in the heap
//! slot with the same index. Single inheritance, so subtype checks walk the
//! `base` chain.

use crate::objects::ObjRef;

#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BuiltinType {
    Type = 0,
    Object,
    NoneType,
    Bool,
    Int,
    Float,
    Complex,
    Str,
    Bytes,
    Tuple,
    List,
    Dict,
    Array,
    Module,
    BuiltinFunction,
    Function,
    Method,
    BaseException,
    Exception,
    ArithmeticError,
    ZeroDivisionError,
    OverflowError,
    LookupError,
    IndexError,
    KeyError,
    NameError,
    TypeError,
    ValueError,
    UnicodeError,
    UnicodeEncodeError,
    AttributeError,
    ImportError,
    ModuleNotFoundError,
    SyntaxError,
    RuntimeError,
    NotImplementedError,
}

impl BuiltinType {
    pub const ALL: [BuiltinType; 36] = [
        BuiltinType::Type,
        BuiltinType::Object,
        BuiltinType::NoneType,
        BuiltinType::Bool,
        BuiltinType::Int,
        BuiltinType::Float,
        BuiltinType::Complex,
        BuiltinType::Str,
        BuiltinType::Bytes,
        BuiltinType::Tuple,
        BuiltinType::List,
        BuiltinType::Dict,
        BuiltinType::Array,
        BuiltinType::Module,
        BuiltinType::BuiltinFunction,
        BuiltinType::Function,
        BuiltinType::Method,
        BuiltinType::BaseException,
        BuiltinType::Exception,
        BuiltinType::ArithmeticError,
        BuiltinType::ZeroDivisionError,
        BuiltinType::OverflowError,
        BuiltinType::LookupError,
        BuiltinType::IndexError,
        BuiltinType::KeyError,
        BuiltinType::NameError,
        BuiltinType::TypeError,
        BuiltinType::ValueError,
        BuiltinType::UnicodeError,
        BuiltinType::UnicodeEncodeError,
        BuiltinType::AttributeError,
        BuiltinType::ImportError,
        BuiltinType::ModuleNotFoundError,
        BuiltinType::SyntaxError,
        BuiltinType::RuntimeError,
        BuiltinType::NotImplementedError,
    ];

    pub const COUNT: usize = Self::ALL.len();

    /// Class `__name__`
    pub fn name(self) -> &'static str {
        match self {
            BuiltinType::Type => "type",
            BuiltinType::Object => "object",
            BuiltinType::NoneType => "NoneType",
            BuiltinType::Bool => "bool",
            BuiltinType::Int => "int",
            BuiltinType::Float => "float",
            BuiltinType::Complex => "complex",
            BuiltinType::Str => "str",
            BuiltinType::Bytes => "bytes",
            BuiltinType::Tuple => "tuple",
            BuiltinType::List => "list",
            BuiltinType::Dict => "dict",
            BuiltinType::Array => "array",
            BuiltinType::Module => "module",
            BuiltinType::BuiltinFunction => "builtin_function_or_method",
            BuiltinType::Function => "function",
            BuiltinType::Method => "method",
            BuiltinType::BaseException => "BaseException",
            BuiltinType::Exception => "Exception",
            BuiltinType::ArithmeticError => "ArithmeticError",
            BuiltinType::ZeroDivisionError => "ZeroDivisionError",
            BuiltinType::OverflowError => "OverflowError",
            BuiltinType::LookupError => "LookupError",
            BuiltinType::IndexError => "IndexError",
            BuiltinType::KeyError => "KeyError",
            BuiltinType::NameError => "NameError",
            BuiltinType::TypeError => "TypeError",
            BuiltinType::ValueError => "ValueError",
            BuiltinType::UnicodeError => "UnicodeError",
            BuiltinType::UnicodeEncodeError => "UnicodeEncodeError",
            BuiltinType::AttributeError => "AttributeError",
            BuiltinType::ImportError => "ImportError",
            BuiltinType::ModuleNotFoundError => "ModuleNotFoundError",
            BuiltinType::SyntaxError => "SyntaxError",
            BuiltinType::RuntimeError => "RuntimeError",
            BuiltinType::NotImplementedError => "NotImplementedError",
        }
    }

    /// Class `__module__`
    pub fn module(self) -> &'static str {
        match self {
            BuiltinType::Array => "array",
            _ => "builtins",
        }
    }

    /// Direct base class (`None` only for `object`)
    pub fn base(self) -> Option<BuiltinType> {
        use BuiltinType::*;
        match self {
            Object => None,
            Bool => Some(Int),
            ZeroDivisionError | OverflowError => Some(ArithmeticError),
            IndexError | KeyError => Some(LookupError),
            UnicodeEncodeError => Some(UnicodeError),
            UnicodeError => Some(ValueError),
            ModuleNotFoundError => Some(ImportError),
            NotImplementedError => Some(RuntimeError),
            Exception => Some(BaseException),
            ArithmeticError | LookupError | NameError | TypeError | ValueError
            | AttributeError | ImportError | SyntaxError | RuntimeError => Some(Exception),
            _ => Some(Object),
        }
    }

    /// `issubclass(self, other)`
    pub fn is_subtype(self, other: BuiltinType) -> bool {
        let mut current = Some(self);
        while let Some(ty) = current {
            if ty == other {
                return true;
            }
            current = ty.base();
        }
        false
    }

    pub fn is_exception(self) -> bool {
        self.is_subtype(BuiltinType::BaseException)
    }

    /// Whether `type(...)` of this class can be called to build instances
    pub fn is_instantiable(self) -> bool {
        !matches!(
            self,
            BuiltinType::NoneType
                | BuiltinType::Module
                | BuiltinType::BuiltinFunction
                | BuiltinType::Function
                | BuiltinType::Method
        )
    }

    /// The (immortal) type object of this class
    #[inline]
    pub fn type_object(self) -> ObjRef {
        ObjRef::from_index(self as u32)
    }

    /// Recover the builtin class from its type object
    pub fn from_type_object(obj: ObjRef) -> Option<BuiltinType> {
        Self::ALL.get(obj.index()).copied()
    }

    /// Look up an exception or builtin class by its `__name__`
    pub fn from_name(name: &str) -> Option<BuiltinType> {
        Self::ALL.iter().copied().find(|ty| ty.name() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_order_matches_discriminants() {
        for (index, ty) in BuiltinType::ALL.iter().enumerate() {
            assert_eq!(*ty as usize, index);
            assert_eq!(BuiltinType::from_type_object(ty.type_object()), Some(*ty));
        }
    }

    #[test]
    fn test_hierarchy() {
        assert!(BuiltinType::Bool.is_subtype(BuiltinType::Int));
        assert!(BuiltinType::Bool.is_subtype(BuiltinType::Object));
        assert!(!BuiltinType::Int.is_subtype(BuiltinType::Bool));
        assert!(BuiltinType::KeyError.is_subtype(BuiltinType::LookupError));
        assert!(BuiltinType::ModuleNotFoundError.is_exception());
        assert!(BuiltinType::UnicodeEncodeError.is_subtype(BuiltinType::ValueError));
        assert!(!BuiltinType::Dict.is_exception());
    }

    #[test]
    fn test_names() {
        assert_eq!(BuiltinType::from_name("NameError"), Some(BuiltinType::NameError));
        assert_eq!(BuiltinType::Array.module(), "array");
        assert_eq!(BuiltinType::Dict.module(), "builtins");
    }
}
