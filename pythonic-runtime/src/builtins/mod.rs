//! Built-in types, functions and modules
//!
//! Design: each builtin type keeps its operations in a focused module, and
//! the generic protocols (`getattr`, `call`, `repr`, ...) dispatch on the
//! payload tag.

pub mod array;
mod attr;
mod call;
mod constructors;
mod dict;
mod functions;
mod modules;
mod numbers;
mod sequence;
mod stdlib;
mod string;

#[cfg(test)]
mod tests;

pub use array::{new_object_array, ArrayBuffer, ArrayView, TypeCode};
pub use attr::{getattr, hasattr, setattr};
pub use call::{call, call_method};
pub(crate) use dict::{dict_del_item, dict_update};
pub use dict::{
    dict_get_item, dict_get_str, dict_items, dict_len, dict_set_item, dict_set_str, hash_object,
    objects_equal,
};
pub use modules::{cleanup, find_function, import_module, main_dict, module_dict, module_name};
pub use numbers::{binary_op, compare, unary_op, BinOp, CmpOp, UnaryOp};
pub use sequence::{contains, getitem, iterate, len, setitem};
pub(crate) use string::expect_str;
pub use string::{complex_repr, decode_wtf8, float_repr, repr, to_str, wtf8_to_string};
