//! Pythonic Runtime - a small, reference-counted Python-flavoured object runtime
//!
//! This crate provides the object model, the pending-exception state, a
//! builtin module set and a tree-walking evaluator for source strings. It is
//! the foreign runtime the `pythonic` bridge converts values to and from.
//!
//! Every object lives on the calling thread's heap; `ObjRef`s must not
//! cross threads.

pub mod builtins;
pub mod err;
pub mod eval;
pub mod heap;
pub mod logging;
pub mod objects;
pub mod refcount;
pub mod types;

// Re-export core types
pub use builtins::{ArrayBuffer, ArrayView, TypeCode};
pub use err::{Pending, PendingError, RtResult};
pub use eval::{run_string, Mode};
pub use heap::{live_objects, refcount};
pub use objects::{Args, Int, ObjRef, SyntaxDetail};
pub use refcount::Owned;
pub use types::BuiltinType;
