//! Foreign handle - RAII owner of one foreign object reference
//!
//! A handle is either empty or holds exactly one strong reference. Cloning
//! increments the foreign refcount, dropping decrements it, and `release`
//! hands the reference to the caller without touching the count.

use pythonic_runtime::objects;
use pythonic_runtime::{ObjRef, Owned};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ForeignHandle(Option<Owned>);

impl ForeignHandle {
    /// A handle holding nothing
    pub fn empty() -> Self {
        Self(None)
    }

    /// Take over a reference the caller already owns
    pub fn steal(raw: ObjRef) -> Self {
        Self(Some(Owned::from_raw(raw)))
    }

    /// Add a reference to an object whose lifetime the caller guarantees
    pub fn borrowed(raw: ObjRef) -> Self {
        Self(Some(Owned::from_borrowed(raw)))
    }

    /// The held object, still owned by the handle
    pub fn get(&self) -> Option<ObjRef> {
        self.0.as_ref().map(Owned::raw)
    }

    /// Give up ownership without decrementing; the handle becomes empty
    pub fn release(&mut self) -> Option<ObjRef> {
        self.0.take().map(Owned::into_raw)
    }

    pub fn into_owned(self) -> Option<Owned> {
        self.0
    }

    /// Whether a reference is held at all
    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    /// Whether the held reference is the foreign `None` singleton
    pub fn is_none(&self) -> bool {
        self.get().map_or(false, objects::is_none)
    }
}

impl From<Owned> for ForeignHandle {
    fn from(owned: Owned) -> Self {
        Self(Some(owned))
    }
}
