//! Owned references - RAII over the heap's reference counts
//!
//! Every runtime API that hands out a new reference returns an `Owned`.
//! Cloning increments, dropping decrements, so no call site balances counts
//! by hand.

use core::fmt;
use core::marker::PhantomData;

use crate::heap;
use crate::objects::ObjRef;

/// One strong reference to a heap object
///
/// Not `Send`: objects belong to the heap of the thread that created them.
pub struct Owned {
    raw: ObjRef,
    _not_send: PhantomData<*const ()>,
}

impl Owned {
    /// Take over a reference the caller already owns (no increment)
    #[inline]
    pub fn from_raw(raw: ObjRef) -> Self {
        Self {
            raw,
            _not_send: PhantomData,
        }
    }

    /// Create a new strong reference to a borrowed object (increments)
    #[inline]
    pub fn from_borrowed(raw: ObjRef) -> Self {
        heap::incref(raw);
        Self::from_raw(raw)
    }

    /// The referenced object, still owned by `self`
    #[inline]
    pub fn raw(&self) -> ObjRef {
        self.raw
    }

    /// Convert to the raw reference without decrementing
    #[inline]
    pub fn into_raw(self) -> ObjRef {
        let raw = self.raw;
        core::mem::forget(self);
        raw
    }
}

impl Clone for Owned {
    #[inline]
    fn clone(&self) -> Self {
        Self::from_borrowed(self.raw)
    }
}

impl Drop for Owned {
    #[inline]
    fn drop(&mut self) {
        heap::decref(self.raw);
    }
}

impl PartialEq for Owned {
    /// Identity comparison
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for Owned {}

impl fmt::Debug for Owned {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Owned({})", self.raw.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::refcount;
    use crate::objects;

    #[test]
    fn test_clone_and_drop() {
        let a = objects::new_str("x");
        let raw = a.raw();
        let b = a.clone();
        assert_eq!(refcount(raw), 2);
        drop(a);
        assert_eq!(refcount(raw), 1);
        drop(b);
    }

    #[test]
    fn test_into_raw_and_back() {
        let a = objects::new_str("y");
        let raw = a.into_raw();
        assert_eq!(refcount(raw), 1);
        let back = Owned::from_raw(raw);
        assert_eq!(refcount(back.raw()), 1);
    }

    #[test]
    fn test_from_borrowed_increments() {
        let a = objects::new_str("z");
        let b = Owned::from_borrowed(a.raw());
        assert_eq!(refcount(a.raw()), 2);
        assert_eq!(a, b);
    }
}
