//! Object heap - slot storage with intrusive reference counts
//!
//! Design: one heap per native thread, owned by the thread-local
//! interpreter state:
//! - Slots are addressed by `ObjRef` (a plain index, never dereferenced raw)
//! - Builtin type objects occupy the first slots, followed by the
//!   `None`/`True`/`False` singletons; all of them are immortal
//! - Destruction is iterative: releasing a container pushes its children on
//!   a worklist instead of recursing
//!
//! Only the owning thread can reach its objects, which is the runtime's
//! equivalent of holding the interpreter lock.

use std::cell::RefCell;

use crate::logging::{log_object_free, log_object_new, trace};
use crate::objects::{ObjRef, Payload};
use crate::types::BuiltinType;

/// One heap slot
pub(crate) struct Slot {
    refcount: u32,
    immortal: bool,
    payload: Option<Payload>,
}

/// Raw pending exception triple (each present reference is counted)
#[derive(Clone, Copy)]
pub(crate) struct RawPending {
    pub ptype: ObjRef,
    pub pvalue: Option<ObjRef>,
    pub ptraceback: Option<ObjRef>,
}

/// Per-thread interpreter state
pub(crate) struct Interp {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
    /// Imported modules (`sys.modules`), each entry holds one reference
    pub(crate) modules: Vec<(String, ObjRef)>,
    /// Pending exception, if any
    pub(crate) pending: Option<RawPending>,
}

thread_local! {
    static INTERP: RefCell<Interp> = RefCell::new(Interp::new());
}

/// Slot index of the `None` singleton
pub(crate) const NONE_SLOT: u32 = BuiltinType::COUNT as u32;
/// Slot index of `True`
pub(crate) const TRUE_SLOT: u32 = NONE_SLOT + 1;
/// Slot index of `False`
pub(crate) const FALSE_SLOT: u32 = NONE_SLOT + 2;

impl Interp {
    fn new() -> Self {
        let mut slots = Vec::with_capacity(BuiltinType::COUNT + 64);

        for ty in BuiltinType::ALL {
            debug_assert_eq!(slots.len(), ty as usize);
            slots.push(Slot::immortal(Payload::Type(ty)));
        }
        slots.push(Slot::immortal(Payload::None));
        slots.push(Slot::immortal(Payload::Bool(true)));
        slots.push(Slot::immortal(Payload::Bool(false)));

        let live = slots.len();
        Self {
            slots,
            free: Vec::new(),
            live,
            modules: Vec::new(),
            pending: None,
        }
    }

    /// Allocate a new object with refcount 1
    pub(crate) fn alloc(&mut self, payload: Payload) -> ObjRef {
        let kind = payload.kind_name();
        let slot = Slot {
            refcount: 1,
            immortal: false,
            payload: Some(payload),
        };

        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index as usize] = slot;
                index
            }
            None => {
                self.slots.push(slot);
                (self.slots.len() - 1) as u32
            }
        };

        self.live += 1;
        let obj = ObjRef::from_index(index);
        log_object_new(obj.id(), kind);
        obj
    }

    #[inline]
    pub(crate) fn incref(&mut self, obj: ObjRef) {
        let slot = &mut self.slots[obj.index()];
        if slot.immortal {
            return;
        }
        debug_assert!(slot.payload.is_some(), "incref of freed object");
        slot.refcount += 1;
    }

    /// Decrement, destroying the object (and releasing its children) at zero
    pub(crate) fn decref(&mut self, obj: ObjRef) {
        let mut work = vec![obj];

        while let Some(obj) = work.pop() {
            let slot = &mut self.slots[obj.index()];
            if slot.immortal {
                continue;
            }

            debug_assert!(slot.refcount > 0, "refcount underflow");
            slot.refcount -= 1;
            if slot.refcount > 0 {
                continue;
            }

            if let Some(payload) = slot.payload.take() {
                payload.children(&mut work);
            }
            self.free.push(obj.index() as u32);
            self.live -= 1;
            log_object_free(obj.id());
        }
    }

    pub(crate) fn refcount(&self, obj: ObjRef) -> usize {
        let slot = &self.slots[obj.index()];
        if slot.immortal {
            usize::MAX
        } else {
            slot.refcount as usize
        }
    }

    #[inline]
    pub(crate) fn payload(&self, obj: ObjRef) -> &Payload {
        self.slots[obj.index()]
            .payload
            .as_ref()
            .expect("access to freed object")
    }

    #[inline]
    pub(crate) fn payload_mut(&mut self, obj: ObjRef) -> &mut Payload {
        self.slots[obj.index()]
            .payload
            .as_mut()
            .expect("access to freed object")
    }

    /// Take every module out of the registry (used by `cleanup`)
    pub(crate) fn take_modules(&mut self) -> Vec<ObjRef> {
        self.modules.drain(..).map(|(_, module)| module).collect()
    }
}

impl Slot {
    fn immortal(payload: Payload) -> Self {
        Self {
            refcount: 1,
            immortal: true,
            payload: Some(payload),
        }
    }
}

/// Run `f` with exclusive access to this thread's interpreter state
///
/// `f` must not call back into any function that itself accesses the heap.
#[inline]
pub(crate) fn with_interp<R>(f: impl FnOnce(&mut Interp) -> R) -> R {
    INTERP.with(|interp| f(&mut interp.borrow_mut()))
}

/// Read an object's payload
#[inline]
pub(crate) fn view<R>(obj: ObjRef, f: impl FnOnce(&Payload) -> R) -> R {
    with_interp(|interp| f(interp.payload(obj)))
}

/// Increment the reference count of `obj`
pub fn incref(obj: ObjRef) {
    with_interp(|interp| interp.incref(obj));
}

/// Decrement the reference count of `obj`
///
/// Tolerates thread teardown: once the interpreter state is gone every
/// object is gone with it, so late releases are ignored.
pub fn decref(obj: ObjRef) {
    let _ = INTERP.try_with(|interp| {
        if let Ok(mut interp) = interp.try_borrow_mut() {
            interp.decref(obj);
        } else {
            trace!(target: "heap", id = obj.id(), "decref skipped during heap access");
        }
    });
}

/// Current reference count (`usize::MAX` for immortal objects)
pub fn refcount(obj: ObjRef) -> usize {
    with_interp(|interp| interp.refcount(obj))
}

/// Number of live objects on this thread's heap, immortals included
pub fn live_objects() -> usize {
    with_interp(|interp| interp.live)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::{self, none};
    use crate::refcount::Owned;

    #[test]
    fn test_alloc_and_free() {
        let before = live_objects();
        let obj = objects::new_float(1.5);
        assert_eq!(live_objects(), before + 1);
        assert_eq!(refcount(obj.raw()), 1);
        drop(obj);
        assert_eq!(live_objects(), before);
    }

    #[test]
    fn test_slot_reuse() {
        let a = objects::new_float(1.0);
        let id = a.raw().id();
        drop(a);
        let b = objects::new_float(2.0);
        assert_eq!(b.raw().id(), id);
    }

    #[test]
    fn test_immortals_ignore_refcounting() {
        let n = none();
        incref(n);
        decref(n);
        decref(n);
        assert_eq!(refcount(n), usize::MAX);
        assert!(objects::is_none(n));
    }

    #[test]
    fn test_container_releases_children() {
        let before = live_objects();
        let item = objects::new_float(3.0);
        let item_ref = item.raw();
        let list = objects::new_list(vec![item.clone()]);
        assert_eq!(refcount(item_ref), 2);
        drop(item);
        assert_eq!(refcount(item_ref), 1);
        drop(list);
        assert_eq!(live_objects(), before);
    }

    #[test]
    fn test_deep_nesting_is_iterative() {
        let before = live_objects();
        let mut current: Owned = objects::new_tuple(Vec::new());
        for _ in 0..10_000 {
            current = objects::new_tuple(vec![current]);
        }
        drop(current);
        assert_eq!(live_objects(), before);
    }
}
