//! Object store - foreign objects held on behalf of the host
//!
//! Entries are keyed by foreign object identity. Each entry keeps one
//! strong reference plus a host-side count of outstanding handles; the
//! reference is released when the count drops to zero.
//!
//! Puts made between `checkpoint` and `rollback` are undone together, so a
//! conversion that fails partway leaves the store as it found it.

use std::collections::BTreeMap;

use pythonic_runtime::builtins;
use pythonic_runtime::objects;
use serde::Serialize;

use crate::errors::{ConvResult, ConversionError};
use crate::handle::ForeignHandle;
use crate::logging::log_store;

#[derive(Debug)]
struct StoreEntry {
    count: usize,
    object: ForeignHandle,
}

/// One row of a store listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreEntryInfo {
    pub key: u64,
    pub count: usize,
    pub type_name: String,
    pub repr: String,
}

#[derive(Debug)]
pub struct ObjectStore {
    entries: BTreeMap<u64, StoreEntry>,
    repr_width: usize,
    /// Keys put while a checkpoint is open, oldest first
    journal: Vec<u64>,
    open_checkpoints: usize,
}

/// Journal position returned by `ObjectStore::checkpoint`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct Checkpoint(usize);

impl Default for ObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore {
    pub fn new() -> Self {
        Self::with_repr_width(20)
    }

    pub fn with_repr_width(repr_width: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            repr_width,
            journal: Vec::new(),
            open_checkpoints: 0,
        }
    }

    /// Store `object` and return its key
    ///
    /// Storing an object that is already present increments its count and
    /// drops the extra reference.
    pub fn put(&mut self, object: ForeignHandle) -> ConvResult<u64> {
        let raw = object
            .get()
            .ok_or_else(|| ConversionError::object_convert("cannot store a null object"))?;
        let key = raw.id();
        let entry = self
            .entries
            .entry(key)
            .or_insert(StoreEntry { count: 0, object });
        entry.count += 1;
        log_store("put", key, entry.count);
        if self.open_checkpoints > 0 {
            self.journal.push(key);
        }
        Ok(key)
    }

    /// Hand out a new reference to the object under `key`, counting it
    pub fn get(&mut self, key: u64) -> Option<ForeignHandle> {
        let entry = self.entries.get_mut(&key)?;
        entry.count += 1;
        log_store("get", key, entry.count);
        Some(entry.object.clone())
    }

    /// The object under `key` without touching its count
    pub fn lookup(&self, key: u64) -> Option<ForeignHandle> {
        self.entries.get(&key).map(|entry| entry.object.clone())
    }

    /// Decrement the count under `key`, releasing the object at zero
    ///
    /// Returns false for an unknown key.
    pub fn drop_ref(&mut self, key: u64) -> bool {
        let Some(entry) = self.entries.get_mut(&key) else {
            return false;
        };
        debug_assert!(entry.count > 0, "stored entry {key} has a zero count");
        entry.count = entry.count.saturating_sub(1);
        log_store("drop", key, entry.count);
        if entry.count == 0 {
            self.entries.remove(&key);
        }
        true
    }

    /// Start recording puts; pair with `commit` or `rollback`
    ///
    /// Checkpoints nest. An inner commit keeps its puts in the journal so an
    /// outer rollback still undoes them.
    pub fn checkpoint(&mut self) -> Checkpoint {
        self.open_checkpoints += 1;
        Checkpoint(self.journal.len())
    }

    /// Keep every put made since `checkpoint`
    pub fn commit(&mut self, checkpoint: Checkpoint) {
        debug_assert!(checkpoint.0 <= self.journal.len());
        self.close_checkpoint();
    }

    /// Undo every put made since `checkpoint`, newest first
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        let undone = self.journal.split_off(checkpoint.0.min(self.journal.len()));
        for key in undone.iter().rev() {
            self.drop_ref(*key);
        }
        if !undone.is_empty() {
            tracing::debug!(target: "pythonic::store", undone = undone.len(), "object store rolled back");
        }
        self.close_checkpoint();
    }

    fn close_checkpoint(&mut self) {
        self.open_checkpoints = self.open_checkpoints.saturating_sub(1);
        if self.open_checkpoints == 0 {
            self.journal.clear();
        }
    }

    /// Release every stored object
    pub fn clear(&mut self) {
        let released = self.entries.len();
        self.entries.clear();
        self.journal.clear();
        tracing::debug!(target: "pythonic::store", released, "object store cleared");
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: u64) -> bool {
        self.entries.contains_key(&key)
    }

    /// Outstanding handle count under `key`
    pub fn count(&self, key: u64) -> Option<usize> {
        self.entries.get(&key).map(|entry| entry.count)
    }

    /// Every entry in key order, with its type name and a truncated `str()`
    pub fn list(&self) -> Vec<StoreEntryInfo> {
        self.entries
            .iter()
            .map(|(&key, entry)| {
                let (type_name, repr) = match entry.object.get() {
                    Some(obj) => (
                        objects::type_name(obj).to_string(),
                        builtins::to_str(obj).unwrap_or_else(|_| {
                            pythonic_runtime::err::clear();
                            String::from("<unprintable>")
                        }),
                    ),
                    None => (String::from("NULL"), String::new()),
                };
                StoreEntryInfo {
                    key,
                    count: entry.count,
                    type_name,
                    repr: truncate(&repr, self.repr_width),
                }
            })
            .collect()
    }

    /// `list` as a JSON array
    pub fn list_json(&self) -> ConvResult<String> {
        serde_json::to_string(&self.list()).map_err(|error| {
            tracing::warn!(target: "pythonic::store", %error, "object store listing is not serializable");
            ConversionError::host(format!("unable to serialize object store listing: {error}"))
        })
    }

    /// `list` as an aligned text table
    pub fn render(&self) -> String {
        let mut out = format!(
            "{:>20}  {:>5}  {:<12}  {}\n",
            "key", "count", "type", "value"
        );
        for info in self.list() {
            out.push_str(&format!(
                "{:>20}  {:>5}  {:<12}  {}\n",
                info.key, info.count, info.type_name, info.repr
            ));
        }
        out
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut short: String = text.chars().take(width.saturating_sub(3)).collect();
    short.push_str("...");
    short
}

#[cfg(test)]
mod tests {
    use super::*;
    use pythonic_runtime::refcount;

    #[test]
    fn test_put_twice_counts() {
        let mut store = ObjectStore::new();
        let obj = objects::new_list(Vec::new());
        let base = refcount(obj.raw());

        let key = store.put(ForeignHandle::borrowed(obj.raw())).unwrap();
        assert_eq!(store.put(ForeignHandle::borrowed(obj.raw())).unwrap(), key);
        assert_eq!(store.count(key), Some(2));
        assert_eq!(refcount(obj.raw()), base + 1);

        assert!(store.drop_ref(key));
        assert_eq!(store.count(key), Some(1));
        assert!(store.drop_ref(key));
        assert!(!store.contains(key));
        assert_eq!(refcount(obj.raw()), base);
        assert!(!store.drop_ref(key));
    }

    #[test]
    fn test_get_and_lookup() {
        let mut store = ObjectStore::new();
        let key = store.put(objects::new_dict().into()).unwrap();

        let handle = store.lookup(key).unwrap();
        assert_eq!(store.count(key), Some(1));
        assert_eq!(handle.get().map(|obj| obj.id()), Some(key));

        store.get(key).unwrap();
        assert_eq!(store.count(key), Some(2));
    }

    #[test]
    fn test_null_rejected() {
        let mut store = ObjectStore::new();
        assert!(store.put(ForeignHandle::empty()).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_listing_truncates() {
        let mut store = ObjectStore::new();
        let long = store.put(objects::new_str("abcdefghijklmnopqrstuvwxyz").into()).unwrap();
        let short = store.put(objects::new_str("twenty characters ok").into()).unwrap();

        let listing = store.list();
        let long_row = listing.iter().find(|row| row.key == long).unwrap();
        assert_eq!(long_row.type_name, "str");
        assert_eq!(long_row.repr, "abcdefghijklmnopq...");
        let short_row = listing.iter().find(|row| row.key == short).unwrap();
        assert_eq!(short_row.repr, "twenty characters ok");

        assert!(store.list_json().unwrap().contains("\"type_name\":\"str\""));
        assert!(store.render().starts_with(&format!("{:>20}", "key")));
    }

    #[test]
    fn test_rollback_undoes_puts_since_checkpoint() {
        let mut store = ObjectStore::new();
        let kept = store.put(objects::new_dict().into()).unwrap();

        let checkpoint = store.checkpoint();
        let fresh = store.put(objects::new_list(Vec::new()).into()).unwrap();
        let again = store.lookup(kept).unwrap();
        store.put(again).unwrap();
        assert_eq!(store.count(kept), Some(2));
        store.rollback(checkpoint);

        assert!(!store.contains(fresh));
        assert_eq!(store.count(kept), Some(1));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_nested_commit_is_undone_by_outer_rollback() {
        let mut store = ObjectStore::new();
        let outer = store.checkpoint();
        let inner = store.checkpoint();
        let key = store.put(objects::new_dict().into()).unwrap();
        store.commit(inner);
        assert!(store.contains(key));
        store.rollback(outer);
        assert!(store.is_empty());

        let checkpoint = store.checkpoint();
        let key = store.put(objects::new_dict().into()).unwrap();
        store.commit(checkpoint);
        let checkpoint = store.checkpoint();
        store.rollback(checkpoint);
        assert!(store.contains(key));
    }

    #[test]
    fn test_clear_releases() {
        let mut store = ObjectStore::new();
        let obj = objects::new_list(Vec::new());
        let base = refcount(obj.raw());
        store.put(ForeignHandle::borrowed(obj.raw())).unwrap();
        store.clear();
        assert!(store.is_empty());
        assert_eq!(refcount(obj.raw()), base);
    }
}
