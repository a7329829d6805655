//! The buffer: key -> [`Entry`] map plus a live-entry count (spec.md §3).
//!
//! Grounded on `kvdb`'s `DatabaseWithCache` overlay/flushing maps, but
//! collapsed into a single map since this wrapper tracks per-entry dirty
//! state directly rather than swapping two generations of a write-only
//! overlay. The whole buffer sits behind one lock (spec.md §5's shared
//! resource policy: the mutex is held across insert/read/mutate/GC/flush
//! collection, never across driver I/O).

use std::collections::HashMap;

use serde_json::Value;

use crate::entry::Entry;

#[derive(Default)]
pub struct Buffer {
    entries: HashMap<String, Entry>,
}

impl Buffer {
    pub fn new() -> Self {
        Buffer { entries: HashMap::new() }
    }

    /// Number of live entries. Unlike the spec's source (which increments
    /// this counter on every `get`, including cache hits that insert
    /// nothing — spec.md §4.5's documented fragility point), this reflects
    /// true occupancy at all times by construction: it is simply the map's
    /// length.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Entry> {
        self.entries.get_mut(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert a freshly-read clean entry. Only called from the read path
    /// (spec.md §4.2 step 2) after a successful driver fetch and decode.
    pub fn insert_clean(&mut self, key: String, value: Option<Value>) {
        self.entries.insert(key, Entry::clean(value));
    }

    /// Locate or create a dirty entry for a write (spec.md §4.3).
    pub fn entry_for_write(&mut self, key: &str) -> &mut Entry {
        self.entries.entry(key.to_string()).or_insert_with(|| Entry::clean(None))
    }

    pub fn remove_entry(&mut self, key: &str) -> Option<Entry> {
        self.entries.remove(key)
    }

    /// All keys with a dirty entry, for the flush engine to enumerate in
    /// in a stable, deterministic order (spec.md §4.6 step 1).
    pub fn dirty_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> =
            self.entries.iter().filter(|(_, e)| e.dirty).map(|(k, _)| k.clone()).collect();
        keys.sort();
        keys
    }

    /// All keys with a clean (non-dirty) entry, for GC (spec.md §4.5 step 2).
    pub fn clean_keys(&self) -> Vec<String> {
        self.entries.iter().filter(|(_, e)| !e.dirty).map(|(k, _)| k.clone()).collect()
    }

    pub fn all_dirty(&self) -> bool {
        !self.entries.is_empty() && self.entries.values().all(|e| e.dirty)
    }
}
