//! In-memory entry records (spec.md §3 "Entry").

use std::time::Instant;

use serde_json::Value;

use crate::error::CacheKvError;

/// Completion handle queued on an entry and fired exactly once when the
/// mutation it belongs to has been acknowledged (or failed) by the backend.
///
/// Spec.md's source uses per-entry callback arrays; this is that pattern
/// translated directly into a queue of boxed closures rather than
/// introduced oneshot channels, since callers that want completion as a
/// future can trivially wrap one in a closure that sends on it.
pub type Callback = Box<dyn FnOnce(Result<(), CacheKvError>) + Send>;

/// A single buffer-resident key.
///
/// `value: None` is the "deleted" sentinel (spec.md §3, §4.3): a pending
/// `remove` still occupies an entry (so GC never evicts it while dirty) but
/// carries no payload.
pub struct Entry {
    pub value: Option<Value>,
    pub dirty: bool,
    pub touched_at: Instant,
    pub pending: Vec<Callback>,
}

impl Entry {
    pub fn clean(value: Option<Value>) -> Self {
        Entry { value, dirty: false, touched_at: Instant::now(), pending: Vec::new() }
    }

    pub fn touch(&mut self) {
        self.touched_at = Instant::now();
    }

    pub fn mark_dirty(&mut self, value: Option<Value>) {
        self.value = value;
        self.dirty = true;
        self.touch();
    }

    /// Drain this entry's callback queue and clear its dirty flag, as the
    /// flush engine does for every dirty entry it collects (spec.md §4.6
    /// step 1).
    pub fn take_for_flush(&mut self) -> Vec<Callback> {
        self.dirty = false;
        std::mem::take(&mut self.pending)
    }
}
