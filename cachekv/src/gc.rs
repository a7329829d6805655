//! Cache eviction sweep (spec.md §4.5).
//!
//! Invoked after every buffer insertion or mutation. Evicts the oldest
//! half of the *clean* entries once the buffer reaches its watermark; if
//! every resident entry is dirty, it cannot evict anything without losing
//! data, so it asks the caller to flush first and sweep again.

use std::time::Instant;

use crate::buffer::Buffer;

/// Result of one GC sweep. `NeedsFlush` means the caller must run a flush
/// and then sweep again — GC never evicts a dirty entry (spec.md
/// invariant 1).
pub enum GcOutcome {
    NotNeeded,
    Evicted(Vec<String>),
    NeedsFlush,
}

pub fn sweep(buffer: &mut Buffer, cache: usize) -> GcOutcome {
    if cache == 0 || buffer.len() < cache {
        return GcOutcome::NotNeeded;
    }

    let mut clean: Vec<(String, Instant)> = buffer
        .clean_keys()
        .into_iter()
        .filter_map(|key| buffer.get(&key).map(|e| (key, e.touched_at)))
        .collect();

    if clean.is_empty() {
        return GcOutcome::NeedsFlush;
    }

    clean.sort_by_key(|(_, touched_at)| *touched_at);
    let evict_count = (cache / 2).min(clean.len());
    let victims: Vec<String> = clean.into_iter().take(evict_count).map(|(key, _)| key).collect();
    for key in &victims {
        buffer.remove_entry(key);
    }
    GcOutcome::Evicted(victims)
}
