//! Write coalescer / flush engine (spec.md §4.6).
//!
//! One flush cycle has two phases: `collect`, which walks the buffer under
//! its lock and never touches the driver, and `apply`, which submits the
//! collected batch to the driver and fans the result back to every queued
//! callback. Splitting them this way keeps driver I/O entirely outside the
//! buffer's lock, as spec.md §5 requires.

use serde_json::Value;

use crate::buffer::Buffer;
use crate::driver::{BulkOp, Driver};
use crate::entry::Callback;
use crate::error::{encode_error, CacheKvError};

pub struct FlushJob {
    pub ops: Vec<BulkOp>,
    pub callbacks: Vec<Callback>,
}

/// Phase 1: encode every dirty entry's value, without mutating anything.
/// Phase 2 only runs once every entry has encoded successfully, so an
/// encode failure leaves every dirty entry untouched — still dirty, still
/// queued — rather than losing a write the way a clear-then-fail ordering
/// would (spec.md §4.6's ordering guarantee is about driver failures after
/// commit; this extends the same "never lose an un-acked write" spirit to
/// encode failures, which the driver never even sees).
pub fn collect(buffer: &mut Buffer, json: bool) -> Result<FlushJob, CacheKvError> {
    let keys = buffer.dirty_keys();

    let mut encoded: Vec<(String, Option<String>)> = Vec::with_capacity(keys.len());
    for key in &keys {
        let entry = buffer.get(key).expect("dirty key must be resident in the buffer");
        let raw = match &entry.value {
            None => None,
            Some(Value::String(s)) if !json => Some(s.clone()),
            Some(v) if json => Some(serde_json::to_string(v).map_err(|e| encode_error(key, e))?),
            Some(_) => return Err(CacheKvError::JsonDisabled),
        };
        encoded.push((key.clone(), raw));
    }

    let mut ops = Vec::with_capacity(encoded.len());
    let mut callbacks = Vec::new();
    for (key, raw) in encoded {
        if let Some(entry) = buffer.get_mut(&key) {
            callbacks.extend(entry.take_for_flush());
        }
        ops.push(match raw {
            None => BulkOp::Remove { key },
            Some(value) => BulkOp::Set { key, value },
        });
    }

    Ok(FlushJob { ops, callbacks })
}

/// Phase 2: submit the batch (if non-empty) and fan the result back to
/// every queued callback, in collection order (spec.md §4.6 steps 2-3).
pub fn apply(driver: &dyn Driver, job: FlushJob) -> Result<(), CacheKvError> {
    if job.ops.is_empty() {
        for cb in job.callbacks {
            cb(Ok(()));
        }
        return Ok(());
    }

    let result = driver.do_bulk(&job.ops).map_err(CacheKvError::Driver);
    for cb in job.callbacks {
        cb(result.clone());
    }
    result
}
