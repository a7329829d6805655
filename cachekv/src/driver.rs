//! The minimal contract any backing store must satisfy (spec.md §4.1/§6).
//!
//! Modeled on `kvdb::KeyValueDB`: a narrow capability trait rather than the
//! source's dynamically-dispatched prototype object. Unlike `KeyValueDB`
//! this trait never decodes values — it moves raw strings only, and the
//! wrapper owns all JSON (de)serialization.

use std::sync::Arc;
use std::time::Duration;

use crate::error::DriverError;

/// One operation within an atomic [`Driver::do_bulk`] batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkOp {
    Set { key: String, value: String },
    Remove { key: String },
}

impl BulkOp {
    pub fn key(&self) -> &str {
        match self {
            BulkOp::Set { key, .. } => key,
            BulkOp::Remove { key } => key,
        }
    }
}

/// Settings a driver may suggest as defaults; any field the caller supplies
/// explicitly overrides these (spec.md §4.1, §6's `":memory:"` example).
#[derive(Debug, Clone, Copy, Default)]
pub struct DriverDefaults {
    pub cache: Option<usize>,
    pub write_interval: Option<Duration>,
    pub json: Option<bool>,
}

/// The six-operation backend contract (spec.md §4.1).
///
/// `get`/`set`/`remove` operate on raw strings only — the wrapper is the
/// only layer that knows about JSON. `do_bulk` is the critical operation:
/// it must apply its operations atomically and in the given order, or
/// document that it cannot (spec.md §6).
pub trait Driver: Send + Sync {
    /// Prepare storage. Called once before any other operation.
    fn init(&self) -> Result<(), DriverError> {
        Ok(())
    }

    /// Return the raw value for `key`, or `None` if absent. Never decodes.
    fn get(&self, key: &str) -> Result<Option<String>, DriverError>;

    /// Upsert a raw value.
    fn set(&self, key: &str, value: &str) -> Result<(), DriverError>;

    /// Delete a key. Deleting an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), DriverError>;

    /// Apply an ordered sequence of operations atomically.
    fn do_bulk(&self, ops: &[BulkOp]) -> Result<(), DriverError>;

    /// Release resources. Called once; no further operations follow.
    fn close(&self) -> Result<(), DriverError> {
        Ok(())
    }

    /// Defaults this driver would like applied when the caller doesn't
    /// specify a setting explicitly. The built-in fallback (spec.md §4.1)
    /// applies only where neither the caller nor the driver opine.
    fn default_settings(&self) -> DriverDefaults {
        DriverDefaults::default()
    }
}

/// Lets a shared driver handle (`Arc<D>`) be used directly as a `Driver`,
/// so callers can keep a handle to assert against a test driver's inner
/// state, or share one driver across stores, without a wrapper newtype.
impl<T: Driver + ?Sized> Driver for Arc<T> {
    fn init(&self) -> Result<(), DriverError> {
        (**self).init()
    }
    fn get(&self, key: &str) -> Result<Option<String>, DriverError> {
        (**self).get(key)
    }
    fn set(&self, key: &str, value: &str) -> Result<(), DriverError> {
        (**self).set(key, value)
    }
    fn remove(&self, key: &str) -> Result<(), DriverError> {
        (**self).remove(key)
    }
    fn do_bulk(&self, ops: &[BulkOp]) -> Result<(), DriverError> {
        (**self).do_bulk(ops)
    }
    fn close(&self) -> Result<(), DriverError> {
        (**self).close()
    }
    fn default_settings(&self) -> DriverDefaults {
        (**self).default_settings()
    }
}
