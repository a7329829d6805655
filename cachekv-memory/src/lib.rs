//! An in-memory [`cachekv::Driver`], for tests and ephemeral use.
//!
//! Grounded on `kvdb-memorydb::InMemory`: a single lock-guarded map, no
//! column families, not particularly optimized — intended for tests, not
//! production workloads.

use std::collections::BTreeMap;

use cachekv::{BulkOp, Driver, DriverDefaults, DriverError};
use parking_lot::RwLock;

/// A driver backed by an in-memory `BTreeMap`. Every operation round-trips
/// through a single `RwLock`.
#[derive(Default)]
pub struct InMemory {
    data: RwLock<BTreeMap<String, String>>,
}

/// Create a fresh, empty in-memory driver.
pub fn create() -> InMemory {
    InMemory::default()
}

impl Driver for InMemory {
    fn get(&self, key: &str) -> Result<Option<String>, DriverError> {
        Ok(self.data.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), DriverError> {
        self.data.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), DriverError> {
        self.data.write().remove(key);
        Ok(())
    }

    fn do_bulk(&self, ops: &[BulkOp]) -> Result<(), DriverError> {
        let mut data = self.data.write();
        for op in ops {
            match op {
                BulkOp::Set { key, value } => {
                    data.insert(key.clone(), value.clone());
                }
                BulkOp::Remove { key } => {
                    data.remove(key);
                }
            }
        }
        Ok(())
    }

    /// An in-memory driver has no reason to buffer or cache on top of
    /// itself — every operation is already as cheap as it gets — so it
    /// suggests going straight through by default. Callers opening a
    /// `CacheKv` explicitly for buffering behavior (as the shared
    /// conformance tests do) override this.
    fn default_settings(&self) -> DriverDefaults {
        DriverDefaults { cache: Some(0), write_interval: Some(std::time::Duration::ZERO), json: Some(true) }
    }
}

#[cfg(test)]
mod tests {
    use cachekv_shared_tests::{driver, wrapper};

    use super::create;

    #[test]
    fn set_and_get() {
        driver::test_set_and_get(&create());
    }

    #[test]
    fn remove_missing_key_is_not_an_error() {
        driver::test_remove_missing_key_is_not_an_error(&create());
    }

    #[test]
    fn set_then_remove_then_get() {
        driver::test_set_then_remove_then_get(&create());
    }

    #[test]
    fn get_missing_key() {
        driver::test_get_missing_key(&create());
    }

    #[test]
    fn do_bulk_applies_all_ops_in_order() {
        driver::test_do_bulk_applies_all_ops_in_order(&create());
    }

    #[test]
    fn do_bulk_empty_is_a_noop() {
        driver::test_do_bulk_empty_is_a_noop(&create());
    }

    #[test]
    fn read_your_writes() {
        wrapper::test_read_your_writes(create);
    }

    #[test]
    fn json_round_trip_after_flush() {
        wrapper::test_json_round_trip_after_flush(create);
    }

    #[test]
    fn subtree_round_trip() {
        wrapper::test_subtree_round_trip(create);
    }

    #[test]
    fn remove_through_wrapper() {
        wrapper::test_remove_through_wrapper(create);
    }
}
