//! Scenario tests straight out of spec.md §8, run against an in-process
//! mock driver so this crate's tests don't depend on either shipped driver
//! crate.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;

use crate::driver::{BulkOp, Driver, DriverDefaults};
use crate::error::{CacheKvError, DriverError};
use crate::settings::SettingsOverride;
use crate::CacheKv;

#[derive(Default)]
struct MockDriver {
    data: Mutex<std::collections::BTreeMap<String, String>>,
    bulk_calls: AtomicUsize,
    fail_next_bulk: Mutex<Option<String>>,
}

impl MockDriver {
    fn bulk_call_count(&self) -> usize {
        self.bulk_calls.load(Ordering::SeqCst)
    }

    fn fail_next_bulk_with(&self, message: &str) {
        *self.fail_next_bulk.lock().unwrap() = Some(message.to_string());
    }
}

impl Driver for MockDriver {
    fn get(&self, key: &str) -> Result<Option<String>, DriverError> {
        Ok(self.data.lock().unwrap().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), DriverError> {
        self.data.lock().unwrap().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), DriverError> {
        self.data.lock().unwrap().remove(key);
        Ok(())
    }

    fn do_bulk(&self, ops: &[BulkOp]) -> Result<(), DriverError> {
        self.bulk_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.fail_next_bulk.lock().unwrap().take() {
            return Err(DriverError::new(message));
        }
        let mut data = self.data.lock().unwrap();
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

    fn default_settings(&self) -> DriverDefaults {
        DriverDefaults { cache: Some(0), write_interval: Some(Duration::ZERO), json: Some(true) }
    }
}

fn open_buffered(driver: Arc<MockDriver>, cache: usize, write_interval: Duration) -> CacheKv<Arc<MockDriver>> {
    CacheKv::open(driver, SettingsOverride::new().cache(cache).write_interval(write_interval)).unwrap()
}

#[test]
fn scenario_1_set_then_get_is_served_from_buffer_before_any_flush() {
    let driver = Arc::new(MockDriver::default());
    let store = open_buffered(driver.clone(), 100, Duration::from_secs(3600));

    store.set("a", json!({"x": 1}), None).unwrap();
    let value: serde_json::Value = store.get("a").unwrap().unwrap();
    assert_eq!(value, json!({"x": 1}));
    assert_eq!(driver.bulk_call_count(), 0, "buffered set must not hit the driver before a flush");
}

#[test]
fn scenario_2_repeated_sets_coalesce_into_one_bulk_set() {
    let driver = Arc::new(MockDriver::default());
    let store = open_buffered(driver.clone(), 100, Duration::from_secs(3600));

    let fired = Arc::new(Mutex::new(Vec::new()));
    for v in [1, 2, 3] {
        let fired = fired.clone();
        store
            .set(
                "a",
                json!(v),
                Some(Box::new(move |result| fired.lock().unwrap().push(result))),
            )
            .unwrap();
    }

    store.flush().unwrap();

    assert_eq!(driver.bulk_call_count(), 1);
    assert_eq!(driver.get("a").unwrap(), Some("3".to_string()));
    let fired = fired.lock().unwrap();
    assert_eq!(fired.len(), 3, "every queued callback fires exactly once");
    assert!(fired.iter().all(|r| r.is_ok()));
}

#[test]
fn scenario_3_set_then_remove_flushes_a_single_remove_op() {
    let driver = Arc::new(MockDriver::default());
    let store = open_buffered(driver.clone(), 100, Duration::from_secs(3600));

    store.set("a", json!(1), None).unwrap();
    store.remove("a", None).unwrap();
    store.flush().unwrap();

    assert_eq!(driver.bulk_call_count(), 1);
    assert_eq!(driver.get("a").unwrap(), None);
}

#[test]
fn scenario_4_gc_evicts_oldest_clean_entries_past_the_watermark() {
    let driver = Arc::new(MockDriver::default());
    driver.set("x", "\"X\"").unwrap();
    driver.set("y", "\"Y\"").unwrap();
    driver.set("z", "\"Z\"").unwrap();
    let store = open_buffered(driver.clone(), 2, Duration::ZERO);

    let _: String = store.get("x").unwrap().unwrap();
    let _: String = store.get("y").unwrap().unwrap();
    let _: String = store.get("z").unwrap().unwrap();

    assert!(store.buffer_len() <= 2 / 2 + 1);
    // The oldest (by touch time) clean entry was evicted first.
    assert!(store.buffer_len() < 3);
}

#[test]
fn scenario_5_set_sub_rewrites_one_field_of_the_whole_value() {
    let driver = Arc::new(MockDriver::default());
    let store = open_buffered(driver.clone(), 100, Duration::from_secs(3600));

    store.set("k", json!({"a": {"b": 1, "c": 2}}), None).unwrap();
    store.set_sub("k", &["a", "b"], 42, None).unwrap();
    store.flush().unwrap();

    let stored = driver.get("k").unwrap().unwrap();
    let stored: serde_json::Value = serde_json::from_str(&stored).unwrap();
    assert_eq!(stored, json!({"a": {"b": 42, "c": 2}}));
}

#[test]
fn scenario_6_default_callback_logs_but_does_not_panic_on_bulk_failure() {
    let driver = Arc::new(MockDriver::default());
    let store = open_buffered(driver.clone(), 100, Duration::from_secs(3600));

    driver.fail_next_bulk_with("disk full");
    store.set("a", json!({"x": 1}), None).unwrap();
    let result = store.flush();

    assert!(result.is_err());
}

#[test]
fn idempotent_flush_second_call_is_a_no_op() {
    let driver = Arc::new(MockDriver::default());
    let store = open_buffered(driver.clone(), 100, Duration::from_secs(3600));

    store.set("a", json!(1), None).unwrap();
    store.flush().unwrap();
    assert_eq!(driver.bulk_call_count(), 1);

    store.flush().unwrap();
    assert_eq!(driver.bulk_call_count(), 1, "a flush with nothing dirty must not call do_bulk again");
}

#[test]
fn boundary_cache_zero_write_interval_zero_goes_straight_through() {
    let driver = Arc::new(MockDriver::default());
    let store = open_buffered(driver.clone(), 0, Duration::ZERO);

    store.set("a", json!(1), None).unwrap();
    assert_eq!(driver.get("a").unwrap(), Some("1".to_string()));
    assert_eq!(store.buffer_len(), 0, "buffer must stay empty when cache=0 and write_interval=0");
}

#[test]
fn boundary_write_interval_zero_remove_calls_driver_remove_not_set() {
    let driver = Arc::new(MockDriver::default());
    driver.set("a", "1").unwrap();
    let store = open_buffered(driver.clone(), 0, Duration::ZERO);

    store.remove("a", None).unwrap();
    assert_eq!(driver.get("a").unwrap(), None);
}

#[test]
fn boundary_set_sub_missing_prefix_fails_without_mutating_stored_value() {
    let driver = Arc::new(MockDriver::default());
    let store = open_buffered(driver.clone(), 100, Duration::from_secs(3600));

    store.set("k", json!({"a": 1}), None).unwrap();
    let err = store.set_sub("k", &["missing", "b"], 42, None).unwrap_err();
    assert!(matches!(err, CacheKvError::SubvalueNotFound { .. }));

    let value: serde_json::Value = store.get("k").unwrap().unwrap();
    assert_eq!(value, json!({"a": 1}), "a failed set_sub must not touch the stored value");
}

#[test]
fn read_your_writes_holds_when_write_interval_is_zero_but_cache_is_not() {
    // cache > 0 and write_interval == 0 are independent settings: a `get`
    // can populate a clean cache entry, then a direct `set` (which bypasses
    // the buffer entirely) must still be visible to the next `get`.
    let driver = Arc::new(MockDriver::default());
    driver.set("a", "1").unwrap();
    let store = open_buffered(driver.clone(), 100, Duration::ZERO);

    let first: i64 = store.get("a").unwrap().unwrap();
    assert_eq!(first, 1, "primes a clean cache entry for \"a\"");

    store.set("a", json!(2), None).unwrap();
    assert_eq!(driver.get("a").unwrap(), Some("2".to_string()), "write-through reached the driver");

    let second: i64 = store.get("a").unwrap().unwrap();
    assert_eq!(second, 2, "stale cached entry must not shadow the write-through");
}

#[test]
fn read_your_writes_holds_even_with_a_long_flush_interval() {
    let driver = Arc::new(MockDriver::default());
    let store = open_buffered(driver, 100, Duration::from_secs(3600));

    store.set("a", json!("first"), None).unwrap();
    store.set("a", json!("second"), None).unwrap();
    let value: String = store.get("a").unwrap().unwrap();
    assert_eq!(value, "second");
}
