//! Shared tests for `cachekv` functionality, to be executed against actual
//! driver implementations.
//!
//! Grounded on `kvdb-shared-tests`: a library of plain functions, each
//! exercising one property, that every driver crate's own `#[cfg(test)]`
//! module calls against its concrete driver. `driver` holds raw,
//! string-level conformance tests for [`cachekv::Driver`] implementations;
//! `wrapper` holds tests of the full `CacheKv` wrapper built on top of one.

use std::time::Duration;

use cachekv::{BulkOp, CacheKv, Driver, SettingsOverride};

/// Raw driver-level conformance tests (spec.md §4.1 / §6).
pub mod driver {
    use super::*;

    /// A basic set-then-get round-trips.
    pub fn test_set_and_get(db: &dyn Driver) {
        db.set("key1", "horse").unwrap();
        assert_eq!(db.get("key1").unwrap().as_deref(), Some("horse"));
    }

    /// Deleting an absent key is not an error (spec.md §4.1).
    pub fn test_remove_missing_key_is_not_an_error(db: &dyn Driver) {
        assert!(db.remove("does-not-exist").is_ok());
    }

    /// A removed key reads back as absent.
    pub fn test_set_then_remove_then_get(db: &dyn Driver) {
        db.set("key1", "horse").unwrap();
        db.remove("key1").unwrap();
        assert_eq!(db.get("key1").unwrap(), None);
    }

    /// A missing key reads back as `None`, not an error.
    pub fn test_get_missing_key(db: &dyn Driver) {
        assert_eq!(db.get("never-set").unwrap(), None);
    }

    /// `do_bulk` applies every operation, in order.
    pub fn test_do_bulk_applies_all_ops_in_order(db: &dyn Driver) {
        db.set("a", "0").unwrap();
        db.do_bulk(&[
            BulkOp::Set { key: "a".into(), value: "1".into() },
            BulkOp::Set { key: "b".into(), value: "2".into() },
            BulkOp::Remove { key: "a".into() },
        ])
        .unwrap();
        assert_eq!(db.get("a").unwrap(), None, "later op in the same batch wins");
        assert_eq!(db.get("b").unwrap().as_deref(), Some("2"));
    }

    /// An empty bulk batch is a harmless no-op.
    pub fn test_do_bulk_empty_is_a_noop(db: &dyn Driver) {
        db.set("a", "1").unwrap();
        db.do_bulk(&[]).unwrap();
        assert_eq!(db.get("a").unwrap().as_deref(), Some("1"));
    }
}

/// Wrapper-level conformance tests against a fresh `CacheKv<D>` (spec.md
/// §8's universal properties and boundary behaviors), parameterized over a
/// driver factory so each backend's test module can supply its own way of
/// constructing a fresh instance.
pub mod wrapper {
    use super::*;

    fn open<D: Driver + 'static>(make_driver: impl FnOnce() -> D) -> CacheKv<D> {
        CacheKv::open(
            make_driver(),
            SettingsOverride::new().cache(1000).write_interval(Duration::from_secs(3600)),
        )
        .expect("store should open over a freshly constructed driver")
    }

    /// Read-your-writes: a `get` right after a `set` observes the write,
    /// even though nothing has flushed yet.
    pub fn test_read_your_writes<D: Driver + 'static>(make_driver: impl FnOnce() -> D) {
        let store = open(make_driver);
        store.set("a", serde_json::json!({"x": 1}), None).unwrap();
        let value: serde_json::Value = store.get("a").unwrap().unwrap();
        assert_eq!(value, serde_json::json!({"x": 1}));
    }

    /// JSON round-trip: set, flush, get returns a deep-equal value.
    pub fn test_json_round_trip_after_flush<D: Driver + 'static>(make_driver: impl FnOnce() -> D) {
        let store = open(make_driver);
        let original = serde_json::json!({"nested": [1, 2, 3], "name": "alpha"});
        store.set("k", original.clone(), None).unwrap();
        store.flush().unwrap();
        let value: serde_json::Value = store.get("k").unwrap().unwrap();
        assert_eq!(value, original);
    }

    /// Subtree round-trip: `set_sub` then `get_sub` on the same path.
    pub fn test_subtree_round_trip<D: Driver + 'static>(make_driver: impl FnOnce() -> D) {
        let store = open(make_driver);
        store.set("k", serde_json::json!({"a": {"b": 1}}), None).unwrap();
        store.set_sub("k", &["a", "b"], 99, None).unwrap();
        let value: i64 = store.get_sub("k", &["a", "b"]).unwrap();
        assert_eq!(value, 99);
    }

    /// Removing through the wrapper is visible immediately, and after flush
    /// reaches the driver.
    pub fn test_remove_through_wrapper<D: Driver + 'static>(make_driver: impl FnOnce() -> D) {
        let store = open(make_driver);
        store.set("a", serde_json::json!(1), None).unwrap();
        store.remove("a", None).unwrap();
        let value: Option<i64> = store.get("a").unwrap();
        assert_eq!(value, None);
        store.flush().unwrap();
        let value: Option<i64> = store.get("a").unwrap();
        assert_eq!(value, None);
    }
}
