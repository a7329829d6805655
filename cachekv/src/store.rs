//! Public API and lifecycle (spec.md §4.2-§4.4, §4.7).
//!
//! Grounded on `kvdb::DatabaseWithCache`'s overlay/flushing split, but
//! restructured around a single per-entry dirty flag (§`entry`/§`buffer`)
//! instead of swapping two generations of a write-only map, and with a
//! background flush thread standing in for the source's global timer
//! (pattern grounded on `clawstore-core::trickle`'s periodic background
//! flush loop).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::buffer::Buffer;
use crate::driver::Driver;
use crate::entry::Callback;
use crate::error::{decode_error, encode_error, CacheKvError};
use crate::flush;
use crate::gc::{self, GcOutcome};
use crate::settings::{Settings, SettingsOverride};

struct Inner<D> {
    driver: D,
    settings: Settings,
    buffer: Mutex<Buffer>,
    closed: AtomicBool,
}

/// A buffered, cached key-value wrapper over a driver `D`.
///
/// `CacheKv` does not implement `Clone`; each store owns its buffer and
/// background flush thread outright. Wrap it in an `Arc` if you need to
/// share one store handle across threads.
pub struct CacheKv<D: Driver + 'static> {
    inner: Arc<Inner<D>>,
    flush_thread: Mutex<Option<FlushThreadHandle>>,
}

impl<D: Driver + 'static> CacheKv<D> {
    /// Open a store over `driver` with the given setting overrides
    /// (spec.md §4.7 "init"). Settings are frozen for the lifetime of the
    /// store: the driver's own defaults are applied first, then overridden
    /// by whatever the caller supplies here, then by the built-in
    /// fallback for anything still unset.
    pub fn open(driver: D, overrides: SettingsOverride) -> Result<Self, CacheKvError> {
        driver.init().map_err(CacheKvError::Driver)?;
        let settings = Settings::resolve(overrides, driver.default_settings());
        let inner = Arc::new(Inner {
            driver,
            settings,
            buffer: Mutex::new(Buffer::new()),
            closed: AtomicBool::new(false),
        });

        let flush_thread = if inner.settings.buffering_enabled() {
            Some(spawn_flush_thread(Arc::clone(&inner))?)
        } else {
            None
        };

        Ok(CacheKv { inner, flush_thread: Mutex::new(flush_thread) })
    }

    pub fn settings(&self) -> Settings {
        self.inner.settings
    }

    /// Number of entries currently resident in the buffer. Exposed mainly
    /// for tests exercising the GC boundary behaviors in spec.md §8.
    pub fn buffer_len(&self) -> usize {
        self.inner.buffer.lock().len()
    }

    /// Read path (spec.md §4.2).
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheKvError> {
        match self.get_json(key)? {
            None => Ok(None),
            Some(value) => serde_json::from_value(value).map(Some).map_err(|e| decode_error(key, e)),
        }
    }

    /// Read path for a raw, non-JSON-decoded string (only meaningful when
    /// the store was opened with `json: false`).
    pub fn get_raw(&self, key: &str) -> Result<Option<String>, CacheKvError> {
        if self.inner.settings.json {
            return Err(CacheKvError::JsonDisabled);
        }
        match self.get_json(key)? {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(_) => unreachable!("raw-mode entries are always Value::String"),
        }
    }

    fn get_json(&self, key: &str) -> Result<Option<Value>, CacheKvError> {
        self.ensure_open()?;

        {
            let mut buffer = self.inner.buffer.lock();
            if let Some(entry) = buffer.get_mut(key) {
                if self.inner.settings.cache > 0 || entry.dirty {
                    entry.touch();
                    return Ok(entry.value.clone());
                }
            }
        }

        let raw = self.inner.driver.get(key).map_err(CacheKvError::Driver)?;
        let decoded = match raw {
            None => None,
            Some(s) if self.inner.settings.json => {
                Some(serde_json::from_str(&s).map_err(|e| decode_error(key, e))?)
            }
            Some(s) => Some(Value::String(s)),
        };

        if self.inner.settings.cache > 0 {
            {
                let mut buffer = self.inner.buffer.lock();
                buffer.insert_clean(key.to_string(), decoded.clone());
            }
            run_gc(&self.inner);
        }

        Ok(decoded)
    }

    /// Write path (spec.md §4.3).
    pub fn set<T: Serialize>(&self, key: &str, value: T, cb: Option<Callback>) -> Result<(), CacheKvError> {
        self.ensure_open()?;
        if !self.inner.settings.json {
            return Err(CacheKvError::JsonDisabled);
        }
        let value = serde_json::to_value(value).map_err(|e| encode_error(key, e))?;
        self.write_value(key, Some(value), cb)
    }

    /// Write path for a raw, non-JSON-encoded string.
    pub fn set_raw(&self, key: &str, value: String, cb: Option<Callback>) -> Result<(), CacheKvError> {
        self.ensure_open()?;
        if self.inner.settings.json {
            return Err(CacheKvError::JsonDisabled);
        }
        self.write_value(key, Some(Value::String(value)), cb)
    }

    /// `remove(k, cb)` is exactly `set(k, null, cb)` (spec.md §4.3).
    pub fn remove(&self, key: &str, cb: Option<Callback>) -> Result<(), CacheKvError> {
        self.ensure_open()?;
        self.write_value(key, None, cb)
    }

    fn write_value(&self, key: &str, value: Option<Value>, cb: Option<Callback>) -> Result<(), CacheKvError> {
        if self.inner.settings.buffering_enabled() {
            {
                let mut buffer = self.inner.buffer.lock();
                let entry = buffer.entry_for_write(key);
                entry.mark_dirty(value);
                entry.pending.push(cb.unwrap_or_else(|| default_callback(key)));
            }
            run_gc(&self.inner);
            Ok(())
        } else {
            let result = write_through(&self.inner.driver, key, value.as_ref(), self.inner.settings.json);
            // `write_interval == 0` bypasses the buffer for the write itself, but a
            // prior `get` may have already cached a now-stale clean entry for this
            // key (cache > 0 and write_interval == 0 are independent settings).
            // Drop it so the next `get` reloads from the driver instead of serving
            // the value this write just replaced — spec.md invariant 4 (read-your-
            // writes) holds regardless of buffering.
            if result.is_ok() {
                self.inner.buffer.lock().remove_entry(key);
            }
            if let Some(cb) = cb {
                cb(result.clone());
            }
            result
        }
    }

    /// Subtree read (spec.md §4.4).
    pub fn get_sub<T: DeserializeOwned>(&self, key: &str, path: &[&str]) -> Result<T, CacheKvError> {
        if !self.inner.settings.json {
            return Err(CacheKvError::JsonDisabled);
        }
        let whole = self.get_json(key)?.unwrap_or(Value::Null);
        let sub = crate::json_path::walk(&whole, path)?;
        serde_json::from_value(sub.clone()).map_err(|e| decode_error(key, e))
    }

    /// Subtree write: read-modify-write of the whole value (spec.md §4.4).
    /// There is no locking between the read and the write, so concurrent
    /// `set_sub` calls on the same key may lose updates — an accepted
    /// limitation of the model, carried forward unchanged.
    pub fn set_sub<T: Serialize>(
        &self,
        key: &str,
        path: &[&str],
        value: T,
        cb: Option<Callback>,
    ) -> Result<(), CacheKvError> {
        if !self.inner.settings.json {
            return Err(CacheKvError::JsonDisabled);
        }
        if path.is_empty() {
            return self.set(key, value, cb);
        }

        let mut whole = self.get_json(key)?.unwrap_or(Value::Null);
        let (parents, last) = path.split_at(path.len() - 1);
        let encoded = serde_json::to_value(value).map_err(|e| encode_error(key, e))?;
        {
            let parent = crate::json_path::walk_mut(&mut whole, parents)?;
            match parent {
                Value::Object(map) => {
                    map.insert(last[0].to_string(), encoded);
                }
                _ => return Err(CacheKvError::SubvalueNotFound { path: path.join(".") }),
            }
        }
        self.write_value(key, Some(whole), cb)
    }

    /// Explicit flush (spec.md §4.6). `cb` fires once, with the bulk's
    /// result, whether or not the batch was empty.
    pub fn flush(&self) -> Result<(), CacheKvError> {
        self.flush_with(None)
    }

    pub fn flush_with(&self, overall_cb: Option<Callback>) -> Result<(), CacheKvError> {
        self.ensure_open()?;
        let result = flush_store(&self.inner, overall_cb.is_some());
        if let Some(cb) = overall_cb {
            cb(result.clone());
        }
        result
    }

    /// spec.md §4.7 / §9: unlike the reference implementation, `close`
    /// stops the periodic flush thread (which itself performs one final
    /// flush as it winds down) *before* delegating to the driver.
    pub fn close(&self) -> Result<(), CacheKvError> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        match self.flush_thread.lock().take() {
            Some(handle) => handle.shutdown(),
            None => {
                if let Err(e) = flush_store(&self.inner, false) {
                    warn!("final flush on close failed: {e}");
                }
            }
        }
        self.inner.driver.close().map_err(CacheKvError::Driver)
    }

    fn ensure_open(&self) -> Result<(), CacheKvError> {
        if self.inner.closed.load(Ordering::Acquire) {
            Err(CacheKvError::Closed)
        } else {
            Ok(())
        }
    }
}

impl<D: Driver + 'static> Drop for CacheKv<D> {
    fn drop(&mut self) {
        if !self.inner.closed.load(Ordering::Acquire) {
            if let Err(e) = self.close() {
                warn!("flush-on-drop failed: {e}");
            }
        }
    }
}

fn default_callback(key: &str) -> Callback {
    let key = key.to_string();
    Box::new(move |result| {
        if let Err(e) = result {
            log::error!("unacknowledged write to {key:?} failed: {e}");
        }
    })
}

fn write_through(driver: &dyn Driver, key: &str, value: Option<&Value>, json: bool) -> Result<(), CacheKvError> {
    match value {
        None => driver.remove(key).map_err(CacheKvError::Driver),
        Some(v) => {
            let raw = if json {
                serde_json::to_string(v).map_err(|e| encode_error(key, e))?
            } else {
                match v {
                    Value::String(s) => s.clone(),
                    _ => return Err(CacheKvError::JsonDisabled),
                }
            };
            driver.set(key, &raw).map_err(CacheKvError::Driver)
        }
    }
}

/// One flush cycle shared by `flush()`, the background thread, and GC's
/// all-dirty escape hatch. `log_noop` controls whether an empty batch is
/// worth a debug line (the periodic thread ticks far more often than it
/// has anything to do, so it stays quiet).
fn flush_store<D: Driver>(inner: &Inner<D>, log_noop: bool) -> Result<(), CacheKvError> {
    let job = {
        let mut buffer = inner.buffer.lock();
        flush::collect(&mut buffer, inner.settings.json)?
    };
    if job.ops.is_empty() {
        if log_noop {
            debug!("flush: nothing dirty, no-op");
        }
    } else {
        debug!("flush: submitting {} operation(s)", job.ops.len());
    }
    flush::apply(&inner.driver, job)
}

/// GC sweep plus its all-dirty escape hatch (spec.md §4.5 step 4): flush,
/// then re-sweep, looping until either something is evicted or there is
/// nothing left to evict.
fn run_gc<D: Driver>(inner: &Inner<D>) {
    loop {
        let outcome = {
            let mut buffer = inner.buffer.lock();
            gc::sweep(&mut buffer, inner.settings.cache)
        };
        match outcome {
            GcOutcome::NotNeeded => break,
            GcOutcome::Evicted(keys) => {
                debug!("gc: evicted {} clean entr{}", keys.len(), if keys.len() == 1 { "y" } else { "ies" });
                break;
            }
            GcOutcome::NeedsFlush => {
                debug!("gc: every resident entry is dirty, forcing a flush before re-sweeping");
                if let Err(e) = flush_store(inner, false) {
                    warn!("gc-triggered flush failed, leaving buffer over watermark: {e}");
                    break;
                }
            }
        }
    }
}

/// Handle to the background periodic-flush thread (spec.md §4.6
/// "Triggers"). Pattern grounded on `clawstore-core::trickle::TrickleHandle`:
/// an atomic shutdown flag the thread polls between sleeps, with a final
/// flush performed by the thread itself as it winds down.
struct FlushThreadHandle {
    shutdown: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl FlushThreadHandle {
    fn shutdown(mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for FlushThreadHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn spawn_flush_thread<D: Driver + 'static>(inner: Arc<Inner<D>>) -> Result<FlushThreadHandle, CacheKvError> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_for_thread = Arc::clone(&shutdown);
    let interval = inner.settings.write_interval;

    let thread = thread::Builder::new()
        .name("cachekv-flush".to_string())
        .spawn(move || flush_loop(inner, interval, shutdown_for_thread))
        .map_err(|e| CacheKvError::ThreadSpawn(e.to_string()))?;

    Ok(FlushThreadHandle { shutdown, thread: Some(thread) })
}

/// Checks the shutdown flag at a sub-interval granularity so `close()`
/// doesn't have to wait out a whole `write_interval` to return.
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(20);

fn flush_loop<D: Driver>(inner: Arc<Inner<D>>, interval: Duration, shutdown: Arc<AtomicBool>) {
    loop {
        let wake_at = Instant::now() + interval;
        while Instant::now() < wake_at {
            if shutdown.load(Ordering::Acquire) {
                final_flush(&inner);
                return;
            }
            thread::sleep(interval.min(SHUTDOWN_POLL_INTERVAL));
        }
        if shutdown.load(Ordering::Acquire) {
            final_flush(&inner);
            return;
        }
        if let Err(e) = flush_store(&inner, false) {
            warn!("periodic flush failed: {e}");
        }
    }
}

fn final_flush<D: Driver>(inner: &Inner<D>) {
    if let Err(e) = flush_store(inner, false) {
        warn!("final flush before shutdown failed: {e}");
    }
}
