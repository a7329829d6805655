//! Frozen-after-construction store settings (spec.md §3).

use std::time::Duration;

use crate::driver::DriverDefaults;

/// Built-in fallback when neither the caller nor the driver specify a
/// value (spec.md §4.1 table in §6's reference driver describes the
/// SQLite driver's own, different, defaults — those take precedence over
/// these when that driver is in use).
const BUILTIN_CACHE: usize = 1000;
const BUILTIN_WRITE_INTERVAL: Duration = Duration::from_millis(100);
const BUILTIN_JSON: bool = true;

/// Caller-supplied overrides. Every field left `None` falls through to the
/// driver's [`DriverDefaults`], and then to the built-in fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct SettingsOverride {
    pub cache: Option<usize>,
    pub write_interval: Option<Duration>,
    pub json: Option<bool>,
}

impl SettingsOverride {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache(mut self, cache: usize) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn write_interval(mut self, interval: Duration) -> Self {
        self.write_interval = Some(interval);
        self
    }

    pub fn json(mut self, json: bool) -> Self {
        self.json = Some(json);
        self
    }
}

/// The effective, immutable settings a store runs with once constructed
/// (spec.md §3 "Settings (immutable after construction)").
#[derive(Debug, Clone, Copy)]
pub struct Settings {
    /// Maximum resident clean entries before GC triggers. `0` disables
    /// caching of clean reads.
    pub cache: usize,
    /// Interval between periodic flushes. `Duration::ZERO` disables
    /// buffering: every mutation goes straight to the driver.
    pub write_interval: Duration,
    /// Whether values are JSON-(de)serialized at the driver boundary.
    pub json: bool,
}

impl Settings {
    pub(crate) fn resolve(caller: SettingsOverride, driver: DriverDefaults) -> Self {
        Settings {
            cache: caller.cache.or(driver.cache).unwrap_or(BUILTIN_CACHE),
            write_interval: caller.write_interval.or(driver.write_interval).unwrap_or(BUILTIN_WRITE_INTERVAL),
            json: caller.json.or(driver.json).unwrap_or(BUILTIN_JSON),
        }
    }

    pub fn buffering_enabled(&self) -> bool {
        !self.write_interval.is_zero()
    }
}
