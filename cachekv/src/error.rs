//! Error taxonomy for the wrapper (spec.md §7).
//!
//! Four kinds of failure: the driver's own I/O errors, JSON decode/encode
//! failures, subtree path-not-found, and the closed-store programmer error.
//! There is deliberately no automatic retry here — callers decide whether
//! to re-issue a failed mutation themselves.

use std::fmt;

/// Error surfaced by a [`crate::driver::Driver`] implementation.
///
/// Kept deliberately untyped beyond a message: drivers live in separate
/// crates (`cachekv-sqlite`, `cachekv-memory`) and each carries its own
/// underlying error type (`rusqlite::Error`, `io::Error`, ...); this is the
/// common currency the wrapper reasons about.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct DriverError {
    message: String,
}

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl From<String> for DriverError {
    fn from(message: String) -> Self {
        DriverError::new(message)
    }
}

impl From<&str> for DriverError {
    fn from(message: &str) -> Self {
        DriverError::new(message)
    }
}

/// Top-level error type returned by every public `CacheKv` operation.
///
/// `Clone` is required because a single flush's result is fanned out to
/// every callback queued on the batch it just applied (spec.md §4.6 step
/// 3) — each callback needs its own copy.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheKvError {
    /// The backing driver failed to perform an operation.
    #[error("driver error: {0}")]
    Driver(#[from] DriverError),

    /// A value read from the driver was not valid JSON for the requested type.
    /// The entry is deliberately NOT cached (spec.md §4.2).
    #[error("failed to decode value for key {key:?}: {source}")]
    Decode { key: String, source: JsonErrorMessage },

    /// A value could not be JSON-encoded on its way to the driver.
    #[error("failed to encode value for key {key:?}: {source}")]
    Encode { key: String, source: JsonErrorMessage },

    /// `get_sub`/`set_sub` walked off the edge of the value (spec.md §4.4).
    #[error("subvalue not found at path {path:?}")]
    SubvalueNotFound { path: String },

    /// JSON mode is required for this operation but the store was built
    /// with `json: false`.
    #[error("store was constructed with json=false; use the _raw accessors")]
    JsonDisabled,

    /// The store's `close()` has already run; no further operations are
    /// accepted.
    #[error("store is closed")]
    Closed,

    /// The background flush thread could not be spawned at `open()` time
    /// (spec.md §7's "programmer error... may be raised at construction"
    /// category, extended to the environmental case of OS thread/resource
    /// exhaustion rather than panicking through it).
    #[error("failed to spawn background flush thread: {0}")]
    ThreadSpawn(String),
}

/// A `Clone`-able stand-in for `serde_json::Error`, which itself is not
/// `Clone` (needed because `CacheKvError` is fanned out to many queued
/// callbacks by value).
#[derive(Debug, Clone)]
pub struct JsonErrorMessage(String);

impl fmt::Display for JsonErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<serde_json::Error> for JsonErrorMessage {
    fn from(e: serde_json::Error) -> Self {
        JsonErrorMessage(e.to_string())
    }
}

pub(crate) fn decode_error(key: &str, source: serde_json::Error) -> CacheKvError {
    CacheKvError::Decode { key: key.to_string(), source: source.into() }
}

pub(crate) fn encode_error(key: &str, source: serde_json::Error) -> CacheKvError {
    CacheKvError::Encode { key: key.to_string(), source: source.into() }
}
