//! Diagnostic tracer: correlation ids and structured, levelled log records.
//!
//! The [`Tracer`] is an explicit context object. One instance is created per
//! client (or shared between several) and handed to every component as an
//! `Arc<Tracer>`; there is no process-global logger state. Its minimum level
//! lives in a single atomic field so it can be changed at runtime from any
//! clone of the `Arc` ("configure once, observe everywhere").
//!
//! Every accepted record is:
//! 1. appended to the tracer's in-memory sink ([`Tracer::records`]), and
//! 2. forwarded to the [`tracing`] facade with `request_id` as a field, so it
//!    shows up in whatever subscriber the host application installed.
//!
//! Messages are passed as [`fmt::Arguments`] (`format_args!`), which are only
//! rendered after the level check passes: a record below the active level
//! costs one atomic load and nothing else.

use crate::error::TranslateError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

/// Severity of a [`LogRecord`]. Ordered `Debug < Info < Warn < Error`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl Level {
    fn as_u8(self) -> u8 {
        match self {
            Level::Debug => 0,
            Level::Info => 1,
            Level::Warn => 2,
            Level::Error => 3,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => Level::Debug,
            1 => Level::Info,
            2 => Level::Warn,
            _ => Level::Error,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        };
        f.write_str(s)
    }
}

impl FromStr for Level {
    type Err = TranslateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            other => Err(TranslateError::InvalidConfig(format!(
                "unknown log level '{other}' (expected debug, info, warn or error)"
            ))),
        }
    }
}

/// One structured diagnostic record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    /// Correlation id of the request (or workflow run) this record belongs to.
    pub request_id: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
    pub level: Level,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

/// Correlation-id generator and levelled record sink.
///
/// Never panics and never returns an error: a poisoned sink lock is
/// recovered, and payloads that fail to serialise are recorded as their
/// `Debug` rendering.
#[derive(Debug)]
pub struct Tracer {
    level: AtomicU8,
    counter: AtomicU64,
    records: Mutex<VecDeque<LogRecord>>,
    capacity: Option<usize>,
}

impl Default for Tracer {
    fn default() -> Self {
        Self::new(Level::default())
    }
}

impl Tracer {
    /// Create a tracer with an unbounded sink.
    pub fn new(level: Level) -> Self {
        Self {
            level: AtomicU8::new(level.as_u8()),
            counter: AtomicU64::new(0),
            records: Mutex::new(VecDeque::new()),
            capacity: None,
        }
    }

    /// Create a tracer that keeps at most `capacity` records, evicting the
    /// oldest first.
    pub fn with_capacity(level: Level, capacity: usize) -> Self {
        Self {
            capacity: Some(capacity.max(1)),
            ..Self::new(level)
        }
    }

    /// Current minimum level.
    pub fn level(&self) -> Level {
        Level::from_u8(self.level.load(Ordering::Relaxed))
    }

    /// Change the minimum level. Takes effect for the next log call.
    pub fn set_level(&self, level: Level) {
        self.level.store(level.as_u8(), Ordering::Relaxed);
    }

    /// Would a record at `level` be kept?
    pub fn enabled(&self, level: Level) -> bool {
        level.as_u8() >= self.level.load(Ordering::Relaxed)
    }

    /// Mint a correlation id: a process-monotonic counter plus a random
    /// suffix, e.g. `req-000042-1a2b3c4d`.
    pub fn generate_request_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let suffix = Uuid::new_v4().simple().to_string();
        format!("req-{n:06}-{}", &suffix[..8])
    }

    /// Record a message without payload.
    pub fn log(&self, level: Level, request_id: &str, message: fmt::Arguments<'_>) {
        if !self.enabled(level) {
            return;
        }
        self.push(level, request_id, message.to_string(), None);
    }

    /// Record a message with a JSON payload.
    ///
    /// The payload is only serialised when the level is enabled. If
    /// serialisation fails the record keeps the payload's `Debug` output as a
    /// JSON string instead.
    pub fn log_with<T>(&self, level: Level, request_id: &str, message: fmt::Arguments<'_>, payload: &T)
    where
        T: Serialize + fmt::Debug + ?Sized,
    {
        if !self.enabled(level) {
            return;
        }
        let value = serde_json::to_value(payload)
            .unwrap_or_else(|_| Value::String(format!("{payload:?}")));
        self.push(level, request_id, message.to_string(), Some(value));
    }

    pub fn debug(&self, request_id: &str, message: fmt::Arguments<'_>) {
        self.log(Level::Debug, request_id, message);
    }

    pub fn info(&self, request_id: &str, message: fmt::Arguments<'_>) {
        self.log(Level::Info, request_id, message);
    }

    pub fn warn(&self, request_id: &str, message: fmt::Arguments<'_>) {
        self.log(Level::Warn, request_id, message);
    }

    pub fn error(&self, request_id: &str, message: fmt::Arguments<'_>) {
        self.log(Level::Error, request_id, message);
    }

    /// Snapshot of all retained records in insertion order.
    pub fn records(&self) -> Vec<LogRecord> {
        self.sink().iter().cloned().collect()
    }

    /// Snapshot of the records carrying `request_id`.
    pub fn records_for(&self, request_id: &str) -> Vec<LogRecord> {
        self.sink()
            .iter()
            .filter(|r| r.request_id == request_id)
            .cloned()
            .collect()
    }

    /// Number of retained records.
    pub fn len(&self) -> usize {
        self.sink().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn sink(&self) -> std::sync::MutexGuard<'_, VecDeque<LogRecord>> {
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push(&self, level: Level, request_id: &str, message: String, payload: Option<Value>) {
        match (level, &payload) {
            (Level::Debug, Some(p)) => tracing::debug!(request_id, payload = %p, "{message}"),
            (Level::Debug, None) => tracing::debug!(request_id, "{message}"),
            (Level::Info, Some(p)) => tracing::info!(request_id, payload = %p, "{message}"),
            (Level::Info, None) => tracing::info!(request_id, "{message}"),
            (Level::Warn, Some(p)) => tracing::warn!(request_id, payload = %p, "{message}"),
            (Level::Warn, None) => tracing::warn!(request_id, "{message}"),
            (Level::Error, Some(p)) => tracing::error!(request_id, payload = %p, "{message}"),
            (Level::Error, None) => tracing::error!(request_id, "{message}"),
        }

        let record = LogRecord {
            request_id: request_id.to_string(),
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            level,
            message,
            payload,
        };

        let mut sink = self.sink();
        if let Some(cap) = self.capacity {
            while sink.len() >= cap {
                sink.pop_front();
            }
        }
        sink.push_back(record);
    }
}
