//! SQLite-backed key/value store.
//!
//! # Storage layout
//!
//! A single table `params` is created (if it does not already exist):
//!
//! | column     | type | description                      |
//! |------------|------|----------------------------------|
//! | key        | TEXT | Primary key                      |
//! | value      | BLOB | Raw value bytes                  |
//! | updated_at | TEXT | RFC-3339 time of last write (UTC) |
//!
//! Booleans are stored as `b"1"` / `b"0"`. Strings are UTF-8.
//!
//! # Example
//!
//! ```rust
//! use velos_params::{ParamStore, keys};
//!
//! let store = ParamStore::open_in_memory().unwrap();
//! store.put_bool(keys::IS_METRIC, true).unwrap();
//!
//! assert!(store.get_bool(keys::IS_METRIC).unwrap());
//! assert!(!store.get_bool(keys::EXPERIMENTAL_MODE).unwrap());
//! ```

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;
use tracing::warn;
use velos_types::VelosError;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum ParamsError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("timed out waiting for param '{0}'")]
    Timeout(String),
    #[error("param is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("param store lock poisoned")]
    Poisoned,
}

impl From<ParamsError> for VelosError {
    fn from(err: ParamsError) -> Self {
        match err {
            ParamsError::Timeout(key) => VelosError::Timeout(key),
            other => VelosError::Params(other.to_string()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ParamStore
// ─────────────────────────────────────────────────────────────────────────────

/// Shared handle to the configuration store. Cloning is cheap; all clones
/// use the same connection.
#[derive(Clone)]
pub struct ParamStore {
    conn: Arc<Mutex<Connection>>,
}

impl ParamStore {
    /// Open (or create) a persistent store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ParamsError> {
        Self::with_connection(Connection::open(path)?)
    }

    /// Open a temporary in-memory store (useful for testing).
    pub fn open_in_memory() -> Result<Self, ParamsError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, ParamsError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS params (
                key        TEXT NOT NULL PRIMARY KEY,
                value      BLOB NOT NULL,
                updated_at TEXT NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, ParamsError> {
        self.conn.lock().map_err(|_| ParamsError::Poisoned)
    }

    /// Raw value of `key`, or `None` when unset.
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ParamsError> {
        let conn = self.lock()?;
        let value = conn
            .query_row("SELECT value FROM params WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    /// `true` only when the stored value is exactly `b"1"`.
    pub fn get_bool(&self, key: &str) -> Result<bool, ParamsError> {
        Ok(self.get(key)?.as_deref() == Some(b"1".as_slice()))
    }

    pub fn get_string(&self, key: &str) -> Result<Option<String>, ParamsError> {
        self.get(key)?.map(String::from_utf8).transpose().map_err(ParamsError::from)
    }

    /// Wait until `key` is set, polling every 50 ms, for at most `timeout`.
    ///
    /// This blocks the calling thread; call it from a blocking context.
    pub fn get_blocking(&self, key: &str, timeout: Duration) -> Result<Vec<u8>, ParamsError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(value) = self.get(key)? {
                return Ok(value);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(ParamsError::Timeout(key.to_string()));
            }
            thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }

    pub fn put(&self, key: &str, value: &[u8]) -> Result<(), ParamsError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO params (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn put_bool(&self, key: &str, value: bool) -> Result<(), ParamsError> {
        self.put(key, if value { b"1" } else { b"0" })
    }

    pub fn remove(&self, key: &str) -> Result<(), ParamsError> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM params WHERE key = ?1", params![key])?;
        Ok(())
    }

    /// Write on a background thread. Failures are logged, not returned; join
    /// the handle to wait for the write.
    pub fn put_nonblocking(&self, key: &str, value: Vec<u8>) -> JoinHandle<()> {
        let store = self.clone();
        let key = key.to_string();
        thread::spawn(move || {
            if let Err(e) = store.put(&key, &value) {
                warn!(key = %key, error = %e, "background param write failed");
            }
        })
    }

    pub fn put_bool_nonblocking(&self, key: &str, value: bool) -> JoinHandle<()> {
        self.put_nonblocking(key, if value { b"1".to_vec() } else { b"0".to_vec() })
    }

    /// Last write time of `key` as RFC-3339.
    pub fn updated_at(&self, key: &str) -> Result<Option<String>, ParamsError> {
        let conn = self.lock()?;
        let ts = conn
            .query_row("SELECT updated_at FROM params WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(ts)
    }
}
