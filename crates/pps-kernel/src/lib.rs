//! SQLite backing store for particle profiles.
//!
//! [`Kernel`] owns the database location and hands out short-lived
//! connections through [`Kernel::with_connection`]; [`ParticleStore`] wraps a
//! borrowed connection and implements the group / fixed-effect operations.

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Duration;

mod store;

pub use store::{LoadedRecord, ParticleStore};

pub const DB_FILE_NAME: &str = "particles.sqlite";

#[derive(Clone, Debug)]
pub struct Kernel {
    db_path: PathBuf,
    busy_timeout: Duration,
}

impl Kernel {
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("create state dir {}", dir.display()))?;
        let db_path = dir.join(DB_FILE_NAME);
        // Busy timeout (default 5000ms; override with PPS_SQLITE_BUSY_MS)
        let busy_ms: u64 = std::env::var("PPS_SQLITE_BUSY_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5000);
        let kernel = Self {
            db_path,
            busy_timeout: Duration::from_millis(busy_ms),
        };
        let conn = kernel.conn()?;
        // WAL lets the loader read while a writer for another owner commits
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        // Cache size: negative = KB units.
        let cache_pages: i64 = std::env::var("PPS_SQLITE_CACHE_PAGES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(-8000);
        let _ = conn.pragma_update(None, "cache_size", cache_pages);
        ParticleStore::migrate(&conn).context("migrate particle schema")?;
        Ok(kernel)
    }

    fn conn(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)
            .with_context(|| format!("open {}", self.db_path.display()))?;
        conn.busy_timeout(self.busy_timeout)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(conn)
    }

    /// Runs `f` against a freshly opened connection. The connection is
    /// closed when this returns, whether `f` succeeded, failed or panicked.
    pub fn with_connection<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut conn = self.conn()?;
        f(&mut conn)
    }

    /// Convenience for the common case of running store operations.
    pub fn with_store<T>(&self, f: impl FnOnce(&ParticleStore<'_>) -> Result<T>) -> Result<T> {
        self.with_connection(|conn| f(&ParticleStore::new(conn)))
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}
