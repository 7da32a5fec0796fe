//! Pooled storage handle
//!
//! `StorageHandle` plays the role of the engine: it owns the storage path and
//! an `r2d2` pool of connections to it. The pool starts empty, so the database
//! file only appears once a session actually issues a statement.

use super::connection::{new_file_pool, ConnectionPool, PooledConnection};
use crate::config::DbConfig;
use crate::error::{DbError, DbResult};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub struct StorageHandle {
    path: PathBuf,
    pool: ConnectionPool,
}

impl StorageHandle {
    /// Create a handle for an already resolved storage path
    pub fn new(path: PathBuf, config: &DbConfig) -> DbResult<Self> {
        let pool = new_file_pool(&path, config)?;
        Ok(StorageHandle { path, pool })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Maximum number of connections open at once
    pub fn max_size(&self) -> u32 {
        self.pool.max_size()
    }

    /// Number of connections currently held by sessions
    pub fn open_sessions(&self) -> usize {
        let state = self.pool.state();
        state.connections.saturating_sub(state.idle_connections) as usize
    }

    /// Number of connections waiting in the pool
    pub fn idle_connections(&self) -> usize {
        self.pool.state().idle_connections as usize
    }

    /// Take a connection from the pool, opening a new one if none is idle
    ///
    /// Waits up to the configured connection timeout when every connection is
    /// in use. A connection that comes back with a transaction still open is
    /// rolled back before it is handed out.
    pub(crate) fn checkout(&self) -> DbResult<PooledConnection> {
        let conn = self.pool.get().map_err(DbError::Pool)?;
        if !conn.is_autocommit() {
            warn!("rolling back transaction left open on a pooled connection");
            conn.execute_batch("ROLLBACK")?;
        }
        debug!(
            "checked out connection to {} ({} in use)",
            self.path.display(),
            self.open_sessions()
        );
        Ok(conn)
    }

    /// Run `f` on a pooled connection
    ///
    /// The connection returns to the pool when `f` finishes, including when it
    /// panics.
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> DbResult<T>) -> DbResult<T> {
        let conn = self.checkout()?;
        f(&conn)
    }
}
