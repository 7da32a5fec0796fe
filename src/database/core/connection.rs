//! SQLite connection pool construction
//!
//! Connections are pooled with `r2d2` over `r2d2_sqlite`. Every new connection
//! goes through [`PragmaCustomizer`] before a session can see it.

use crate::config::DbConfig;
use crate::error::{DbError, DbResult};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

/// Default busy timeout applied to every connection
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

/// Default time a checkout waits for a free connection
pub const DEFAULT_CONNECTION_TIMEOUT_MS: u64 = 5000;

/// Alias for the connection pool type
pub type ConnectionPool = Pool<SqliteConnectionManager>;

/// Alias for a pooled connection
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Pragmas applied to each new connection
#[derive(Debug)]
struct PragmaCustomizer {
    busy_timeout_ms: u64,
}

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for PragmaCustomizer {
    fn on_acquire(&self, conn: &mut Connection) -> Result<(), rusqlite::Error> {
        // set before WAL so concurrent first opens wait instead of failing
        conn.busy_timeout(Duration::from_millis(self.busy_timeout_ms))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;\
             PRAGMA synchronous = NORMAL;\
             PRAGMA temp_store = MEMORY;\
             PRAGMA foreign_keys = ON;",
        )?;
        Ok(())
    }
}

/// Create a file-backed connection pool
///
/// No connection is opened here (`min_idle` is zero), so the database file is
/// only created by the first checkout.
pub(crate) fn new_file_pool(path: &Path, config: &DbConfig) -> DbResult<ConnectionPool> {
    let max_size = u32::try_from(config.pool_size)
        .ok()
        .filter(|size| *size > 0)
        .ok_or_else(|| {
            DbError::initialization(path, format!("invalid pool size {}", config.pool_size))
        })?;
    if config.connection_timeout_ms == 0 {
        return Err(DbError::initialization(path, "connection timeout must be positive"));
    }

    let manager = SqliteConnectionManager::file(path);
    Pool::builder()
        .max_size(max_size)
        .min_idle(Some(0))
        .connection_timeout(Duration::from_millis(config.connection_timeout_ms))
        .connection_customizer(Box::new(PragmaCustomizer {
            busy_timeout_ms: config.busy_timeout_ms,
        }))
        .build(manager)
        .map_err(|e| DbError::initialization(path, e))
}

/// Check whether a schema object of the given type exists
pub(crate) fn object_exists(
    conn: &Connection,
    object_type: &str,
    name: &str,
) -> rusqlite::Result<bool> {
    let count: i32 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type=?1 AND name=?2",
        [object_type, name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(pool_size: usize) -> DbConfig {
        DbConfig {
            pool_size,
            ..DbConfig::default()
        }
    }

    #[test]
    fn test_pool_opens_nothing_until_checkout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conn.db");

        let pool = new_file_pool(&path, &test_config(2)).unwrap();
        assert!(!path.exists());
        assert_eq!(pool.state().connections, 0);

        let conn = pool.get().unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY)").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_pragmas_applied() {
        let dir = tempfile::tempdir().unwrap();
        let pool = new_file_pool(&dir.path().join("conn.db"), &test_config(1)).unwrap();
        let conn = pool.get().unwrap();

        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        let foreign_keys: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(journal_mode, "wal");
        assert_eq!(foreign_keys, 1);
    }

    #[test]
    fn test_zero_sizes_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = new_file_pool(&dir.path().join("conn.db"), &test_config(0))
            .err()
            .unwrap();
        assert!(matches!(err, DbError::Initialization { .. }));

        let config = DbConfig {
            connection_timeout_ms: 0,
            ..test_config(1)
        };
        let err = new_file_pool(&dir.path().join("conn.db"), &config)
            .err()
            .unwrap();
        assert!(matches!(err, DbError::Initialization { .. }));
    }

    #[test]
    fn test_object_exists() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE test_table (id INTEGER PRIMARY KEY, name TEXT);
             CREATE INDEX idx_test_name ON test_table(name);",
        )
        .unwrap();

        assert!(object_exists(&conn, "table", "test_table").unwrap());
        assert!(!object_exists(&conn, "table", "nonexistent_table").unwrap());
        assert!(object_exists(&conn, "index", "idx_test_name").unwrap());
        assert!(!object_exists(&conn, "index", "test_table").unwrap());
    }
}
