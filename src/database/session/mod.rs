//! Sessions: per-operation units of work
//!
//! A [`Session`] is owned by exactly one caller. It borrows a connection from
//! the storage handle on its first statement and gives it back when closed.
//! Closing is guaranteed: an explicit [`Session::close`], the RAII
//! [`SessionGuard`], or `Drop` as a last resort.
//!
//! ```text
//! Created -> InUse -> Committed | RolledBack -> Closed
//!    \_________________________________________/
//! ```

mod result;

pub use result::QueryResult;
pub(crate) use result::run_statement;

use crate::database::core::{PooledConnection, StorageHandle};
use crate::error::{DbError, DbResult};
use rusqlite::{Connection, Params, Row};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    InUse,
    Committed,
    RolledBack,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Created => write!(f, "created"),
            SessionState::InUse => write!(f, "in use"),
            SessionState::Committed => write!(f, "committed"),
            SessionState::RolledBack => write!(f, "rolled back"),
            SessionState::Closed => write!(f, "closed"),
        }
    }
}

/// Produces sessions bound to one storage handle
#[derive(Clone)]
pub struct SessionFactory {
    handle: Arc<StorageHandle>,
    echo: bool,
}

impl SessionFactory {
    pub fn new(handle: Arc<StorageHandle>, echo: bool) -> Self {
        SessionFactory { handle, echo }
    }

    pub fn echo(&self) -> bool {
        self.echo
    }

    /// Allocate a new session; no connection is taken until it is used
    pub fn create(&self) -> Session {
        Session {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            conn: None,
            handle: Arc::clone(&self.handle),
            state: SessionState::Created,
            echo: self.echo,
        }
    }
}

pub struct Session {
    id: u64,
    conn: Option<PooledConnection>,
    handle: Arc<StorageHandle>,
    state: SessionState,
    echo: bool,
}

impl Session {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    /// Whether an explicit transaction is open on this session
    pub fn in_transaction(&self) -> bool {
        self.conn.as_ref().is_some_and(|c| !c.is_autocommit())
    }

    fn ensure_open(&self) -> DbResult<()> {
        if self.is_closed() {
            return Err(DbError::InvalidState(format!("session {} is closed", self.id)));
        }
        Ok(())
    }

    fn connection(&mut self) -> DbResult<&Connection> {
        self.ensure_open()?;
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => self.handle.checkout()?,
        };
        let conn: &Connection = self.conn.insert(conn);
        Ok(conn)
    }

    fn log_statement(&self, sql: &str) {
        if self.echo {
            info!(session = self.id, "{}", sql);
        }
    }

    /// Open an explicit transaction
    pub fn begin(&mut self) -> DbResult<()> {
        if self.in_transaction() {
            return Err(DbError::InvalidState(format!(
                "session {} already has an open transaction",
                self.id
            )));
        }
        self.log_statement("BEGIN");
        self.connection()?.execute_batch("BEGIN")?;
        self.state = SessionState::InUse;
        Ok(())
    }

    /// Execute a statement, returning the number of changed rows
    pub fn execute<P: Params>(&mut self, sql: &str, params: P) -> DbResult<usize> {
        self.log_statement(sql);
        let changed = self.connection()?.execute(sql, params)?;
        self.state = SessionState::InUse;
        Ok(changed)
    }

    /// Execute a statement and collect its result set
    pub fn query<P: Params>(&mut self, sql: &str, params: P) -> DbResult<QueryResult> {
        self.log_statement(sql);
        let result = run_statement(self.connection()?, sql, params)?;
        self.state = SessionState::InUse;
        Ok(result)
    }

    /// Execute a query expected to return a single row
    pub fn query_row<T, P, F>(&mut self, sql: &str, params: P, f: F) -> DbResult<T>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        self.log_statement(sql);
        let value = self.connection()?.query_row(sql, params, f)?;
        self.state = SessionState::InUse;
        Ok(value)
    }

    /// Commit the open transaction, if any
    pub fn commit(&mut self) -> DbResult<()> {
        self.ensure_open()?;
        if self.in_transaction() {
            self.log_statement("COMMIT");
            self.connection()?.execute_batch("COMMIT")?;
        }
        self.state = SessionState::Committed;
        Ok(())
    }

    /// Roll back the open transaction, if any
    pub fn rollback(&mut self) -> DbResult<()> {
        self.ensure_open()?;
        if self.in_transaction() {
            self.log_statement("ROLLBACK");
            self.connection()?.execute_batch("ROLLBACK")?;
        }
        self.state = SessionState::RolledBack;
        Ok(())
    }

    /// Release the session
    ///
    /// An open transaction is rolled back first. The connection goes back to
    /// the pool even if that rollback fails, in which case the rollback error
    /// is returned and the next checkout rolls it back again. Closing an
    /// already closed session does nothing.
    pub fn close(&mut self) -> DbResult<()> {
        if self.is_closed() {
            return Ok(());
        }

        let mut outcome = Ok(());
        if let Some(conn) = self.conn.take() {
            if !conn.is_autocommit() {
                self.log_statement("ROLLBACK");
                if let Err(e) = conn.execute_batch("ROLLBACK") {
                    outcome = Err(DbError::from(e));
                }
            }
            // back to the pool
            drop(conn);
        }

        self.state = SessionState::Closed;
        debug!("session {} closed", self.id);
        outcome
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("failed to close session {} cleanly: {}", self.id, e);
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("has_connection", &self.conn.is_some())
            .finish()
    }
}

/// Scoped acquisition of a session
///
/// The session is closed when the guard goes out of scope, including during
/// unwinding. Use [`SessionGuard::finish`] to observe the close result.
#[derive(Debug)]
pub struct SessionGuard {
    session: Session,
}

impl SessionGuard {
    pub fn new(session: Session) -> Self {
        SessionGuard { session }
    }

    /// Close the session now and report any cleanup error
    pub fn finish(mut self) -> DbResult<()> {
        self.session.close()
    }
}

impl Deref for SessionGuard {
    type Target = Session;

    fn deref(&self) -> &Session {
        &self.session
    }
}

impl DerefMut for SessionGuard {
    fn deref_mut(&mut self) -> &mut Session {
        &mut self.session
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Err(e) = self.session.close() {
            warn!("failed to close scoped session {}: {}", self.session.id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DbConfig;
    use rusqlite::types::Value;
    use std::path::Path;

    fn test_factory(dir: &Path) -> (Arc<StorageHandle>, SessionFactory) {
        let handle = StorageHandle::new(dir.join("session.db"), &DbConfig::default()).unwrap();
        let handle = Arc::new(handle);
        let factory = SessionFactory::new(Arc::clone(&handle), false);
        (handle, factory)
    }

    #[test]
    fn test_create_takes_no_connection() {
        let tmp = tempfile::tempdir().unwrap();
        let (handle, factory) = test_factory(tmp.path());

        let session = factory.create();
        assert_eq!(session.state(), SessionState::Created);
        assert!(!session.in_transaction());
        assert_eq!(handle.open_sessions(), 0);
        assert!(!handle.path().exists());
    }

    #[test]
    fn test_session_ids_are_unique() {
        let tmp = tempfile::tempdir().unwrap();
        let (_handle, factory) = test_factory(tmp.path());

        let a = factory.create();
        let b = factory.create();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_commit_flow() {
        let tmp = tempfile::tempdir().unwrap();
        let (handle, factory) = test_factory(tmp.path());

        let mut session = factory.create();
        session
            .execute("CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT)", [])
            .unwrap();
        assert_eq!(session.state(), SessionState::InUse);
        assert_eq!(handle.open_sessions(), 1);

        session.begin().unwrap();
        assert!(session.in_transaction());
        session.execute("INSERT INTO t (v) VALUES (?1)", ["a"]).unwrap();
        session.commit().unwrap();
        assert_eq!(session.state(), SessionState::Committed);
        assert!(!session.in_transaction());

        session.close().unwrap();
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(handle.open_sessions(), 0);

        let mut other = factory.create();
        let count: i64 = other
            .query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_rollback_discards_changes() {
        let tmp = tempfile::tempdir().unwrap();
        let (_handle, factory) = test_factory(tmp.path());

        let mut session = factory.create();
        session.execute("CREATE TABLE t (id INTEGER)", []).unwrap();
        session.begin().unwrap();
        session.execute("INSERT INTO t VALUES (1)", []).unwrap();
        session.rollback().unwrap();
        assert_eq!(session.state(), SessionState::RolledBack);

        let result = session.query("SELECT COUNT(*) FROM t", []).unwrap();
        assert_eq!(result.scalar(), Some(&Value::Integer(0)));
    }

    #[test]
    fn test_close_rolls_back_open_transaction() {
        let tmp = tempfile::tempdir().unwrap();
        let (handle, factory) = test_factory(tmp.path());

        let mut session = factory.create();
        session.execute("CREATE TABLE t (id INTEGER)", []).unwrap();
        session.begin().unwrap();
        session.execute("INSERT INTO t VALUES (1)", []).unwrap();
        session.close().unwrap();

        // the connection was rolled back and pooled again
        assert_eq!(handle.idle_connections(), 1);

        let mut other = factory.create();
        let count: i64 = other
            .query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_closed_session_rejects_operations() {
        let tmp = tempfile::tempdir().unwrap();
        let (_handle, factory) = test_factory(tmp.path());

        let mut session = factory.create();
        session.close().unwrap();

        assert!(matches!(
            session.execute("SELECT 1", []),
            Err(DbError::InvalidState(_))
        ));
        assert!(matches!(session.begin(), Err(DbError::InvalidState(_))));
        assert!(matches!(session.commit(), Err(DbError::InvalidState(_))));
        assert!(matches!(session.rollback(), Err(DbError::InvalidState(_))));
        // closing twice is harmless
        assert!(session.close().is_ok());
    }

    #[test]
    fn test_nested_begin_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let (_handle, factory) = test_factory(tmp.path());

        let mut session = factory.create();
        session.begin().unwrap();
        assert!(matches!(session.begin(), Err(DbError::InvalidState(_))));
    }

    #[test]
    fn test_drop_releases_connection() {
        let tmp = tempfile::tempdir().unwrap();
        let (handle, factory) = test_factory(tmp.path());

        {
            let mut session = factory.create();
            session.execute("CREATE TABLE t (id INTEGER)", []).unwrap();
            assert_eq!(handle.open_sessions(), 1);
        }
        assert_eq!(handle.open_sessions(), 0);
    }

    #[test]
    fn test_guard_closes_on_scope_exit() {
        let tmp = tempfile::tempdir().unwrap();
        let (handle, factory) = test_factory(tmp.path());

        {
            let mut guard = SessionGuard::new(factory.create());
            guard.execute("CREATE TABLE t (id INTEGER)", []).unwrap();
            assert_eq!(handle.open_sessions(), 1);
        }
        assert_eq!(handle.open_sessions(), 0);

        let mut guard = SessionGuard::new(factory.create());
        guard.query("SELECT 1", []).unwrap();
        guard.finish().unwrap();
        assert_eq!(handle.open_sessions(), 0);
    }

    #[test]
    fn test_sessions_share_bounded_pool() {
        let tmp = tempfile::tempdir().unwrap();
        let config = DbConfig {
            pool_size: 1,
            connection_timeout_ms: 200,
            ..DbConfig::default()
        };
        let handle = Arc::new(StorageHandle::new(tmp.path().join("bounded.db"), &config).unwrap());
        let factory = SessionFactory::new(Arc::clone(&handle), false);

        let mut first = factory.create();
        first.query("SELECT 1", []).unwrap();

        // the only connection is held, so a second session times out
        let mut second = factory.create();
        let err = second.query("SELECT 1", []).unwrap_err();
        assert!(matches!(err, DbError::Pool(_)));
        assert_eq!(second.state(), SessionState::Created);
        assert_eq!(handle.open_sessions(), 1);

        first.close().unwrap();
        second.query("SELECT 1", []).unwrap();
        assert_eq!(handle.open_sessions(), 1);
        second.close().unwrap();
        assert_eq!(handle.open_sessions(), 0);
    }

    #[test]
    fn test_failed_statement_keeps_session_usable() {
        let tmp = tempfile::tempdir().unwrap();
        let (_handle, factory) = test_factory(tmp.path());

        let mut session = factory.create();
        let err = session.query("SELECT * FROM missing_table", []).unwrap_err();
        assert!(matches!(err, DbError::Query(_)));
        assert!(session.query("SELECT 1", []).is_ok());
    }
}
