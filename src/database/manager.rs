//! The connection manager
//!
//! [`DatabaseManager`] owns one storage handle and the session factory bound to
//! it. Independent managers can be built with [`DatabaseManager::open`]; the
//! process-wide one is reached through [`get_instance`] / [`get_instance_with`],
//! which construct it exactly once.

use super::core::{
    check_status, resolve_storage_path, SchemaRegistry, SchemaStatus, StorageHandle,
    TableRegistry,
};
use super::session::{QueryResult, Session, SessionFactory, SessionGuard};
use crate::config::DbConfig;
use crate::error::{DbError, DbResult};
use rusqlite::Params;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{info, warn};

static GLOBAL_MANAGER: Mutex<Option<Arc<DatabaseManager>>> = Mutex::new(None);

pub struct DatabaseManager {
    name: String,
    handle: Arc<StorageHandle>,
    factory: SessionFactory,
    registry: Arc<dyn SchemaRegistry>,
}

impl DatabaseManager {
    /// Build a manager for `name` (or the configured default name) under the
    /// configured data directory
    ///
    /// The name is validated before anything touches the filesystem. The data
    /// directory is created if missing; the database file itself is created
    /// when the first session issues a statement.
    pub fn open(
        config: &DbConfig,
        name: Option<&str>,
        registry: Arc<dyn SchemaRegistry>,
    ) -> DbResult<Self> {
        let name = name.unwrap_or(config.db_name.as_str());
        let path = resolve_storage_path(Path::new(&config.data_dir), name)?;

        info!("initializing storage handle at {}", path.display());
        let handle = Arc::new(StorageHandle::new(path, config)?);
        let factory = SessionFactory::new(Arc::clone(&handle), config.echo);

        Ok(DatabaseManager {
            name: name.to_string(),
            handle,
            factory,
            registry,
        })
    }

    /// The storage name this manager was built with
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        self.handle.path()
    }

    pub fn handle(&self) -> &Arc<StorageHandle> {
        &self.handle
    }

    /// Whether sessions log every statement they issue
    pub fn echo(&self) -> bool {
        self.factory.echo()
    }

    /// Number of sessions currently holding a connection
    pub fn open_sessions(&self) -> usize {
        self.handle.open_sessions()
    }

    /// Create a new session; the caller is responsible for closing it
    ///
    /// Prefer [`DatabaseManager::scoped_session`] or
    /// [`DatabaseManager::session_scope`], which close it for you.
    pub fn acquire_session(&self) -> Session {
        self.factory.create()
    }

    /// Acquire a session that is closed when the returned guard is dropped
    pub fn session_scope(&self) -> SessionGuard {
        SessionGuard::new(self.acquire_session())
    }

    /// Run `f` with a fresh session and close the session afterwards
    ///
    /// The session is closed whether `f` returns normally, returns an error or
    /// panics. Commit and rollback are left to `f`; a transaction still open
    /// when `f` returns is rolled back. An error from `f` takes precedence over
    /// an error from closing.
    pub fn scoped_session<T, F>(&self, f: F) -> DbResult<T>
    where
        F: FnOnce(&mut Session) -> DbResult<T>,
    {
        let mut session = self.acquire_session();
        let result = f(&mut session);
        let closed = session.close();

        match (result, closed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), closed) => {
                if let Err(close_err) = closed {
                    warn!("failed to close session after error: {}", close_err);
                }
                Err(e)
            }
        }
    }

    /// Execute one raw statement in its own committed transaction
    ///
    /// On failure the transaction is rolled back, the session is released and
    /// the original error is returned. Nothing is retried.
    pub fn execute_raw<P: Params>(&self, sql: &str, params: P) -> DbResult<QueryResult> {
        let mut session = self.acquire_session();

        let result = run_in_transaction(&mut session, sql, params);
        if result.is_err() && session.in_transaction() {
            if let Err(e) = session.rollback() {
                warn!("rollback after failed raw statement failed: {}", e);
            }
        }
        let closed = session.close();

        match (result, closed) {
            (Ok(rows), Ok(())) => Ok(rows),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), closed) => {
                if let Err(close_err) = closed {
                    warn!("failed to close session after error: {}", close_err);
                }
                Err(e)
            }
        }
    }

    /// Create every table declared by the schema registry
    pub fn create_schema(&self) -> DbResult<()> {
        info!("creating schema in {}", self.path().display());
        self.handle.with_connection(|conn| self.registry.create_all(conn))
    }

    /// Drop every table declared by the schema registry
    pub fn drop_schema(&self) -> DbResult<()> {
        info!("dropping schema in {}", self.path().display());
        self.handle.with_connection(|conn| self.registry.drop_all(conn))
    }

    /// Report which declared tables exist
    pub fn schema_status(&self) -> DbResult<SchemaStatus> {
        self.handle.with_connection(|conn| check_status(conn, self.registry.as_ref()))
    }
}

fn run_in_transaction<P: Params>(
    session: &mut Session,
    sql: &str,
    params: P,
) -> DbResult<QueryResult> {
    session.begin()?;
    let rows = session.query(sql, params)?;
    session.commit()?;
    Ok(rows)
}

/// Get the process-wide manager, building it on first use
///
/// Configuration comes from `DBHANDLE_*` environment variables (and `.env`)
/// over the defaults, with an empty schema registry. See
/// [`get_instance_with`] for the first-wins rule on `name`.
pub fn get_instance(name: Option<&str>) -> DbResult<Arc<DatabaseManager>> {
    let config = DbConfig::from_env().map_err(|e| DbError::Configuration(e.to_string()))?;
    get_instance_with(&config, name, Arc::new(TableRegistry::default()))
}

/// Get the process-wide manager, building it from `config` on first use
///
/// Concurrent first callers serialize on construction, so exactly one storage
/// handle is ever created. Once built, the manager is returned as is: a later
/// call with a different `name` (or config) does not reopen anything and gets
/// the first handle. A failed construction leaves nothing behind, and the next
/// call tries again.
pub fn get_instance_with(
    config: &DbConfig,
    name: Option<&str>,
    registry: Arc<dyn SchemaRegistry>,
) -> DbResult<Arc<DatabaseManager>> {
    let mut slot = GLOBAL_MANAGER.lock().unwrap_or_else(PoisonError::into_inner);

    if let Some(existing) = slot.as_ref() {
        if let Some(requested) = name {
            if requested != existing.name() {
                warn!(
                    "database manager already initialized with '{}', ignoring requested '{}'",
                    existing.name(),
                    requested
                );
            }
        }
        return Ok(Arc::clone(existing));
    }

    let manager = Arc::new(DatabaseManager::open(config, name, registry)?);
    *slot = Some(Arc::clone(&manager));
    Ok(manager)
}
