//! Database module
//!
//! ```text
//! database/
//! ├── core/           # Foundation
//! │   ├── connection  # r2d2 pool construction, connection pragmas
//! │   ├── location    # storage name validation, data directory setup
//! │   ├── handle      # StorageHandle: lazily opened connection pool
//! │   └── schema      # SchemaRegistry, TableRegistry
//! │
//! ├── session/        # Per-operation units of work
//! │   └── result      # QueryResult
//! │
//! └── manager         # DatabaseManager and the process-wide instance
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use dbhandle::database::get_instance;
//!
//! let manager = get_instance(Some("analysis.db"))?;
//! manager.create_schema()?;
//!
//! let rows = manager.execute_raw("SELECT 1", [])?;
//! assert_eq!(rows.len(), 1);
//! ```

pub mod core;
pub mod manager;
pub mod session;

pub use core::{
    check_status, resolve_storage_path, validate_name, IndexDef, SchemaRegistry, SchemaStatus,
    StorageHandle, TableDef, TableRegistry, DEFAULT_BUSY_TIMEOUT_MS,
    DEFAULT_CONNECTION_TIMEOUT_MS, DEFAULT_DB_NAME, REQUIRED_SUFFIX,
};
pub use manager::{get_instance, get_instance_with, DatabaseManager};
pub use session::{QueryResult, Session, SessionFactory, SessionGuard, SessionState};
