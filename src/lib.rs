#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! dbhandle - a process-wide SQLite connection manager
//!
//! dbhandle owns a single storage handle per process and hands out short-lived
//! sessions to callers. The storage file and its parent directory are created
//! lazily, and the tables declared in a [`SchemaRegistry`] can be created or
//! dropped on demand.
//!
//! # Feature Flags
//!
//! | Feature | Description | Key Dependencies |
//! |---------|-------------|------------------|
//! | (none) | Connection manager, sessions, schema registry | `rusqlite`, `r2d2` |
//! | `cli` | The `dbhandle` binary with table output | `clap`, `tabled` |
//!
//! # Architecture
//!
//! - **[`database`]**: all database functionality
//!   - `core`: connection pool, storage location resolver, storage handle, schema registry
//!   - `session`: the per-operation unit of work and its scoped-acquisition guard
//!   - `manager`: the process-wide [`DatabaseManager`]
//! - **[`config`]**: configuration management
//! - **[`error`]**: the [`DbError`] kinds returned by the library
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use dbhandle::{DatabaseManager, DbConfig, TableDef, TableRegistry};
//! use std::sync::Arc;
//!
//! let registry = TableRegistry::new()
//!     .table(TableDef::new("users", "id INTEGER PRIMARY KEY, name TEXT NOT NULL"));
//!
//! let manager = DatabaseManager::open(&DbConfig::default(), Some("app.db"), Arc::new(registry))?;
//! manager.create_schema()?;
//!
//! // Raw statement, committed automatically
//! manager.execute_raw("INSERT INTO users (name) VALUES (?1)", ["alice"])?;
//!
//! // Caller-managed unit of work, always closed afterwards
//! let count: i64 = manager.scoped_session(|session| {
//!     session.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
//! })?;
//! ```

pub mod config;
pub mod database;
pub mod error;

// =============================================================================
// Configuration
// =============================================================================

pub use crate::config::{format_size, get_storage_info, DbConfig, StorageInfo};

// =============================================================================
// Errors
// =============================================================================

pub use error::{DbError, DbResult};

// =============================================================================
// Database Module - Re-export commonly used types
// =============================================================================

pub use database::{
    get_instance, get_instance_with, resolve_storage_path, DatabaseManager, IndexDef,
    QueryResult, SchemaRegistry, SchemaStatus, Session, SessionGuard, SessionState,
    StorageHandle, TableDef, TableRegistry, DEFAULT_DB_NAME, REQUIRED_SUFFIX,
};
