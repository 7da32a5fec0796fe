//! Core database infrastructure
//!
//! - `connection`: `r2d2` pool construction and per-connection pragmas
//! - `resolve_storage_path`: storage name validation and data directory setup
//! - `StorageHandle`: lazily opened pool of connections to one storage file
//! - `SchemaRegistry`: create/drop of declared tables

mod connection;
mod handle;
mod location;
mod schema;

pub(crate) use connection::PooledConnection;
pub use connection::{DEFAULT_BUSY_TIMEOUT_MS, DEFAULT_CONNECTION_TIMEOUT_MS};
pub use handle::StorageHandle;
pub use location::{resolve_storage_path, validate_name, DEFAULT_DB_NAME, REQUIRED_SUFFIX};
pub use schema::{check_status, IndexDef, SchemaRegistry, SchemaStatus, TableDef, TableRegistry};
