//! Error kinds returned by the connection manager
//!
//! Validation and initialization errors abort startup. Query and schema errors
//! are returned to the immediate caller after any session involved has been
//! released.

use std::path::PathBuf;

pub type DbResult<T> = std::result::Result<T, DbError>;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// The requested storage name was rejected before touching the filesystem
    #[error("Invalid storage name '{name}': {reason}")]
    Validation { name: String, reason: String },

    /// The data directory or the storage handle could not be created
    #[error("Failed to initialize storage at '{}': {source}", .path.display())]
    Initialization {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// No pooled connection became available within the connection timeout
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// A statement issued through a session or `execute_raw` failed
    #[error("Query failed: {0}")]
    Query(#[from] rusqlite::Error),

    /// Creating or dropping the declared schema failed
    #[error("Schema operation '{operation}' failed: {source}")]
    Schema {
        operation: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The session was used after being closed, or a transaction call was out of order
    #[error("Invalid session state: {0}")]
    InvalidState(String),
}

impl DbError {
    pub(crate) fn validation(name: &str, reason: impl Into<String>) -> Self {
        DbError::Validation {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn initialization(
        path: impl Into<PathBuf>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        DbError::Initialization {
            path: path.into(),
            source: source.into(),
        }
    }

    pub(crate) fn schema(operation: &'static str, source: rusqlite::Error) -> Self {
        DbError::Schema { operation, source }
    }

    /// Whether this error must abort startup
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DbError::Validation { .. }
                | DbError::Initialization { .. }
                | DbError::Configuration(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_kinds() {
        assert!(DbError::validation("bad", "missing suffix").is_fatal());
        assert!(DbError::initialization(
            "/nonexistent",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        )
        .is_fatal());
        assert!(!DbError::InvalidState("closed".to_string()).is_fatal());
        assert!(!DbError::Query(rusqlite::Error::QueryReturnedNoRows).is_fatal());
        assert!(DbError::Configuration("bad".to_string()).is_fatal());
    }

    #[test]
    fn test_display_includes_name() {
        let err = DbError::validation("bad_name", "must end with '.db'");
        assert_eq!(
            err.to_string(),
            "Invalid storage name 'bad_name': must end with '.db'"
        );
    }
}
