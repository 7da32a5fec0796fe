//! Storage location resolution
//!
//! Turns a storage name into the absolute path of the database file under the
//! data directory, validating the name before anything touches the filesystem.

use crate::error::{DbError, DbResult};
use std::path::{Path, PathBuf};

/// Suffix every storage name must carry
pub const REQUIRED_SUFFIX: &str = ".db";

/// Storage name used when none is given
pub const DEFAULT_DB_NAME: &str = "analysis.db";

/// Validate a storage name without touching the filesystem
pub fn validate_name(name: &str) -> DbResult<()> {
    if !name.ends_with(REQUIRED_SUFFIX) {
        return Err(DbError::validation(name, format!("must end with '{}'", REQUIRED_SUFFIX)));
    }
    if name.len() == REQUIRED_SUFFIX.len() {
        return Err(DbError::validation(name, "file stem is empty"));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(DbError::validation(name, "must be a file name, not a path"));
    }
    Ok(())
}

/// Resolve the storage path for `name` under `data_dir`
///
/// The data directory (and any missing ancestors) is created if absent.
/// Calling this repeatedly is safe.
pub fn resolve_storage_path(data_dir: &Path, name: &str) -> DbResult<PathBuf> {
    validate_name(name)?;

    let data_dir = if data_dir.is_absolute() {
        data_dir.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| DbError::initialization(data_dir, e))?
            .join(data_dir)
    };

    std::fs::create_dir_all(&data_dir).map_err(|e| DbError::initialization(&data_dir, e))?;

    Ok(data_dir.join(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_creates_missing_ancestors() {
        let tmp = tempfile::tempdir().unwrap();
        let data_dir = tmp.path().join("a").join("b").join("data");

        let path = resolve_storage_path(&data_dir, "test.db").unwrap();

        assert_eq!(path, data_dir.join("test.db"));
        assert!(data_dir.is_dir());
        // only the directory, the file is opened lazily
        assert!(!path.exists());
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let first = resolve_storage_path(tmp.path(), "test.db").unwrap();
        let second = resolve_storage_path(tmp.path(), "test.db").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_bad_suffix_touches_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let data_dir = tmp.path().join("data");

        let err = resolve_storage_path(&data_dir, "bad_name").unwrap_err();

        assert!(matches!(err, DbError::Validation { .. }));
        assert!(!data_dir.exists());
        assert!(!data_dir.join("bad_name").exists());
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("analysis.db").is_ok());
        assert!(validate_name("test.db").is_ok());
        assert!(validate_name(".db").is_err());
        assert!(validate_name("test.sqlite3").is_err());
        assert!(validate_name("test.db.bak").is_err());
        assert!(validate_name("nested/test.db").is_err());
    }
}
