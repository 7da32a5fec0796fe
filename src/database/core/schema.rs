//! Schema registry
//!
//! The manager never defines tables itself. It is handed a [`SchemaRegistry`]
//! that knows how to create and drop its declared tables, and only invokes
//! those two operations. [`TableRegistry`] is the declarative implementation
//! shipped with the crate.

use super::connection::object_exists;
use crate::error::{DbError, DbResult};
use rusqlite::Connection;

/// A set of declared tables the manager can materialize or remove
pub trait SchemaRegistry: Send + Sync {
    /// Create every declared table that does not exist yet
    fn create_all(&self, conn: &Connection) -> DbResult<()>;

    /// Drop every declared table that exists
    fn drop_all(&self, conn: &Connection) -> DbResult<()>;

    /// Names of the declared tables, in declaration order
    fn table_names(&self) -> Vec<String>;
}

/// Declaration of an index on a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDef {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

impl IndexDef {
    pub fn new<I, S>(name: &str, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        IndexDef {
            name: name.to_string(),
            columns: columns.into_iter().map(Into::into).collect(),
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    fn create_sql(&self, table: &str) -> String {
        let columns = self
            .columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "CREATE {}INDEX IF NOT EXISTS {} ON {} ({})",
            if self.unique { "UNIQUE " } else { "" },
            quote_ident(&self.name),
            quote_ident(table),
            columns
        )
    }
}

/// Declaration of a table
///
/// `columns` is the column/constraint list that goes between the parentheses
/// of `CREATE TABLE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
    pub name: String,
    pub columns: String,
    pub indexes: Vec<IndexDef>,
}

impl TableDef {
    pub fn new(name: &str, columns: &str) -> Self {
        TableDef {
            name: name.to_string(),
            columns: columns.to_string(),
            indexes: Vec::new(),
        }
    }

    pub fn index(mut self, index: IndexDef) -> Self {
        self.indexes.push(index);
        self
    }

    fn create_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_ident(&self.name),
            self.columns
        )
    }

    fn drop_sql(&self) -> String {
        format!("DROP TABLE IF EXISTS {}", quote_ident(&self.name))
    }
}

/// Declarative schema registry
///
/// Tables are created in declaration order and dropped in reverse, so a table
/// referencing another by foreign key should be declared after it.
#[derive(Debug, Clone, Default)]
pub struct TableRegistry {
    tables: Vec<TableDef>,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, table: TableDef) -> Self {
        self.tables.push(table);
        self
    }
}

impl SchemaRegistry for TableRegistry {
    fn create_all(&self, conn: &Connection) -> DbResult<()> {
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| DbError::schema("create_all", e))?;

        for table in &self.tables {
            tx.execute(&table.create_sql(), [])
                .map_err(|e| DbError::schema("create_all", e))?;

            for index in &table.indexes {
                tx.execute(&index.create_sql(&table.name), [])
                    .map_err(|e| DbError::schema("create_all", e))?;
            }
        }

        tx.commit().map_err(|e| DbError::schema("create_all", e))
    }

    fn drop_all(&self, conn: &Connection) -> DbResult<()> {
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| DbError::schema("drop_all", e))?;

        // indexes go away with their tables
        for table in self.tables.iter().rev() {
            tx.execute(&table.drop_sql(), [])
                .map_err(|e| DbError::schema("drop_all", e))?;
        }

        tx.commit().map_err(|e| DbError::schema("drop_all", e))
    }

    fn table_names(&self) -> Vec<String> {
        self.tables.iter().map(|t| t.name.clone()).collect()
    }
}

/// Status of the declared schema in a database
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaStatus {
    /// None of the declared tables exist
    NotInitialized,

    /// Every declared table exists (trivially true for an empty registry)
    Current,

    /// Some declared tables are missing
    Partial { missing: Vec<String> },
}

/// Check which of the registry's declared tables exist
pub fn check_status(conn: &Connection, registry: &dyn SchemaRegistry) -> DbResult<SchemaStatus> {
    let declared = registry.table_names();

    let mut missing = Vec::new();
    for table in &declared {
        if !object_exists(conn, "table", table)? {
            missing.push(table.clone());
        }
    }

    if missing.is_empty() {
        Ok(SchemaStatus::Current)
    } else if missing.len() == declared.len() {
        Ok(SchemaStatus::NotInitialized)
    } else {
        Ok(SchemaStatus::Partial { missing })
    }
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_registry() -> TableRegistry {
        TableRegistry::new()
            .table(
                TableDef::new("users", "id INTEGER PRIMARY KEY, name TEXT NOT NULL")
                    .index(IndexDef::new("idx_users_name", ["name"]).unique()),
            )
            .table(TableDef::new(
                "posts",
                "id INTEGER PRIMARY KEY, user_id INTEGER NOT NULL REFERENCES users(id), body TEXT",
            ))
    }

    fn table_exists(conn: &Connection, name: &str) -> bool {
        object_exists(conn, "table", name).unwrap()
    }

    fn index_exists(conn: &Connection, name: &str) -> bool {
        object_exists(conn, "index", name).unwrap()
    }

    fn count_users(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0)).unwrap()
    }

    #[test]
    fn test_schema_not_initialized() {
        let conn = Connection::open_in_memory().unwrap();
        let registry = test_registry();

        assert_eq!(check_status(&conn, &registry).unwrap(), SchemaStatus::NotInitialized);
    }

    #[test]
    fn test_create_all() {
        let conn = Connection::open_in_memory().unwrap();
        let registry = test_registry();

        registry.create_all(&conn).unwrap();

        assert!(table_exists(&conn, "users"));
        assert!(table_exists(&conn, "posts"));
        assert!(index_exists(&conn, "idx_users_name"));
        assert_eq!(check_status(&conn, &registry).unwrap(), SchemaStatus::Current);
    }

    #[test]
    fn test_create_all_twice_is_noop() {
        let conn = Connection::open_in_memory().unwrap();
        let registry = test_registry();

        registry.create_all(&conn).unwrap();
        conn.execute("INSERT INTO users (name) VALUES ('alice')", []).unwrap();
        registry.create_all(&conn).unwrap();

        assert_eq!(count_users(&conn), 1);
    }

    #[test]
    fn test_drop_all_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        let registry = test_registry();

        // dropping tables that were never created is fine
        registry.drop_all(&conn).unwrap();

        registry.create_all(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO users (name) VALUES ('alice');
             INSERT INTO posts (user_id, body) VALUES (1, 'hello');",
        )
        .unwrap();

        registry.drop_all(&conn).unwrap();
        registry.drop_all(&conn).unwrap();

        assert!(!table_exists(&conn, "users"));
        assert!(!table_exists(&conn, "posts"));
        assert!(!index_exists(&conn, "idx_users_name"));
    }

    #[test]
    fn test_partial_status() {
        let conn = Connection::open_in_memory().unwrap();
        let registry = test_registry();

        conn.execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)", []).unwrap();

        assert_eq!(
            check_status(&conn, &registry).unwrap(),
            SchemaStatus::Partial {
                missing: vec!["posts".to_string()]
            }
        );
    }

    #[test]
    fn test_empty_registry() {
        let conn = Connection::open_in_memory().unwrap();
        let registry = TableRegistry::default();

        registry.create_all(&conn).unwrap();
        registry.drop_all(&conn).unwrap();
        assert_eq!(check_status(&conn, &registry).unwrap(), SchemaStatus::Current);
    }

    #[test]
    fn test_bad_declaration_is_schema_error() {
        let conn = Connection::open_in_memory().unwrap();
        let registry = TableRegistry::new()
            .table(TableDef::new("good", "id INTEGER PRIMARY KEY"))
            .table(TableDef::new("bad", "id INTEGER PRIMARY KEY,,"));

        let err = registry.create_all(&conn).unwrap_err();
        assert!(matches!(
            err,
            DbError::Schema {
                operation: "create_all",
                ..
            }
        ));
        // the failed create is rolled back as a whole
        assert!(!table_exists(&conn, "good"));
    }
}
