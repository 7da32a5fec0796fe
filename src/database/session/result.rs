//! Result sets returned by sessions and `execute_raw`

use rusqlite::types::Value;
use rusqlite::{Connection, Params};
use serde_json::json;

/// Rows produced by a statement
///
/// Statements that return no columns (DDL, INSERT without RETURNING, ...)
/// produce an empty row set with `rows_affected` filled in. Row-returning
/// statements leave `rows_affected` at zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub rows_affected: usize,
}

impl QueryResult {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First column of the first row
    pub fn scalar(&self) -> Option<&Value> {
        self.rows.first().and_then(|row| row.first())
    }

    /// Convert the rows to a JSON array of objects keyed by column name
    pub fn to_json(&self) -> serde_json::Value {
        let rows: Vec<serde_json::Value> = self
            .rows
            .iter()
            .map(|row| {
                let object: serde_json::Map<String, serde_json::Value> = self
                    .columns
                    .iter()
                    .cloned()
                    .zip(row.iter().map(value_to_json))
                    .collect();
                serde_json::Value::Object(object)
            })
            .collect();
        serde_json::Value::Array(rows)
    }
}

pub(crate) fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Integer(i) => json!(i),
        Value::Real(f) => json!(f),
        Value::Text(s) => json!(s),
        Value::Blob(b) => json!(b),
    }
}

/// Run one statement and collect its result set
pub(crate) fn run_statement<P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> rusqlite::Result<QueryResult> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(String::from)
        .collect();

    if columns.is_empty() {
        let rows_affected = stmt.execute(params)?;
        return Ok(QueryResult {
            columns,
            rows: Vec::new(),
            rows_affected,
        });
    }

    let column_count = columns.len();
    let mut rows = stmt.query(params)?;
    let mut collected = Vec::new();
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(column_count);
        for idx in 0..column_count {
            values.push(row.get::<_, Value>(idx)?);
        }
        collected.push(values);
    }

    Ok(QueryResult {
        columns,
        rows: collected,
        rows_affected: 0,
    })
}
