//! `SQLite` Data-Source Implementation
//!
//! Implements [`SchemaProvider`] and [`QueryExecutor`] for `SQLite`
//! databases.
//!
//! # Features
//! - File-based connections (`/path/to/db.sqlite`)
//! - In-memory connections (`:memory:`)
//! - Schema description via `sqlite_master` and PRAGMAs, with row counts
//! - Read statements run on a read-only connection; only `execute_write`
//!   opens the database read-write
//!
//! # Implementation Notes
//! - Uses `rusqlite` (synchronous driver, no async needed)
//! - BLOB data is Base64-encoded for JSON safety
//! - `SQLite` stores temporal values as TEXT; ISO-8601 strings pass through
//!   unchanged, REAL values become JSON numbers

use rusqlite::{Connection, OpenFlags, Row};
use std::path::PathBuf;

use crate::engine::{
    DatabaseKind, QueryExecutor, ResultRow, ResultSet, Rows, SchemaProvider, WriteAck,
};
use crate::error::{Result, TabletalkError};

/// `SQLite` data source
#[derive(Debug, Clone)]
pub struct SqliteExecutor {
    path: PathBuf,
}

impl SqliteExecutor {
    /// Create a data source for the given database file (or `:memory:`)
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SchemaProvider for SqliteExecutor {
    async fn describe_schema(&self) -> Result<String> {
        let conn = self.open(true).map_err(|e| TabletalkError::schema_failed(e.to_string()))?;

        let mut stmt = conn
            .prepare(
                "SELECT name FROM sqlite_master
                 WHERE type = 'table'
                 AND name NOT LIKE 'sqlite_%'
                 ORDER BY name",
            )
            .map_err(|e| TabletalkError::schema_failed(format!("failed to list tables: {e}")))?;

        let table_names: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .map_err(|e| TabletalkError::schema_failed(format!("failed to list tables: {e}")))?
            .collect::<std::result::Result<Vec<String>, _>>()
            .map_err(|e| TabletalkError::schema_failed(format!("failed to list tables: {e}")))?;

        let mut schema = String::from("DATABASE SCHEMA (SQLite):\n\n");
        for table in &table_names {
            schema.push_str(&describe_table(&conn, table)?);
            schema.push('\n');
        }

        Ok(schema)
    }
}

impl QueryExecutor for SqliteExecutor {
    fn kind(&self) -> DatabaseKind {
        DatabaseKind::SQLite
    }

    async fn execute(&self, sql: &str) -> ResultSet {
        // Read path: a read-only connection, so a mutating statement that
        // slipped past the prompt constraints fails here and surfaces as
        // the error marker instead of changing data.
        let conn = match self.open(true) {
            Ok(conn) => conn,
            Err(e) => return ResultSet::error(e.to_string()),
        };

        match run_select(&conn, sql) {
            Ok(rows) => ResultSet::Rows(rows),
            Err(e) => ResultSet::error(e.to_string()),
        }
    }

    async fn execute_write(&self, sql: &str) -> WriteAck {
        let conn = match self.open(false) {
            Ok(conn) => conn,
            Err(e) => return WriteAck::failed(e.to_string()),
        };

        match conn.execute(sql, []) {
            Ok(affected) => WriteAck::ok(format!("{affected} row(s) affected")),
            Err(e) => WriteAck::failed(e.to_string()),
        }
    }
}

impl SqliteExecutor {
    /// Open a connection with appropriate flags
    fn open(&self, read_only: bool) -> rusqlite::Result<Connection> {
        let flags = if read_only {
            OpenFlags::SQLITE_OPEN_READ_ONLY
        } else {
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
        };

        Connection::open_with_flags(&self.path, flags)
    }
}

/// Render one table's columns, constraints, and row count
fn describe_table(conn: &Connection, table: &str) -> Result<String> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})")).map_err(|e| {
        TabletalkError::schema_failed(format!("failed to read columns of {table}: {e}"))
    })?;

    let columns: Vec<(String, String, bool, bool)> = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(1)?,     // name
                row.get::<_, String>(2)?,     // declared type
                row.get::<_, i32>(3)? != 0,   // notnull
                row.get::<_, i32>(5)? > 0,    // pk ordinal
            ))
        })
        .map_err(|e| {
            TabletalkError::schema_failed(format!("failed to read columns of {table}: {e}"))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| {
            TabletalkError::schema_failed(format!("failed to read columns of {table}: {e}"))
        })?;

    let row_count: i64 = conn
        .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
        .map_err(|e| TabletalkError::schema_failed(format!("failed to count {table}: {e}")))?;

    let mut text = format!("Table: {table}\n");
    for (name, data_type, not_null, is_pk) in columns {
        let mut constraints = Vec::new();
        if is_pk {
            constraints.push("PRIMARY KEY");
        }
        if not_null {
            constraints.push("NOT NULL");
        }

        if constraints.is_empty() {
            text.push_str(&format!("  - {name}: {data_type}\n"));
        } else {
            text.push_str(&format!("  - {name}: {data_type} ({})\n", constraints.join(", ")));
        }
    }
    text.push_str(&format!("  Row count: {row_count}\n"));

    Ok(text)
}

/// Execute a read statement and collect the result set
fn run_select(conn: &Connection, sql: &str) -> rusqlite::Result<Rows> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().iter().map(|s| (*s).to_string()).collect();

    let mut rows_data = Vec::new();
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        rows_data.push(row_to_json(&columns, row)?);
    }

    Ok(Rows { columns, rows: rows_data })
}

/// Convert a `SQLite` row to a JSON-safe map in column order
fn row_to_json(columns: &[String], row: &Row) -> rusqlite::Result<ResultRow> {
    let mut map = ResultRow::new();
    for (idx, name) in columns.iter().enumerate() {
        map.insert(name.clone(), sqlite_value_to_json(row, idx)?);
    }
    Ok(map)
}

fn sqlite_value_to_json(row: &Row, idx: usize) -> rusqlite::Result<serde_json::Value> {
    use rusqlite::types::ValueRef;

    let value_ref = row.get_ref(idx)?;

    Ok(match value_ref {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Integer(i) => serde_json::Value::Number(i.into()),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map_or(serde_json::Value::Null, serde_json::Value::Number), // NaN/Infinity as null
        ValueRef::Text(s) => {
            let text = std::str::from_utf8(s).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    idx,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?;
            serde_json::Value::String(text.to_string())
        }
        ValueRef::Blob(b) => {
            // Encode BLOB as Base64 for JSON safety
            use base64::Engine;
            let encoded = base64::engine::general_purpose::STANDARD.encode(b);
            serde_json::Value::String(encoded)
        }
    })
}
