//! Data-Source Traits and Core Types
//!
//! This module defines the collaborator contracts the pipeline consumes:
//! a schema provider (prompt-ready schema text) and a query executor
//! (statement execution plus confirmed-write execution). Each engine
//! (`SQLite`, `MySQL`) implements both.
//!
//! # Never-Throws Execution
//! `execute` is infallible at the type level. A failed statement returns
//! [`ResultSet::Error`] carrying the database error text, which the
//! pipeline uses to build its single correction prompt. Only schema
//! introspection returns `Result`, because a broken connection there is not
//! recoverable by re-generating SQL.
//!
//! # Engine Isolation
//! Each engine implementation is completely independent.
//! No shared SQL helpers or cross-engine abstractions.

use serde::{Deserialize, Serialize};

use crate::error::Result;

// Engine-specific implementations
#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "mysql")]
pub mod mysql;

/// Supported database engine types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseKind {
    /// `MySQL` database (includes `MariaDB`)
    MySQL,
    /// `SQLite` database
    SQLite,
}

impl DatabaseKind {
    /// Get the engine name as a string
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MySQL => "mysql",
            Self::SQLite => "sqlite",
        }
    }

    /// SQL dialect name used in the generation prompt preamble
    #[must_use]
    pub const fn dialect(&self) -> &'static str {
        match self {
            Self::MySQL => "MySQL",
            Self::SQLite => "SQLite",
        }
    }
}

impl std::fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One result row: column name to JSON-safe scalar
///
/// Engines normalize values on the way in: decimals become JSON numbers,
/// date/datetime values become ISO-8601 strings, BLOBs become Base64
/// strings.
pub type ResultRow = serde_json::Map<String, serde_json::Value>;

/// Ordered result rows with the column order preserved alongside
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rows {
    /// Column names in statement order
    pub columns: Vec<String>,

    /// Result rows (each row is a map of column name to value)
    pub rows: Vec<ResultRow>,
}

impl Rows {
    /// Rows as plain JSON objects, for envelope content
    #[must_use]
    pub fn to_json_objects(&self) -> Vec<serde_json::Value> {
        self.rows.iter().cloned().map(serde_json::Value::Object).collect()
    }
}

/// Result of executing one statement: rows or a single error marker
///
/// The two shapes are mutually exclusive; the error shape always carries
/// exactly one message.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultSet {
    /// Successful execution
    Rows(Rows),

    /// Failed execution; the database error text, verbatim
    Error(String),
}

impl ResultSet {
    /// Successful empty result
    #[must_use]
    pub fn empty() -> Self {
        Self::Rows(Rows { columns: Vec::new(), rows: Vec::new() })
    }

    /// Failed execution with the given error text
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }

    /// Whether this is the error shape
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// The wire shape: a row list, or a single-element `[{"error": ...}]`
    #[must_use]
    pub fn to_json_rows(&self) -> Vec<serde_json::Value> {
        match self {
            Self::Rows(rows) => rows.to_json_objects(),
            Self::Error(message) => vec![serde_json::json!({ "error": message })],
        }
    }
}

/// Acknowledgement for a confirmed write statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteAck {
    /// Whether the statement was applied
    pub success: bool,

    /// Human-readable outcome (rows affected, or the database error text)
    pub message: String,
}

impl WriteAck {
    /// Successful write acknowledgement
    pub fn ok(message: impl Into<String>) -> Self {
        Self { success: true, message: message.into() }
    }

    /// Failed write acknowledgement
    pub fn failed(message: impl Into<String>) -> Self {
        Self { success: false, message: message.into() }
    }
}

/// Produces a textual schema description for prompt grounding
///
/// The returned text must be embeddable verbatim into a prompt: tables,
/// columns with types and constraints, and row counts.
pub trait SchemaProvider {
    /// Introspect the database and render the schema as prompt-ready text
    fn describe_schema(&self) -> impl std::future::Future<Output = Result<String>> + Send;
}

/// Executes SQL statements against a database
///
/// `execute` never fails at the type level (see module docs). `execute_write`
/// is the separate entry point for statements the user has explicitly
/// confirmed; it is never called by the question pipeline itself.
pub trait QueryExecutor {
    /// The engine behind this executor
    fn kind(&self) -> DatabaseKind;

    /// Run a statement, returning rows or the error marker
    fn execute(&self, sql: &str) -> impl std::future::Future<Output = ResultSet> + Send;

    /// Apply a confirmed mutating statement
    fn execute_write(&self, sql: &str) -> impl std::future::Future<Output = WriteAck> + Send;
}

/// Runtime-selected data source dispatching to the compiled-in engines
#[derive(Debug, Clone)]
pub enum DataSource {
    /// `SQLite` file-backed source
    #[cfg(feature = "sqlite")]
    SQLite(sqlite::SqliteExecutor),

    /// `MySQL` client-server source
    #[cfg(feature = "mysql")]
    MySQL(mysql::MySqlExecutor),
}

impl SchemaProvider for DataSource {
    async fn describe_schema(&self) -> Result<String> {
        match self {
            #[cfg(feature = "sqlite")]
            Self::SQLite(executor) => executor.describe_schema().await,
            #[cfg(feature = "mysql")]
            Self::MySQL(executor) => executor.describe_schema().await,
        }
    }
}

impl QueryExecutor for DataSource {
    fn kind(&self) -> DatabaseKind {
        match self {
            #[cfg(feature = "sqlite")]
            Self::SQLite(executor) => executor.kind(),
            #[cfg(feature = "mysql")]
            Self::MySQL(executor) => executor.kind(),
        }
    }

    async fn execute(&self, sql: &str) -> ResultSet {
        match self {
            #[cfg(feature = "sqlite")]
            Self::SQLite(executor) => executor.execute(sql).await,
            #[cfg(feature = "mysql")]
            Self::MySQL(executor) => executor.execute(sql).await,
        }
    }

    async fn execute_write(&self, sql: &str) -> WriteAck {
        match self {
            #[cfg(feature = "sqlite")]
            Self::SQLite(executor) => executor.execute_write(sql).await,
            #[cfg(feature = "mysql")]
            Self::MySQL(executor) => executor.execute_write(sql).await,
        }
    }
}
