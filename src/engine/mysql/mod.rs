//! MySQL Data-Source Implementation
//!
//! Implements [`SchemaProvider`] and [`QueryExecutor`] for MySQL databases
//! (including MariaDB).
//!
//! # Features
//! - Client-server connections via TCP
//! - Schema description via `information_schema`, with row counts
//! - DECIMAL values parsed to JSON numbers, temporal values rendered as
//!   ISO-8601 strings, BLOB data Base64-encoded for JSON safety
//!
//! # Implementation Notes
//! - Uses `mysql_async` (async driver, requires tokio runtime)
//! - Connections are opened, used, and disconnected per call; the agent
//!   holds no persistent connection

use mysql_async::consts::ColumnType;
use mysql_async::{prelude::*, Conn, Opts, OptsBuilder, Row};

use crate::engine::{
    DatabaseKind, QueryExecutor, ResultRow, ResultSet, Rows, SchemaProvider, WriteAck,
};
use crate::error::{Result, TabletalkError};

/// MySQL data source
#[derive(Debug, Clone)]
pub struct MySqlExecutor {
    opts: Opts,
    database: String,
}

impl MySqlExecutor {
    /// Create a data source for the given server and database
    pub fn new(
        host: impl Into<String>,
        port: u16,
        user: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        let database = database.into();
        let opts = OptsBuilder::default()
            .ip_or_hostname(host.into())
            .tcp_port(port)
            .user(Some(user.into()))
            .pass(Some(password.into()))
            .db_name(Some(database.clone()));

        Self { opts: opts.into(), database }
    }

    async fn connect(&self) -> std::result::Result<Conn, mysql_async::Error> {
        Conn::new(self.opts.clone()).await
    }
}

impl SchemaProvider for MySqlExecutor {
    async fn describe_schema(&self) -> Result<String> {
        let mut conn = self
            .connect()
            .await
            .map_err(|e| TabletalkError::schema_failed(format!("connection failed: {e}")))?;

        let table_names: Vec<String> = conn
            .exec(
                "SELECT table_name
                 FROM information_schema.tables
                 WHERE table_schema = ?
                 AND table_type = 'BASE TABLE'
                 ORDER BY table_name",
                (self.database.as_str(),),
            )
            .await
            .map_err(|e| TabletalkError::schema_failed(format!("failed to list tables: {e}")))?;

        let mut schema = String::from("DATABASE SCHEMA (MySQL):\n\n");
        for table in &table_names {
            schema.push_str(&describe_table(&mut conn, &self.database, table).await?);
            schema.push('\n');
        }

        let _ = conn.disconnect().await;
        Ok(schema)
    }
}

impl QueryExecutor for MySqlExecutor {
    fn kind(&self) -> DatabaseKind {
        DatabaseKind::MySQL
    }

    async fn execute(&self, sql: &str) -> ResultSet {
        let mut conn = match self.connect().await {
            Ok(conn) => conn,
            Err(e) => return ResultSet::error(e.to_string()),
        };

        let result = match conn.query::<Row, _>(sql).await {
            Ok(rows) => match collect_rows(rows) {
                Ok(rows) => ResultSet::Rows(rows),
                Err(message) => ResultSet::error(message),
            },
            Err(e) => ResultSet::error(e.to_string()),
        };

        let _ = conn.disconnect().await;
        result
    }

    async fn execute_write(&self, sql: &str) -> WriteAck {
        let mut conn = match self.connect().await {
            Ok(conn) => conn,
            Err(e) => return WriteAck::failed(e.to_string()),
        };

        let ack = match conn.query_iter(sql).await {
            Ok(result) => {
                let affected = result.affected_rows();
                drop(result);
                WriteAck::ok(format!("{affected} row(s) affected"))
            }
            Err(e) => WriteAck::failed(e.to_string()),
        };

        let _ = conn.disconnect().await;
        ack
    }
}

/// Render one table's columns, constraints, and row count
async fn describe_table(conn: &mut Conn, schema: &str, table: &str) -> Result<String> {
    let columns: Vec<(String, String, String, String, String)> = conn
        .exec(
            "SELECT column_name, column_type, is_nullable, column_key, extra
             FROM information_schema.columns
             WHERE table_schema = ? AND table_name = ?
             ORDER BY ordinal_position",
            (schema, table),
        )
        .await
        .map_err(|e| {
            TabletalkError::schema_failed(format!("failed to read columns of {table}: {e}"))
        })?;

    let row_count: i64 = conn
        .query_first(format!("SELECT COUNT(*) FROM `{table}`"))
        .await
        .map_err(|e| TabletalkError::schema_failed(format!("failed to count {table}: {e}")))?
        .unwrap_or(0);

    let mut text = format!("Table: {table}\n");
    for (name, column_type, is_nullable, key, extra) in columns {
        let mut constraints = Vec::new();
        if key == "PRI" {
            constraints.push("PRIMARY KEY".to_string());
        }
        if is_nullable == "NO" {
            constraints.push("NOT NULL".to_string());
        }
        if !extra.is_empty() {
            constraints.push(extra);
        }

        if constraints.is_empty() {
            text.push_str(&format!("  - {name}: {column_type}\n"));
        } else {
            text.push_str(&format!("  - {name}: {column_type} ({})\n", constraints.join(", ")));
        }
    }
    text.push_str(&format!("  Row count: {row_count}\n"));

    Ok(text)
}

/// Convert driver rows into the normalized result shape
fn collect_rows(rows: Vec<Row>) -> std::result::Result<Rows, String> {
    let columns: Vec<String> = rows
        .first()
        .map(|row| row.columns_ref().iter().map(|col| col.name_str().to_string()).collect())
        .unwrap_or_default();

    let mut rows_data = Vec::new();
    for row in &rows {
        rows_data.push(row_to_json(row)?);
    }

    Ok(Rows { columns, rows: rows_data })
}

/// Convert a MySQL row to a JSON-safe map
fn row_to_json(row: &Row) -> std::result::Result<ResultRow, String> {
    let mut map = ResultRow::new();

    for (idx, column) in row.columns_ref().iter().enumerate() {
        let value = mysql_value_to_json(row, idx)?;
        map.insert(column.name_str().to_string(), value);
    }

    Ok(map)
}

/// Convert a MySQL value to a JSON value with decimal/temporal normalization
fn mysql_value_to_json(row: &Row, idx: usize) -> std::result::Result<serde_json::Value, String> {
    use mysql_async::Value;

    let value =
        row.as_ref(idx).ok_or_else(|| format!("failed to read value at index {idx}"))?;
    let column_type = row.columns_ref()[idx].column_type();

    let json_value = match value {
        Value::NULL => serde_json::Value::Null,

        Value::Bytes(bytes) => {
            if let Ok(s) = std::str::from_utf8(bytes) {
                // DECIMAL arrives as text; the contract is a JSON number
                if is_decimal(column_type) {
                    s.parse::<f64>()
                        .ok()
                        .and_then(serde_json::Number::from_f64)
                        .map_or_else(
                            || serde_json::Value::String(s.to_string()),
                            serde_json::Value::Number,
                        )
                } else {
                    serde_json::Value::String(s.to_string())
                }
            } else {
                // Binary data - encode as Base64
                use base64::Engine;
                let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
                serde_json::Value::String(encoded)
            }
        }

        Value::Int(i) => serde_json::Value::Number((*i).into()),

        Value::UInt(u) => serde_json::json!(*u),

        Value::Float(f) => serde_json::Number::from_f64(f64::from(*f))
            .map_or(serde_json::Value::Null, serde_json::Value::Number), // NaN/Infinity as null

        Value::Double(d) => serde_json::Number::from_f64(*d)
            .map_or(serde_json::Value::Null, serde_json::Value::Number), // NaN/Infinity as null

        Value::Date(year, month, day, hour, minute, second, micro) => {
            serde_json::Value::String(format_temporal(
                (*year, *month, *day, *hour, *minute, *second, *micro),
                column_type == ColumnType::MYSQL_TYPE_DATE,
            ))
        }

        Value::Time(is_negative, days, hours, minutes, seconds, microseconds) => {
            let sign = if *is_negative { "-" } else { "" };
            let total_hours = days * 24 + u32::from(*hours);
            serde_json::Value::String(format!(
                "{sign}{total_hours}:{minutes:02}:{seconds:02}.{microseconds:06}"
            ))
        }
    };

    Ok(json_value)
}

const fn is_decimal(column_type: ColumnType) -> bool {
    matches!(
        column_type,
        ColumnType::MYSQL_TYPE_DECIMAL | ColumnType::MYSQL_TYPE_NEWDECIMAL
    )
}

/// ISO-8601 rendering: date-only for DATE columns, full datetime otherwise
fn format_temporal(
    (year, month, day, hour, minute, second, micro): (u16, u8, u8, u8, u8, u8, u32),
    date_only: bool,
) -> String {
    if date_only {
        format!("{year:04}-{month:02}-{day:02}")
    } else if micro == 0 {
        format!("{year:04}-{month:02}-{day:02}T{hour:02}:{minute:02}:{second:02}")
    } else {
        format!("{year:04}-{month:02}-{day:02}T{hour:02}:{minute:02}:{second:02}.{micro:06}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_temporal_date_only() {
        assert_eq!(format_temporal((2024, 3, 1, 0, 0, 0, 0), true), "2024-03-01");
    }

    #[test]
    fn test_format_temporal_datetime() {
        assert_eq!(
            format_temporal((2024, 3, 1, 9, 30, 5, 0), false),
            "2024-03-01T09:30:05"
        );
        assert_eq!(
            format_temporal((2024, 3, 1, 9, 30, 5, 120), false),
            "2024-03-01T09:30:05.000120"
        );
    }

    #[test]
    fn test_is_decimal() {
        assert!(is_decimal(ColumnType::MYSQL_TYPE_NEWDECIMAL));
        assert!(!is_decimal(ColumnType::MYSQL_TYPE_VARCHAR));
    }

    // Note: Integration tests require a running MySQL instance
    // They are marked with #[ignore] and should be run with:
    // cargo test --features mysql -- --ignored

    #[tokio::test]
    #[ignore] // Requires running MySQL instance
    async fn test_describe_schema_live() {
        let source = MySqlExecutor::new("localhost", 3306, "root", "password", "test");
        let schema = source.describe_schema().await.unwrap();
        assert!(schema.starts_with("DATABASE SCHEMA (MySQL):"));
    }

    #[tokio::test]
    #[ignore] // Requires running MySQL instance
    async fn test_execute_live() {
        let source = MySqlExecutor::new("localhost", 3306, "root", "password", "test");
        let result = source.execute("SELECT 1 AS one").await;
        assert!(!result.is_error());
    }
}
