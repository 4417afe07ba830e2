//! Read-only access to the sales SQLite database.
//!
//! The connection lives behind `Arc<Mutex<Option<Connection>>>` and every
//! statement runs on the blocking pool via `tokio::task::spawn_blocking`.
//! The connection is opened with `SQLITE_OPEN_READ_ONLY`; on top of that,
//! [`SalesData::query`] only accepts a single `SELECT` / `WITH` statement.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ar_domain::error::{Error, Result};
use parking_lot::Mutex;
use regex::Regex;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use serde_json::Value;

const SALES_TABLE: &str = "sales_data";

/// Keywords refused anywhere in a query, matched as whole words.
const MUTATING_KEYWORDS: &[&str] = &[
    "drop", "delete", "update", "insert", "create", "alter", "truncate", "attach",
    "detach", "pragma", "vacuum",
];

/// Rows returned by [`SalesData::query`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Clone)]
pub struct SalesData {
    path: PathBuf,
    conn: Arc<Mutex<Option<Connection>>>,
    mutating: Arc<Regex>,
}

impl SalesData {
    /// Describe the database at `path`. Nothing is opened until
    /// [`SalesData::connect`].
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let pattern = format!(r"(?i)\b({})\b", MUTATING_KEYWORDS.join("|"));
        let mutating = Regex::new(&pattern).map_err(|e| Error::Other(e.to_string()))?;
        Ok(Self {
            path: path.as_ref().to_path_buf(),
            conn: Arc::new(Mutex::new(None)),
            mutating: Arc::new(mutating),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_connected(&self) -> bool {
        self.conn.lock().is_some()
    }

    /// Open the read-only connection. A no-op when already connected.
    pub async fn connect(&self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }
        let path = self.path.clone();
        let conn = tokio::task::spawn_blocking(move || {
            Connection::open_with_flags(
                &path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
        })
        .await
        .map_err(|e| Error::Database(format!("connect task failed: {e}")))?
        .map_err(|e| {
            Error::Database(format!("cannot open {}: {e}", self.path.display()))
        })?;

        *self.conn.lock() = Some(conn);
        tracing::info!(path = %self.path.display(), "sales database connection opened");
        Ok(())
    }

    /// Close the connection if open. Safe to call repeatedly.
    pub fn close(&self) {
        if self.conn.lock().take().is_some() {
            tracing::info!(path = %self.path.display(), "sales database connection closed");
        }
    }

    /// Run `f` against the open connection on the blocking pool.
    async fn execute<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock();
            let conn = guard
                .as_ref()
                .ok_or_else(|| Error::Database("database is not connected".into()))?;
            f(conn).map_err(|e| Error::Database(e.to_string()))
        })
        .await
        .map_err(|e| Error::Database(format!("query task failed: {e}")))?
    }

    /// Human-readable schema description used to fill the agent's
    /// instruction template: one line per table, then the distinct regions,
    /// product types, categories and reporting years.
    pub async fn database_info(&self) -> Result<String> {
        self.execute(|conn| {
            let mut tables = Vec::new();
            for table in table_names(conn)? {
                let columns = column_info(conn, &table)?;
                tables.push(format!(
                    "Table {table} Schema: Columns: {}",
                    columns.join(", ")
                ));
            }
            let mut info = tables.join("\n");

            let regions = distinct(conn, &format!("SELECT DISTINCT region FROM {SALES_TABLE}"))?;
            let types = distinct(conn, &format!("SELECT DISTINCT product_type FROM {SALES_TABLE}"))?;
            let categories =
                distinct(conn, &format!("SELECT DISTINCT main_category FROM {SALES_TABLE}"))?;
            let years = distinct(
                conn,
                &format!("SELECT DISTINCT year FROM {SALES_TABLE} ORDER BY year"),
            )?;

            info.push_str(&format!("\nRegions: {}", regions.join(", ")));
            info.push_str(&format!("\nProduct Types: {}", types.join(", ")));
            info.push_str(&format!("\nProduct Categories: {}", categories.join(", ")));
            info.push_str(&format!("\nReporting Years: {}", years.join(", ")));
            info.push_str("\n\n");
            Ok(info)
        })
        .await
    }

    /// Check that `sql` is a single read-only statement.
    pub fn check_query(&self, sql: &str) -> Result<()> {
        let trimmed = sql.trim().trim_end_matches(';').trim();
        let lower = trimmed.to_ascii_lowercase();
        if !(lower.starts_with("select") || lower.starts_with("with")) {
            return Err(Error::Database("only SELECT queries are allowed".into()));
        }
        if trimmed.contains(';') {
            return Err(Error::Database(
                "only a single statement is allowed".into(),
            ));
        }
        if let Some(m) = self.mutating.find(trimmed) {
            return Err(Error::Database(format!(
                "query contains forbidden operation '{}'",
                m.as_str().to_ascii_uppercase()
            )));
        }
        Ok(())
    }

    /// Run a read-only query and return column names plus rows.
    pub async fn query(&self, sql: &str) -> Result<QueryResult> {
        self.check_query(sql)?;
        let sql = sql.trim().trim_end_matches(';').to_string();
        tracing::debug!(sql = %sql, "sales query");

        self.execute(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
            let width = columns.len();
            let mut rows = Vec::new();
            let mut cursor = stmt.query([])?;
            while let Some(row) = cursor.next()? {
                let mut values = Vec::with_capacity(width);
                for i in 0..width {
                    values.push(json_value(row.get_ref(i)?));
                }
                rows.push(values);
            }
            Ok(QueryResult { columns, rows })
        })
        .await
    }
}

// ── helpers ─────────────────────────────────────────────────────────

fn table_names(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name != 'sqlite_sequence' ORDER BY rowid",
    )?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(names)
}

fn column_info(conn: &Connection, table: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name, type FROM pragma_table_info(?1)")?;
    let cols = stmt
        .query_map([table], |row| {
            let name: String = row.get(0)?;
            let ty: String = row.get(1)?;
            Ok(format!("{name}: ({ty})"))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(cols)
}

fn distinct(conn: &Connection, sql: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let values = stmt
        .query_map([], |row| Ok(display_value(row.get_ref(0)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(values)
}

fn display_value(v: ValueRef<'_>) -> String {
    match v {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
        ValueRef::Blob(b) => format!("<{} bytes>", b.len()),
    }
}

fn json_value(v: ValueRef<'_>) -> Value {
    match v {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(format!("<{} bytes>", b.len())),
    }
}
