//! SQL executor abstraction consumed by the repositories.
//!
//! The repositories build parameterized statements (see [`crate::query`]) and
//! hand them to an [`SqlExecutor`]. Mutations run inside a [`Transaction`]
//! obtained from [`SqlExecutor::begin`].
//!
//! Two executors ship with the crate:
//!
//! - `PgExecutor` (feature `postgres`): sqlx over a `PgPool`
//! - [`MockExecutor`]: scripted expectations, for tests

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use std::fmt;

pub mod mock;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use mock::MockExecutor;
#[cfg(feature = "postgres")]
pub use postgres::{PgConfig, PgExecutor};

/// Storage type of a column, used to bind typed NULLs and to decode rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Int,
    Float,
    Text,
    Timestamp,
}

/// Column of an entity table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub ty: ColumnType,
}

impl Column {
    pub const fn new(name: &'static str, ty: ColumnType) -> Self {
        Column { name, ty }
    }
}

/// Bound parameter or decoded cell.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null(ColumnType),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null(_) => write!(f, "NULL"),
            SqlValue::Int(v) => write!(f, "{}", v),
            SqlValue::Float(v) => write!(f, "{}", v),
            SqlValue::Text(v) => write!(f, "'{}'", v),
            SqlValue::Timestamp(v) => write!(f, "'{}'", v.to_rfc3339()),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(v)
    }
}

impl From<Option<i64>> for SqlValue {
    fn from(v: Option<i64>) -> Self {
        v.map_or(SqlValue::Null(ColumnType::Int), SqlValue::Int)
    }
}

impl From<Option<DateTime<Utc>>> for SqlValue {
    fn from(v: Option<DateTime<Utc>>) -> Self {
        v.map_or(SqlValue::Null(ColumnType::Timestamp), SqlValue::Timestamp)
    }
}

/// Parameterized statement with `$n` placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl SqlQuery {
    pub fn new(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        SqlQuery {
            sql: sql.into(),
            params,
        }
    }
}

impl fmt::Display for SqlQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql)?;
        if !self.params.is_empty() {
            let params: Vec<String> = self.params.iter().map(|p| p.to_string()).collect();
            write!(f, " [{}]", params.join(", "))?;
        }
        Ok(())
    }
}

/// One decoded result row, addressed by column name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    cells: Vec<(String, SqlValue)>,
}

impl Row {
    pub fn new() -> Self {
        Row::default()
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.push(column, value);
        self
    }

    pub fn push(&mut self, column: impl Into<String>, value: impl Into<SqlValue>) {
        self.cells.push((column.into(), value.into()));
    }

    pub fn get(&self, column: &str) -> Result<&SqlValue> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
            .ok_or_else(|| Error::Database(format!("missing column {}", column)))
    }

    pub fn get_opt_i64(&self, column: &str) -> Result<Option<i64>> {
        match self.get(column)? {
            SqlValue::Int(v) => Ok(Some(*v)),
            SqlValue::Null(_) => Ok(None),
            other => Err(mismatch(column, "integer", other)),
        }
    }

    pub fn get_i64(&self, column: &str) -> Result<i64> {
        self.get_opt_i64(column)?
            .ok_or_else(|| Error::Database(format!("unexpected NULL in column {}", column)))
    }

    pub fn get_f64(&self, column: &str) -> Result<f64> {
        match self.get(column)? {
            SqlValue::Float(v) => Ok(*v),
            // integer-typed numerics are accepted where a float is expected
            SqlValue::Int(v) => Ok(*v as f64),
            other => Err(mismatch(column, "float", other)),
        }
    }

    pub fn get_string(&self, column: &str) -> Result<String> {
        match self.get(column)? {
            SqlValue::Text(v) => Ok(v.clone()),
            other => Err(mismatch(column, "text", other)),
        }
    }

    pub fn get_opt_time(&self, column: &str) -> Result<Option<DateTime<Utc>>> {
        match self.get(column)? {
            SqlValue::Timestamp(v) => Ok(Some(*v)),
            SqlValue::Null(_) => Ok(None),
            other => Err(mismatch(column, "timestamp", other)),
        }
    }

    pub fn get_time(&self, column: &str) -> Result<DateTime<Utc>> {
        self.get_opt_time(column)?
            .ok_or_else(|| Error::Database(format!("unexpected NULL in column {}", column)))
    }
}

fn mismatch(column: &str, expected: &str, found: &SqlValue) -> Error {
    Error::Database(format!(
        "column {}: expected {}, found {:?}",
        column, expected, found
    ))
}

/// SQL-capable executor.
///
/// Reads run directly on the executor; writes go through [`Transaction`].
/// Implementations return `Error::Database` for driver failures and leave
/// the wrapping into an operation kind to the repository.
#[allow(async_fn_in_trait)]
pub trait SqlExecutor: Send + Sync + Clone {
    type Tx: Transaction;

    /// Open a transaction.
    ///
    /// # Errors
    /// Returns `Err` if no connection is available or `BEGIN` fails.
    async fn begin(&self) -> Result<Self::Tx>;

    /// Run a `SELECT` and decode every row according to `columns`.
    ///
    /// # Errors
    /// Returns `Err` on driver or decode failure.
    async fn fetch_all(&self, query: &SqlQuery, columns: &[Column]) -> Result<Vec<Row>>;

    /// Run a `SELECT` expected to yield at most one row.
    ///
    /// # Errors
    /// Returns `Err` on driver or decode failure.
    async fn fetch_optional(&self, query: &SqlQuery, columns: &[Column]) -> Result<Option<Row>>;

    /// Run a `SELECT COUNT(*)`.
    ///
    /// # Errors
    /// Returns `Err` on driver failure.
    async fn fetch_count(&self, query: &SqlQuery) -> Result<i64>;
}

/// Unit of work opened by [`SqlExecutor::begin`].
///
/// A transaction dropped without `commit` must not persist anything.
#[allow(async_fn_in_trait)]
pub trait Transaction: Send {
    /// Execute a statement, returning the number of affected rows.
    async fn execute(&mut self, query: &SqlQuery) -> Result<u64>;

    /// Execute a statement returning a single integer (e.g. `RETURNING id`).
    async fn fetch_scalar(&mut self, query: &SqlQuery) -> Result<i64>;

    async fn commit(self) -> Result<()>;

    async fn rollback(self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_row_getters() {
        let at = Utc.with_ymd_and_hms(2022, 2, 22, 2, 0, 0).unwrap();
        let row = Row::new()
            .with("id", 1i64)
            .with("car_name", "sedan")
            .with("day_rate", 12000i64)
            .with("created_at", at)
            .with("deleted_at", None::<DateTime<Utc>>);

        assert_eq!(row.get_i64("id").unwrap(), 1);
        assert_eq!(row.get_string("car_name").unwrap(), "sedan");
        assert_eq!(row.get_f64("day_rate").unwrap(), 12000.0);
        assert_eq!(row.get_time("created_at").unwrap(), at);
        assert_eq!(row.get_opt_time("deleted_at").unwrap(), None);
    }

    #[test]
    fn test_row_errors() {
        let row = Row::new().with("id", "x").with("deleted_by", None::<i64>);

        assert!(matches!(row.get_i64("id"), Err(Error::Database(_))));
        assert!(matches!(row.get_i64("missing"), Err(Error::Database(_))));
        assert!(matches!(row.get_i64("deleted_by"), Err(Error::Database(_))));
        assert_eq!(row.get_opt_i64("deleted_by").unwrap(), None);
    }

    #[test]
    fn test_query_display() {
        let query = SqlQuery::new(
            "DELETE FROM cars WHERE id = $1",
            vec![SqlValue::Int(1)],
        );
        assert_eq!(query.to_string(), "DELETE FROM cars WHERE id = $1 [1]");
    }
}
