//! PostgreSQL executor built on sqlx.

use super::{Column, ColumnType, Row, SqlExecutor, SqlQuery, SqlValue, Transaction};
use crate::config::env_parse;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions, PgRow};
use sqlx::{Arguments, Postgres, Row as _};

const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Connection settings for the relational store.
#[derive(Clone, Debug)]
pub struct PgConfig {
    pub url: String,
    pub max_connections: u32,
}

impl PgConfig {
    pub fn new(url: impl Into<String>) -> Self {
        PgConfig {
            url: url.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }

    /// Read `DATABASE_URL` (required) and `DATABASE_MAX_CONNECTIONS`.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` if the URL is missing or the pool size is
    /// not a number.
    pub fn from_env() -> Result<Self> {
        let url = std::env::var("DATABASE_URL")
            .map_err(|_| Error::ConfigError("DATABASE_URL is not set".to_string()))?;
        Ok(PgConfig {
            url,
            max_connections: env_parse("DATABASE_MAX_CONNECTIONS")?
                .unwrap_or(DEFAULT_MAX_CONNECTIONS),
        })
    }
}

/// sqlx-backed [`SqlExecutor`].
#[derive(Clone)]
pub struct PgExecutor {
    pool: PgPool,
}

impl PgExecutor {
    pub fn new(pool: PgPool) -> Self {
        PgExecutor { pool }
    }

    /// Open a pool for `config`.
    ///
    /// # Errors
    /// Returns `Error::Database` if the server cannot be reached.
    pub async fn connect(config: &PgConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await?;
        info!(
            "✓ PostgreSQL pool initialized (max connections: {})",
            config.max_connections
        );
        Ok(PgExecutor { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn arguments(params: &[SqlValue]) -> Result<PgArguments> {
    let mut args = PgArguments::default();
    for param in params {
        let bound = match param {
            SqlValue::Null(ColumnType::Int) => args.add(None::<i64>),
            SqlValue::Null(ColumnType::Float) => args.add(None::<f64>),
            SqlValue::Null(ColumnType::Text) => args.add(None::<String>),
            SqlValue::Null(ColumnType::Timestamp) => args.add(None::<DateTime<Utc>>),
            SqlValue::Int(v) => args.add(*v),
            SqlValue::Float(v) => args.add(*v),
            SqlValue::Text(v) => args.add(v.clone()),
            SqlValue::Timestamp(v) => args.add(*v),
        };
        bound.map_err(|e| Error::Database(format!("bind failed: {}", e)))?;
    }
    Ok(args)
}

fn decode(row: &PgRow, columns: &[Column]) -> Result<Row> {
    let mut decoded = Row::new();
    for column in columns {
        let name = column.name;
        let value = match column.ty {
            ColumnType::Int => row
                .try_get::<Option<i64>, _>(name)?
                .map_or(SqlValue::Null(ColumnType::Int), SqlValue::Int),
            ColumnType::Float => row
                .try_get::<Option<f64>, _>(name)?
                .map_or(SqlValue::Null(ColumnType::Float), SqlValue::Float),
            ColumnType::Text => row
                .try_get::<Option<String>, _>(name)?
                .map_or(SqlValue::Null(ColumnType::Text), SqlValue::Text),
            ColumnType::Timestamp => row
                .try_get::<Option<DateTime<Utc>>, _>(name)?
                .map_or(SqlValue::Null(ColumnType::Timestamp), SqlValue::Timestamp),
        };
        decoded.push(name, value);
    }
    Ok(decoded)
}

impl SqlExecutor for PgExecutor {
    type Tx = PgTransaction;

    async fn begin(&self) -> Result<PgTransaction> {
        debug!("✓ PostgreSQL BEGIN");
        let tx = self.pool.begin().await?;
        Ok(PgTransaction { tx })
    }

    async fn fetch_all(&self, query: &SqlQuery, columns: &[Column]) -> Result<Vec<Row>> {
        debug!("✓ PostgreSQL {}", query);
        let rows = sqlx::query_with(&query.sql, arguments(&query.params)?)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(|row| decode(row, columns)).collect()
    }

    async fn fetch_optional(&self, query: &SqlQuery, columns: &[Column]) -> Result<Option<Row>> {
        debug!("✓ PostgreSQL {}", query);
        let row = sqlx::query_with(&query.sql, arguments(&query.params)?)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| decode(&row, columns)).transpose()
    }

    async fn fetch_count(&self, query: &SqlQuery) -> Result<i64> {
        debug!("✓ PostgreSQL {}", query);
        let count: i64 = sqlx::query_scalar_with(&query.sql, arguments(&query.params)?)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

/// Open sqlx transaction. Dropping it without `commit` rolls back.
pub struct PgTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

impl Transaction for PgTransaction {
    async fn execute(&mut self, query: &SqlQuery) -> Result<u64> {
        debug!("✓ PostgreSQL {}", query);
        let done = sqlx::query_with(&query.sql, arguments(&query.params)?)
            .execute(&mut *self.tx)
            .await?;
        Ok(done.rows_affected())
    }

    async fn fetch_scalar(&mut self, query: &SqlQuery) -> Result<i64> {
        debug!("✓ PostgreSQL {}", query);
        let value: i64 = sqlx::query_scalar_with(&query.sql, arguments(&query.params)?)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(value)
    }

    async fn commit(self) -> Result<()> {
        debug!("✓ PostgreSQL COMMIT");
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        debug!("✓ PostgreSQL ROLLBACK");
        self.tx.rollback().await?;
        Ok(())
    }
}
