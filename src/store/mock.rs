//! Scripted SQL executor for tests.
//!
//! Expectations are consumed in order. Every call is checked against the next
//! expectation (statement kind, SQL text and bound parameters); a mismatch
//! fails the call with `Error::Database`, so an unexpected statement surfaces
//! as an error in the code under test instead of a panic.
//!
//! ```
//! use carrent_core::store::{MockExecutor, SqlQuery, SqlValue};
//!
//! let db = MockExecutor::new();
//! db.expect_begin()
//!     .expect_exec(SqlQuery::new("DELETE FROM cars WHERE id = $1", vec![SqlValue::Int(1)]), 1)
//!     .expect_commit();
//! ```

use super::{Column, Row, SqlExecutor, SqlQuery, Transaction};
use crate::error::{Error, Result};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Statement {
    Begin,
    Query,
    Count,
    Exec,
    Scalar,
    Commit,
    Rollback,
}

#[derive(Debug, Clone)]
enum Reply {
    Unit,
    Rows(Vec<Row>),
    Count(i64),
    Affected(u64),
    Scalar(i64),
}

#[derive(Debug)]
struct Expectation {
    statement: Statement,
    query: Option<SqlQuery>,
    reply: std::result::Result<Reply, String>,
}

#[derive(Default)]
struct MockState {
    expected: VecDeque<Expectation>,
    log: Vec<String>,
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn normalize(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Executor replaying scripted replies. Clones share the same script.
#[derive(Clone, Default)]
pub struct MockExecutor {
    state: Arc<Mutex<MockState>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        MockExecutor::default()
    }

    fn push(&self, statement: Statement, query: Option<SqlQuery>, reply: Reply) -> &Self {
        lock(&self.state).expected.push_back(Expectation {
            statement,
            query,
            reply: Ok(reply),
        });
        self
    }

    pub fn expect_begin(&self) -> &Self {
        self.push(Statement::Begin, None, Reply::Unit)
    }

    pub fn expect_query(&self, query: SqlQuery, rows: Vec<Row>) -> &Self {
        self.push(Statement::Query, Some(query), Reply::Rows(rows))
    }

    pub fn expect_count(&self, query: SqlQuery, count: i64) -> &Self {
        self.push(Statement::Count, Some(query), Reply::Count(count))
    }

    pub fn expect_exec(&self, query: SqlQuery, affected: u64) -> &Self {
        self.push(Statement::Exec, Some(query), Reply::Affected(affected))
    }

    pub fn expect_scalar(&self, query: SqlQuery, value: i64) -> &Self {
        self.push(Statement::Scalar, Some(query), Reply::Scalar(value))
    }

    pub fn expect_commit(&self) -> &Self {
        self.push(Statement::Commit, None, Reply::Unit)
    }

    pub fn expect_rollback(&self) -> &Self {
        self.push(Statement::Rollback, None, Reply::Unit)
    }

    /// Make the most recently scripted expectation fail with `message`.
    pub fn will_fail(&self, message: impl Into<String>) -> &Self {
        if let Some(last) = lock(&self.state).expected.back_mut() {
            last.reply = Err(message.into());
        }
        self
    }

    /// Statements seen so far: `BEGIN`, `COMMIT`, `ROLLBACK` or the SQL text.
    pub fn statements(&self) -> Vec<String> {
        lock(&self.state).log.clone()
    }

    /// Fails if scripted expectations were never consumed.
    ///
    /// # Errors
    /// Returns `Error::Database` listing the pending expectations.
    pub fn verify(&self) -> Result<()> {
        let state = lock(&self.state);
        if state.expected.is_empty() {
            return Ok(());
        }
        let pending: Vec<String> = state
            .expected
            .iter()
            .map(|e| match &e.query {
                Some(q) => format!("{:?} {}", e.statement, q),
                None => format!("{:?}", e.statement),
            })
            .collect();
        Err(Error::Database(format!(
            "unmet expectations: {}",
            pending.join("; ")
        )))
    }

    fn call(&self, statement: Statement, query: Option<&SqlQuery>) -> Result<Reply> {
        let mut state = lock(&self.state);
        state.log.push(match (statement, query) {
            (Statement::Begin, _) => "BEGIN".to_string(),
            (Statement::Commit, _) => "COMMIT".to_string(),
            (Statement::Rollback, _) => "ROLLBACK".to_string(),
            (_, Some(q)) => normalize(&q.sql),
            (_, None) => format!("{:?}", statement),
        });

        let next = state.expected.pop_front().ok_or_else(|| {
            Error::Database(format!("unexpected {:?}: no expectations left", statement))
        })?;

        if next.statement != statement {
            return Err(Error::Database(format!(
                "expected {:?}, got {:?}",
                next.statement, statement
            )));
        }

        if let (Some(expected), Some(actual)) = (&next.query, query) {
            if normalize(&expected.sql) != normalize(&actual.sql) {
                return Err(Error::Database(format!(
                    "query mismatch: expected `{}`, got `{}`",
                    expected.sql, actual.sql
                )));
            }
            if expected.params != actual.params {
                return Err(Error::Database(format!(
                    "arguments mismatch for `{}`: expected {:?}, got {:?}",
                    actual.sql, expected.params, actual.params
                )));
            }
        }

        next.reply.map_err(Error::Database)
    }
}

fn unexpected(reply: Reply) -> Error {
    Error::Database(format!("scripted reply {:?} does not fit the call", reply))
}

impl SqlExecutor for MockExecutor {
    type Tx = MockTransaction;

    async fn begin(&self) -> Result<MockTransaction> {
        self.call(Statement::Begin, None)?;
        Ok(MockTransaction {
            db: self.clone(),
        })
    }

    async fn fetch_all(&self, query: &SqlQuery, _columns: &[Column]) -> Result<Vec<Row>> {
        match self.call(Statement::Query, Some(query))? {
            Reply::Rows(rows) => Ok(rows),
            other => Err(unexpected(other)),
        }
    }

    async fn fetch_optional(&self, query: &SqlQuery, columns: &[Column]) -> Result<Option<Row>> {
        Ok(self.fetch_all(query, columns).await?.into_iter().next())
    }

    async fn fetch_count(&self, query: &SqlQuery) -> Result<i64> {
        match self.call(Statement::Count, Some(query))? {
            Reply::Count(n) => Ok(n),
            other => Err(unexpected(other)),
        }
    }
}

/// Transaction handed out by [`MockExecutor::begin`].
pub struct MockTransaction {
    db: MockExecutor,
}

impl Transaction for MockTransaction {
    async fn execute(&mut self, query: &SqlQuery) -> Result<u64> {
        match self.db.call(Statement::Exec, Some(query))? {
            Reply::Affected(n) => Ok(n),
            other => Err(unexpected(other)),
        }
    }

    async fn fetch_scalar(&mut self, query: &SqlQuery) -> Result<i64> {
        match self.db.call(Statement::Scalar, Some(query))? {
            Reply::Scalar(v) => Ok(v),
            other => Err(unexpected(other)),
        }
    }

    async fn commit(self) -> Result<()> {
        self.db.call(Statement::Commit, None).map(|_| ())
    }

    async fn rollback(self) -> Result<()> {
        self.db.call(Statement::Rollback, None).map(|_| ())
    }
}
