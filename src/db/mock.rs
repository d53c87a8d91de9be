//! In-memory engine for tests and `--mock-db` mode.
//!
//! Every connection and statement is recorded together with the profile of
//! the connector that issued it, so tests can assert which credentials were
//! used where. Unscripted queries are evaluated by a tiny literal-only
//! evaluator: `SELECT 1 AS x` works, anything reading a table fails the way
//! PostgreSQL would on an empty database.

use super::{ColumnInfo, Connector, EngineConnection, Profile, TabularResult, Value};
use crate::error::{ConnectivityError, EngineError};
use async_trait::async_trait;
use sqlparser::ast::{
    Expr, SelectItem, SetExpr, Statement, UnaryOperator, Value as SqlValue,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime};

/// Kind of operation recorded by the mock engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockOp {
    Connect,
    Fetch,
    ExecuteAtomic,
}

/// One recorded operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    pub profile: Profile,
    pub op: MockOp,
    /// Statement text; empty for `Connect`.
    pub statement: String,
}

/// A committed atomic statement.
#[derive(Debug, Clone)]
pub struct StoredStatement {
    pub profile: Profile,
    pub statement: String,
    pub params: Vec<String>,
    pub created_at: SystemTime,
}

#[derive(Default)]
struct MockState {
    responses: HashMap<String, Result<TabularResult, EngineError>>,
    unreachable: HashSet<Profile>,
    write_failure: Option<EngineError>,
    latency: Option<Duration>,
    calls: Vec<MockCall>,
    committed: Vec<StoredStatement>,
    acquired: usize,
    released: usize,
}

/// Shared in-memory engine. Clones observe the same state.
#[derive(Clone, Default)]
pub struct MockEngine {
    state: Arc<Mutex<MockState>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a connector bound to `profile`.
    pub fn connector(&self, profile: Profile) -> Arc<dyn Connector> {
        Arc::new(MockConnector {
            engine: self.clone(),
            profile,
        })
    }

    /// Scripts the outcome of an exact (trimmed) statement text.
    pub fn respond(&self, sql: &str, outcome: Result<TabularResult, EngineError>) {
        self.state().responses.insert(sql.trim().to_string(), outcome);
    }

    /// Makes every connection attempt for `profile` fail.
    pub fn set_unreachable(&self, profile: Profile) {
        self.state().unreachable.insert(profile);
    }

    /// Makes every atomic statement fail (and roll back) with `error`.
    pub fn fail_writes(&self, error: EngineError) {
        self.state().write_failure = Some(error);
    }

    /// Delays every statement, for deadline tests.
    pub fn set_latency(&self, latency: Duration) {
        self.state().latency = Some(latency);
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.state().calls.clone()
    }

    /// Number of `Fetch` operations issued.
    pub fn fetch_count(&self) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| c.op == MockOp::Fetch)
            .count()
    }

    /// Number of connections opened.
    pub fn acquired(&self) -> usize {
        self.state().acquired
    }

    /// Number of connections released.
    pub fn released(&self) -> usize {
        self.state().released
    }

    /// Statements committed through `execute_atomic`.
    pub fn committed(&self) -> Vec<StoredStatement> {
        self.state().committed.clone()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, profile: Profile, op: MockOp, statement: &str) {
        self.state().calls.push(MockCall {
            profile,
            op,
            statement: statement.to_string(),
        });
    }

    async fn simulate_latency(&self) {
        let latency = self.state().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

struct MockConnector {
    engine: MockEngine,
    profile: Profile,
}

#[async_trait]
impl Connector for MockConnector {
    fn profile(&self) -> Profile {
        self.profile
    }

    async fn connect(&self) -> Result<Box<dyn EngineConnection>, ConnectivityError> {
        self.engine.record(self.profile, MockOp::Connect, "");
        let mut state = self.engine.state();
        if state.unreachable.contains(&self.profile) {
            return Err(ConnectivityError::new(
                self.profile,
                "connection refused (mock engine)",
            ));
        }
        state.acquired += 1;
        Ok(Box::new(MockConnection {
            engine: self.engine.clone(),
            profile: self.profile,
        }))
    }
}

struct MockConnection {
    engine: MockEngine,
    profile: Profile,
}

#[async_trait]
impl EngineConnection for MockConnection {
    async fn fetch_all(&mut self, sql: &str, max_rows: usize) -> Result<TabularResult, EngineError> {
        self.engine.record(self.profile, MockOp::Fetch, sql);
        self.engine.simulate_latency().await;

        let scripted = self.engine.state().responses.get(sql.trim()).cloned();
        let result = match scripted {
            Some(outcome) => outcome?,
            None => evaluate(sql)?,
        };

        let total = result.total_rows();
        if result.row_count() <= max_rows {
            return Ok(result);
        }
        let rows = result.rows().iter().take(max_rows).cloned().collect();
        Ok(TabularResult::new(result.columns().to_vec(), rows)
            .truncated_from(total)
            .with_execution_time(result.execution_time()))
    }

    async fn execute_atomic(&mut self, statement: &str, params: &[String]) -> Result<u64, EngineError> {
        self.engine
            .record(self.profile, MockOp::ExecuteAtomic, statement);
        self.engine.simulate_latency().await;

        let mut state = self.engine.state();
        if let Some(error) = state.write_failure.clone() {
            return Err(error);
        }
        state.committed.push(StoredStatement {
            profile: self.profile,
            statement: statement.to_string(),
            params: params.to_vec(),
            created_at: SystemTime::now(),
        });
        Ok(1)
    }
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        self.engine.state().released += 1;
    }
}

/// Evaluates literal-only SELECT statements.
fn evaluate(sql: &str) -> Result<TabularResult, EngineError> {
    let statements = Parser::parse_sql(&PostgreSqlDialect {}, sql)
        .map_err(|e| EngineError::database("42601", format!("syntax error: {e}")))?;

    match statements.as_slice() {
        [Statement::Query(query)] => match query.body.as_ref() {
            SetExpr::Select(select) => {
                if let Some(table) = select.from.first() {
                    return Err(EngineError::database(
                        "42P01",
                        format!("relation \"{}\" does not exist", table.relation),
                    ));
                }
                if select.selection.is_some() {
                    return Err(unsupported("WHERE without FROM"));
                }

                let mut columns = Vec::with_capacity(select.projection.len());
                let mut row = Vec::with_capacity(select.projection.len());
                for item in &select.projection {
                    let (expr, name) = match item {
                        SelectItem::UnnamedExpr(expr) => (expr, "?column?".to_string()),
                        SelectItem::ExprWithAlias { expr, alias } => (expr, alias.value.clone()),
                        _ => {
                            return Err(EngineError::database(
                                "42601",
                                "SELECT * with no tables specified is not valid",
                            ))
                        }
                    };
                    let value = literal(expr)?;
                    columns.push(ColumnInfo::new(name, type_name(&value)));
                    row.push(value);
                }
                Ok(TabularResult::new(columns, vec![row]))
            }
            other => Err(unsupported(&other.to_string())),
        },
        // Non-query statements succeed without rows.
        [_] => Ok(TabularResult::default()),
        [] => Ok(TabularResult::default()),
        _ => Err(EngineError::database(
            "42601",
            "cannot insert multiple commands into a prepared statement",
        )),
    }
}

fn literal(expr: &Expr) -> Result<Value, EngineError> {
    match expr {
        Expr::Value(SqlValue::Number(n, _)) => n
            .parse::<i64>()
            .map(Value::Int)
            .or_else(|_| n.parse::<f64>().map(Value::Float))
            .map_err(|_| unsupported(n)),
        Expr::Value(SqlValue::SingleQuotedString(s)) => Ok(Value::String(s.clone())),
        Expr::Value(SqlValue::Boolean(b)) => Ok(Value::Bool(*b)),
        Expr::Value(SqlValue::Null) => Ok(Value::Null),
        Expr::UnaryOp {
            op: UnaryOperator::Minus,
            expr,
        } => match literal(expr)? {
            Value::Int(i) => Ok(Value::Int(-i)),
            Value::Float(f) => Ok(Value::Float(-f)),
            _ => Err(unsupported(&expr.to_string())),
        },
        Expr::Nested(inner) => literal(inner),
        other => Err(unsupported(&other.to_string())),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "UNKNOWN",
        Value::Bool(_) => "BOOL",
        Value::Int(_) => "INT4",
        Value::Float(_) => "NUMERIC",
        Value::String(_) => "TEXT",
        Value::Bytes(_) => "BYTEA",
    }
}

fn unsupported(what: &str) -> EngineError {
    EngineError::database("0A000", format!("mock engine cannot evaluate {what}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn fetch(engine: &MockEngine, sql: &str) -> Result<TabularResult, EngineError> {
        let mut conn = engine.connector(Profile::Data).connect().await.unwrap();
        conn.fetch_all(sql, 100).await
    }

    #[tokio::test]
    async fn test_literal_select() {
        let engine = MockEngine::new();
        let result = fetch(&engine, "SELECT 1 AS x, 'a' AS y, -2.5, NULL AS z")
            .await
            .unwrap();

        let names: Vec<_> = result.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["x", "y", "?column?", "z"]);
        assert_eq!(result.get(0, "x"), Some(&Value::Int(1)));
        assert_eq!(result.get(0, "y"), Some(&Value::from("a")));
        assert_eq!(result.get(0, "?column?"), Some(&Value::Float(-2.5)));
        assert_eq!(result.get(0, "z"), Some(&Value::Null));
        assert_eq!(result.columns()[0].data_type, "INT4");
    }

    #[tokio::test]
    async fn test_malformed_sql_is_syntax_error() {
        let engine = MockEngine::new();
        let err = fetch(&engine, "SELEKT 1").await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Database { code: Some(ref c), .. } if c == "42601"
        ));
    }

    #[tokio::test]
    async fn test_table_reference_is_undefined() {
        let engine = MockEngine::new();
        let err = fetch(&engine, "SELECT * FROM customer").await.unwrap_err();
        assert_eq!(err.to_string(), "relation \"customer\" does not exist");
    }

    #[tokio::test]
    async fn test_scripted_response_and_truncation() {
        let engine = MockEngine::new();
        let rows = (0..5).map(|i| vec![Value::Int(i)]).collect();
        engine.respond(
            "SELECT n FROM numbers",
            Ok(TabularResult::new(vec![ColumnInfo::new("n", "int4")], rows)),
        );

        let mut conn = engine.connector(Profile::Data).connect().await.unwrap();
        let result = conn.fetch_all("SELECT n FROM numbers ", 3).await.unwrap();
        assert_eq!(result.row_count(), 3);
        assert_eq!(result.total_rows(), 5);
        assert!(result.was_truncated());
    }

    #[tokio::test]
    async fn test_atomic_write_failure_commits_nothing() {
        let engine = MockEngine::new();
        engine.fail_writes(EngineError::Connectivity("reset".to_string()));
        let mut conn = engine.connector(Profile::Audit).connect().await.unwrap();

        assert!(conn
            .execute_atomic("INSERT INTO t VALUES ($1)", &["a".to_string()])
            .await
            .is_err());
        assert!(engine.committed().is_empty());
    }

    #[tokio::test]
    async fn test_calls_record_profile() {
        let engine = MockEngine::new();
        let mut data = engine.connector(Profile::Data).connect().await.unwrap();
        let _ = data.fetch_all("SELECT 1", 10).await;
        let mut audit = engine.connector(Profile::Audit).connect().await.unwrap();
        audit
            .execute_atomic("INSERT INTO t VALUES ($1)", &["q".to_string()])
            .await
            .unwrap();
        drop(data);
        drop(audit);

        let calls = engine.calls();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[1].profile, Profile::Data);
        assert_eq!(calls[1].op, MockOp::Fetch);
        assert_eq!(calls[3].profile, Profile::Audit);
        assert_eq!(calls[3].op, MockOp::ExecuteAtomic);
        assert_eq!(engine.acquired(), engine.released());
        assert_eq!(engine.committed()[0].params, vec!["q".to_string()]);
    }
}
