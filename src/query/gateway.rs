//! Query execution on the data profile.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::ConsoleConfig;
use crate::db::{ConnectionScope, DataProfile, TabularResult};
use crate::error::{ExecutionError, ExecutionErrorKind};

use super::Query;

/// Runs validated queries with the least-privilege credentials.
///
/// The gateway owns the only data-scope capability in the process. Each call
/// acquires one connection, runs the text as a single statement and releases
/// the connection before returning, whatever the outcome.
#[derive(Debug)]
pub struct QueryGateway {
    scope: ConnectionScope<DataProfile>,
    timeout: Duration,
    max_rows: usize,
}

impl QueryGateway {
    pub fn new(scope: ConnectionScope<DataProfile>, timeout: Duration, max_rows: usize) -> Self {
        Self {
            scope,
            timeout,
            max_rows,
        }
    }

    /// Builds a gateway using the deadline and row cap from `config`.
    pub fn from_config(scope: ConnectionScope<DataProfile>, config: &ConsoleConfig) -> Self {
        Self::new(scope, config.query_timeout(), config.max_rows)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_rows(&self) -> usize {
        self.max_rows
    }

    /// Executes `query` and materializes its rows.
    ///
    /// Every failure is classified into an [`ExecutionError`] that carries
    /// the original text; a deadline overrun counts as connectivity.
    pub async fn execute(&self, query: &Query) -> Result<TabularResult, ExecutionError> {
        debug!("Executing query: {}", query.as_str());
        let start = Instant::now();

        let outcome = tokio::time::timeout(self.timeout, self.run(query)).await;
        let result = match outcome {
            Ok(result) => result,
            Err(_) => {
                warn!("Query exceeded deadline of {:?}", self.timeout);
                return Err(ExecutionError::timed_out(query.as_str(), self.timeout));
            }
        };

        match result {
            Ok(result) => {
                let elapsed = start.elapsed();
                info!(
                    "Query returned {} rows in {}ms",
                    result.row_count(),
                    elapsed.as_millis()
                );
                Ok(result.with_execution_time(elapsed))
            }
            Err(e) => {
                info!("Query failed: {}", e);
                Err(e)
            }
        }
    }

    async fn run(&self, query: &Query) -> Result<TabularResult, ExecutionError> {
        let mut conn = self.scope.acquire().await.map_err(|e| {
            ExecutionError::new(
                ExecutionErrorKind::Connectivity,
                query.as_str(),
                e.to_string(),
            )
        })?;

        conn.fetch_all(query.as_str(), self.max_rows)
            .await
            .map_err(|e| ExecutionError::from_engine(query.as_str(), e))
    }
}
