//! Failure records written with the audit credentials.
//!
//! The audit logger owns the only audit-scope capability in the process.
//! A write is attempted once per failed execution; if it fails the error is
//! logged and returned so the UI can show it next to the execution error.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::AuditConfig;
use crate::db::{AuditProfile, ConnectionScope};
use crate::error::LogError;
use crate::query::Query;

/// Writes one record per failed query into the audit store.
#[derive(Debug)]
pub struct AuditLogger {
    scope: ConnectionScope<AuditProfile>,
    table: String,
    timeout: Duration,
}

impl AuditLogger {
    /// `table` must already be a validated identifier; it is interpolated
    /// into the statement text while the values are bound as parameters.
    pub fn new(scope: ConnectionScope<AuditProfile>, table: impl Into<String>, timeout: Duration) -> Self {
        Self {
            scope,
            table: table.into(),
            timeout,
        }
    }

    pub fn from_config(scope: ConnectionScope<AuditProfile>, config: &AuditConfig) -> Self {
        Self::new(scope, config.table.clone(), config.timeout())
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn insert_statement(&self) -> String {
        format!(
            "INSERT INTO {} (query_text, error_message) VALUES ($1, $2)",
            self.table
        )
    }

    fn create_statement(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\
             id BIGSERIAL PRIMARY KEY, \
             query_text TEXT NOT NULL, \
             error_message TEXT NOT NULL, \
             created_at TIMESTAMPTZ NOT NULL DEFAULT now())",
            self.table
        )
    }

    /// Records a failed query. The insert commits or rolls back as a unit.
    pub async fn record(&self, query: &Query, message: &str) -> Result<(), LogError> {
        let statement = self.insert_statement();
        let params = [query.as_str().to_string(), message.to_string()];

        match self.run(&statement, &params).await {
            Ok(_) => {
                debug!("Recorded failed query in {}", self.table);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to record failed query: {}", e);
                Err(e)
            }
        }
    }

    /// Creates the audit table when it does not exist yet.
    pub async fn ensure_table(&self) -> Result<(), LogError> {
        let statement = self.create_statement();
        self.run(&statement, &[]).await?;
        info!("Audit table {} is ready", self.table);
        Ok(())
    }

    async fn run(&self, statement: &str, params: &[String]) -> Result<u64, LogError> {
        let write = async {
            let mut conn = self
                .scope
                .acquire()
                .await
                .map_err(|e| LogError::Connectivity(e.to_string()))?;
            conn.execute_atomic(statement, params)
                .await
                .map_err(|e| LogError::Write(e.to_string()))
        };

        tokio::time::timeout(self.timeout, write)
            .await
            .map_err(|_| LogError::Timeout(self.timeout))?
    }
}
