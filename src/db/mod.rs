//! Database abstraction layer for Lookout.
//!
//! The engine is consumed through two traits: a [`Connector`] bound to one
//! credential profile, and the [`EngineConnection`] it hands out. Callers never
//! see connectors directly; they hold a [`ConnectionScope`] whose type
//! parameter names the profile, so a data-scope capability cannot be passed
//! where an audit-scope one is expected.

mod mock;
mod postgres;
mod types;

pub use mock::{MockCall, MockEngine, MockOp, StoredStatement};
pub use postgres::{PgConnector, PgConnectorOptions};
pub use types::{ColumnInfo, Row, TabularResult, Value};

use crate::error::{ConnectivityError, EngineError, LookoutError, Result};
use async_trait::async_trait;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// The two fixed credential profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Least-privilege credentials for user queries.
    Data,
    /// Elevated credentials for failure records.
    Audit,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::Audit => "audit",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type-level name of a credential profile.
pub trait ProfileKind: Send + Sync + 'static {
    const PROFILE: Profile;
}

/// Marker for the data profile.
#[derive(Debug)]
pub enum DataProfile {}

/// Marker for the audit profile.
#[derive(Debug)]
pub enum AuditProfile {}

impl ProfileKind for DataProfile {
    const PROFILE: Profile = Profile::Data;
}

impl ProfileKind for AuditProfile {
    const PROFILE: Profile = Profile::Audit;
}

/// Opens connections using the credentials of exactly one profile.
#[async_trait]
pub trait Connector: Send + Sync {
    /// The profile whose credentials this connector holds.
    fn profile(&self) -> Profile;

    /// Opens (or checks out) a connection.
    async fn connect(&self) -> std::result::Result<Box<dyn EngineConnection>, ConnectivityError>;
}

/// A live engine connection. Dropping it releases the connection.
#[async_trait]
pub trait EngineConnection: Send {
    /// Runs `sql` as a single statement and materializes at most `max_rows`
    /// rows, while still counting the total.
    async fn fetch_all(
        &mut self,
        sql: &str,
        max_rows: usize,
    ) -> std::result::Result<TabularResult, EngineError>;

    /// Runs one parameterized statement inside a transaction that either
    /// commits or rolls back. Returns the number of affected rows.
    async fn execute_atomic(
        &mut self,
        statement: &str,
        params: &[String],
    ) -> std::result::Result<u64, EngineError>;
}

/// Scoped access to the connections of profile `P`.
pub struct ConnectionScope<P: ProfileKind> {
    connector: Arc<dyn Connector>,
    _profile: PhantomData<P>,
}

impl<P: ProfileKind> ConnectionScope<P> {
    /// Wraps a connector, refusing one bound to a different profile.
    pub fn new(connector: Arc<dyn Connector>) -> Result<Self> {
        if connector.profile() != P::PROFILE {
            return Err(LookoutError::config(format!(
                "A connector holding {} credentials cannot serve the {} scope",
                connector.profile(),
                P::PROFILE
            )));
        }
        Ok(Self {
            connector,
            _profile: PhantomData,
        })
    }

    pub fn profile(&self) -> Profile {
        P::PROFILE
    }

    /// Acquires a connection. Connectivity failures are returned, not retried.
    pub async fn acquire(&self) -> std::result::Result<ScopedConnection<P>, ConnectivityError> {
        let inner = self.connector.connect().await?;
        debug!("Acquired {} connection", P::PROFILE);
        Ok(ScopedConnection {
            inner,
            _profile: PhantomData,
        })
    }
}

impl<P: ProfileKind> fmt::Debug for ConnectionScope<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionScope")
            .field("profile", &P::PROFILE)
            .finish()
    }
}

/// A connection checked out from a [`ConnectionScope`].
///
/// Released when dropped, which covers normal return, early return on error,
/// and cancellation of the future holding it.
pub struct ScopedConnection<P: ProfileKind> {
    inner: Box<dyn EngineConnection>,
    _profile: PhantomData<P>,
}

impl<P: ProfileKind> ScopedConnection<P> {
    pub async fn fetch_all(
        &mut self,
        sql: &str,
        max_rows: usize,
    ) -> std::result::Result<TabularResult, EngineError> {
        self.inner.fetch_all(sql, max_rows).await
    }

    pub async fn execute_atomic(
        &mut self,
        statement: &str,
        params: &[String],
    ) -> std::result::Result<u64, EngineError> {
        self.inner.execute_atomic(statement, params).await
    }

    /// Releases the connection explicitly.
    pub fn release(self) {
        drop(self);
    }
}

impl<P: ProfileKind> Drop for ScopedConnection<P> {
    fn drop(&mut self) {
        debug!("Released {} connection", P::PROFILE);
    }
}
