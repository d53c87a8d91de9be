//! Error types for Lookout.
//!
//! `LookoutError` is the application-level error used by configuration,
//! startup and the terminal UI. The remaining types form the closed error
//! taxonomy of the query pipeline: nothing unclassified crosses the
//! gateway or audit logger boundary.

use crate::db::Profile;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Main error type for Lookout operations.
#[derive(Error, Debug)]
pub enum LookoutError {
    /// Database connection errors (host unreachable, auth failed, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution errors surfaced outside the interactive pipeline.
    #[error("Query error: {0}")]
    Query(String),

    /// Configuration errors (invalid config file, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal application errors (terminal setup, file output, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LookoutError {
    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a query error with the given message.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "Connection Error",
            Self::Query(_) => "Query Error",
            Self::Config(_) => "Configuration Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

/// Result type alias using LookoutError.
pub type Result<T> = std::result::Result<T, LookoutError>;

/// A submission rejected before any connection is opened.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The query text is empty or whitespace only.
    #[error("The SQL query is empty")]
    EmptyQuery,

    /// The read-only statement policy recognized a writing statement.
    #[error("{statement} statements are not allowed: this console is read-only")]
    WriteRejected { statement: String },
}

/// Category of a failed query execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionErrorKind {
    Syntax,
    Permission,
    Connectivity,
    Other,
}

impl ExecutionErrorKind {
    /// Classifies a PostgreSQL SQLSTATE code.
    pub fn from_sql_state(code: &str) -> Self {
        match code {
            "42501" | "25006" => Self::Permission,
            "57014" | "57P01" | "57P02" | "57P03" => Self::Connectivity,
            c if c.starts_with("28") => Self::Permission,
            c if c.starts_with("42") => Self::Syntax,
            c if c.starts_with("08") => Self::Connectivity,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for ExecutionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax => write!(f, "Syntax"),
            Self::Permission => write!(f, "Permission"),
            Self::Connectivity => write!(f, "Connectivity"),
            Self::Other => write!(f, "Engine"),
        }
    }
}

/// A classified failure of the data-scope execution path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} error: {message}")]
pub struct ExecutionError {
    /// The failure category.
    pub kind: ExecutionErrorKind,
    /// The query text exactly as submitted.
    pub query: String,
    /// Human-readable message, as recorded in the audit store.
    pub message: String,
}

impl ExecutionError {
    /// Creates an execution error for the given query.
    pub fn new(kind: ExecutionErrorKind, query: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            query: query.into(),
            message: message.into(),
        }
    }

    /// Classifies an engine-level failure.
    pub fn from_engine(query: impl Into<String>, error: EngineError) -> Self {
        let kind = error.kind();
        Self::new(kind, query, error.into_message())
    }

    /// Creates the error reported when the client-side deadline expires.
    pub fn timed_out(query: impl Into<String>, after: Duration) -> Self {
        Self::new(
            ExecutionErrorKind::Connectivity,
            query,
            if after.as_secs() > 0 {
                format!("Query timed out after {} seconds", after.as_secs())
            } else {
                format!("Query timed out after {}ms", after.as_millis())
            },
        )
    }
}

/// Failure of the audit write. Reported, never retried, never swallowed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LogError {
    /// The audit store could not be reached.
    #[error("Audit store unreachable: {0}")]
    Connectivity(String),

    /// The insert or its transaction failed and was rolled back.
    #[error("Audit write failed: {0}")]
    Write(String),

    /// The audit write did not finish within its deadline.
    #[error("Audit write timed out after {0:?}")]
    Timeout(Duration),
}

/// Failure to open a connection for a credential profile.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Cannot open {profile} connection: {message}")]
pub struct ConnectivityError {
    pub profile: Profile,
    pub message: String,
}

impl ConnectivityError {
    pub fn new(profile: Profile, message: impl Into<String>) -> Self {
        Self {
            profile,
            message: message.into(),
        }
    }
}

/// Raw failure reported by an engine connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The engine rejected the statement.
    #[error("{message}")]
    Database {
        /// SQLSTATE code, when the engine reports one.
        code: Option<String>,
        message: String,
    },

    /// The connection was lost or could not be used.
    #[error("{0}")]
    Connectivity(String),

    /// Anything else the driver reports.
    #[error("{0}")]
    Other(String),
}

impl EngineError {
    /// Creates a database error carrying a SQLSTATE code.
    pub fn database(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Database {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    /// Returns the execution category this failure belongs to.
    pub fn kind(&self) -> ExecutionErrorKind {
        match self {
            Self::Database { code: Some(code), .. } => ExecutionErrorKind::from_sql_state(code),
            Self::Database { code: None, .. } | Self::Other(_) => ExecutionErrorKind::Other,
            Self::Connectivity(_) => ExecutionErrorKind::Connectivity,
        }
    }

    /// Consumes the error, returning its message.
    pub fn into_message(self) -> String {
        match self {
            Self::Database { message, .. } | Self::Connectivity(message) | Self::Other(message) => {
                message
            }
        }
    }
}
