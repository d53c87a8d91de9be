//! Statement policy for submitted queries.
//!
//! The console trusts the data credentials' grants by default. The
//! `read-only` policy additionally parses the submission and rejects
//! statements recognized as writes before any connection is opened.

mod parser;

pub use parser::{classify_sql, SqlClassifier};

use crate::error::ValidationError;
use crate::query::Query;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a statement does to the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    /// Reads only (SELECT, EXPLAIN, SHOW).
    Read,
    /// Modifies data or schema.
    Write,
    /// The text could not be parsed.
    Unknown,
}

/// The type of SQL statement detected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementType {
    Select,
    Insert,
    Update,
    Delete,
    Drop,
    Truncate,
    Alter,
    Create,
    Grant,
    Revoke,
    Explain,
    Show,
    Merge,
    Copy,
    /// Multiple statements detected; contains the first writing type.
    Multiple(Box<StatementType>),
    /// Statement type could not be determined.
    Unknown,
}

impl fmt::Display for StatementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Select => write!(f, "SELECT"),
            Self::Insert => write!(f, "INSERT"),
            Self::Update => write!(f, "UPDATE"),
            Self::Delete => write!(f, "DELETE"),
            Self::Drop => write!(f, "DROP"),
            Self::Truncate => write!(f, "TRUNCATE"),
            Self::Alter => write!(f, "ALTER"),
            Self::Create => write!(f, "CREATE"),
            Self::Grant => write!(f, "GRANT"),
            Self::Revoke => write!(f, "REVOKE"),
            Self::Explain => write!(f, "EXPLAIN"),
            Self::Show => write!(f, "SHOW"),
            Self::Merge => write!(f, "MERGE"),
            Self::Copy => write!(f, "COPY"),
            Self::Multiple(inner) => write!(f, "Multiple ({})", inner),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Result of classifying a SQL query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub access: Access,
    pub statement_type: StatementType,
}

impl Classification {
    pub fn new(access: Access, statement_type: StatementType) -> Self {
        Self {
            access,
            statement_type,
        }
    }

    pub fn is_write(&self) -> bool {
        self.access == Access::Write
    }
}

/// Whether writing statements may be submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatementPolicy {
    /// Every statement is sent; the data credentials' grants decide.
    #[default]
    Unrestricted,
    /// Recognized writes are rejected; unparseable text is sent to a
    /// read-only session, where the engine rejects any write.
    ReadOnly,
}

impl StatementPolicy {
    /// Checks a validated query against the policy.
    pub fn check(&self, query: &Query) -> Result<(), ValidationError> {
        match self {
            Self::Unrestricted => Ok(()),
            Self::ReadOnly => {
                let classification = classify_sql(query.as_str());
                if classification.is_write() {
                    Err(ValidationError::WriteRejected {
                        statement: classification.statement_type.to_string(),
                    })
                } else {
                    Ok(())
                }
            }
        }
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self, Self::ReadOnly)
    }
}

impl fmt::Display for StatementPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unrestricted => write!(f, "unrestricted"),
            Self::ReadOnly => write!(f, "read-only"),
        }
    }
}
