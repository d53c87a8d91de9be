//! Submitted queries and their execution on the data profile.
//!
//! A [`Query`] can only be constructed from non-empty text, so everything
//! downstream of validation may assume there is something to run.

pub mod gateway;

pub use gateway::QueryGateway;

use crate::error::ValidationError;
use std::fmt;

/// Raw SQL text submitted by the user, stored verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Query {
    text: String,
}

impl Query {
    /// Validates `text`. Whitespace-only text is rejected.
    pub fn new(text: impl Into<String>) -> Result<Self, ValidationError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(ValidationError::EmptyQuery);
        }
        Ok(Self { text })
    }

    /// The text exactly as submitted.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_inner(self) -> String {
        self.text
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl TryFrom<&str> for Query {
    type Error = ValidationError;

    fn try_from(text: &str) -> Result<Self, Self::Error> {
        Self::new(text)
    }
}
