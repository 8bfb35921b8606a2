//! Query error types
//!
//! Defines all error conditions that can occur while building, compiling,
//! and executing Druid queries.

use thiserror::Error;

use crate::transport::TransportError;

/// Errors that can occur during query operations
#[derive(Error, Debug)]
pub enum QueryError {
    /// A string expression could not be compiled into a tree
    #[error("Compile error in '{fragment}': {reason}")]
    Compile { fragment: String, reason: String },

    /// A field or combination of fields is not valid for the active query type
    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    /// Network or HTTP failure from the transport
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// A paging pre-fetch response carried no continuation token
    #[error("Missing pagingIdentifiers in response for page {page}")]
    ContinuationMissing { page: u32 },

    /// Pages are numbered from 1
    #[error("Invalid page number: {0}")]
    InvalidPage(u32),

    /// JSON encoding or decoding failed
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl QueryError {
    /// Build a compile error for the given fragment
    pub(crate) fn compile(fragment: impl Into<String>, reason: impl Into<String>) -> Self {
        QueryError::Compile {
            fragment: fragment.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for QueryError {
    fn from(err: serde_json::Error) -> Self {
        QueryError::Serialization(err.to_string())
    }
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;
