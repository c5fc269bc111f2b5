//! Query errors
//!
//! Validation errors are raised before any upstream call is made. Upstream
//! failures are carried through unchanged so callers see the transport's own
//! message.

/// Errors produced by a describe query
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("cannot specify both ids ({}) and names ({}), only one or the other", ids.join(", "), names.join(", "))]
    AmbiguousFilter { ids: Vec<String>, names: Vec<String> },

    #[error("empty identifier")]
    EmptyIdentifier,

    #[error("unknown resource family: {0}")]
    UnknownFamily(String),

    #[error("No instance named {0}")]
    NoInstanceNamed(String),

    #[error(transparent)]
    Upstream(#[from] anyhow::Error),
}

impl QueryError {
    /// Short machine-readable kind, stable across message changes
    pub fn kind(&self) -> &'static str {
        match self {
            QueryError::AmbiguousFilter { .. } => "AMBIGUOUS_FILTER",
            QueryError::EmptyIdentifier => "EMPTY_IDENTIFIER",
            QueryError::UnknownFamily(_) => "UNKNOWN_FAMILY",
            QueryError::NoInstanceNamed(_) => "NO_INSTANCE",
            QueryError::Upstream(_) => "UPSTREAM",
        }
    }
}

pub type QueryResult<T> = Result<T, QueryError>;
