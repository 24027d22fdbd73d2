//! Error types for the unified-index crate.
//!
//! All errors use stable string messages suitable for display to users
//! and programmatic handling. Public orchestrator calls only ever return
//! [`SearchError::System`]; the other variants travel inside it as the
//! error `source()`.

use crate::types::Source;

/// Errors that can occur while configuring or running a unified search.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// Invalid orchestrator or source-priority configuration. Fatal.
    #[error("config error: {0}")]
    Configuration(String),

    /// A single source failed to answer a query.
    #[error("{kind} source failed: {cause}")]
    Source {
        /// Which source failed.
        kind: Source,
        /// The collaborator's original error.
        #[source]
        cause: IndexError,
    },

    /// A streaming cursor could not be decoded.
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),

    /// Wraps any failure raised while orchestrating a public call.
    #[error("system error during {operation}: {cause}")]
    System {
        /// The public operation that failed (`search`, `rebuild_all`, ...).
        operation: &'static str,
        /// The original failure.
        #[source]
        cause: Box<SearchError>,
    },
}

impl SearchError {
    /// Wrap `cause` as a [`SearchError::System`] for `operation`.
    ///
    /// Errors that are already system errors are returned unchanged so the
    /// original operation name survives nested calls.
    pub fn system(operation: &'static str, cause: SearchError) -> Self {
        match cause {
            already @ Self::System { .. } => already,
            other => Self::System {
                operation,
                cause: Box::new(other),
            },
        }
    }

    /// Build a [`SearchError::Source`] from a collaborator failure.
    pub fn source_failure(kind: Source, cause: IndexError) -> Self {
        Self::Source { kind, cause }
    }

    /// The wrapped cause of a system error, if this is one.
    pub fn cause(&self) -> Option<&SearchError> {
        match self {
            Self::System { cause, .. } => Some(cause),
            _ => None,
        }
    }
}

/// Errors reported by index collaborators (local, GitHub, collection).
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// The index cannot be reached or built right now.
    #[error("index unavailable: {0}")]
    Unavailable(String),

    /// Filesystem failure while reading or building an index.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other collaborator failure.
    #[error("index error: {0}")]
    Other(String),
}

/// Convenience type alias for unified-index results.
pub type Result<T> = std::result::Result<T, SearchError>;
