//! Crate error type

use crate::catalog::RepositoryError;

/// Errors that abort a cleanup pass
#[derive(Debug, thiserror::Error)]
pub enum CleanupError {
    /// The catalog failed while a pass was running
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// A configured pattern is not a valid regular expression
    #[error("Invalid search pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

pub type Result<T, E = CleanupError> = std::result::Result<T, E>;
