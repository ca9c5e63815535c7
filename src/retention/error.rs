use thiserror::Error;

use super::deleter::DeletionResult;
use crate::{config::ConfigError, store::StoreError};

/// Failure to build a complete picture of the function's aliases or versions.
///
/// Always fatal: a deletion set is never computed from a partial catalog.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("Failed to list aliases for {function}: {source}")]
    Aliases {
        function: String,
        #[source]
        source: StoreError,
    },

    #[error("Failed to list versions for {function}: {source}")]
    Versions {
        function: String,
        #[source]
        source: StoreError,
    },

    #[error("Version listing returned an entry without a version id")]
    MissingVersionId,

    #[error("Version {0} has no last-modified timestamp")]
    MissingTimestamp(String),

    #[error("Version {version} has an unparseable last-modified timestamp '{value}'")]
    InvalidTimestamp { version: String, value: String },

    #[error("Version {0} was listed more than once")]
    DuplicateVersion(String),

    #[error("Listing returned the continuation marker '{0}' twice in a row")]
    RepeatedMarker(String),
}

/// Per-version deletion failures, collected once the whole batch finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionFailures {
    pub attempted: usize,
    pub failed: Vec<DeletionResult>,
}

impl std::fmt::Display for DeletionFailures {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} of {} deletion(s) failed: ",
            self.failed.len(),
            self.attempted
        )?;
        let details = self
            .failed
            .iter()
            .map(|r| format!("{} ({})", r.version_id, r.outcome))
            .collect::<Vec<_>>()
            .join(", ");
        f.write_str(&details)
    }
}

/// Reasons a run did not complete successfully.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error("{0}")]
    Deletion(DeletionFailures),

    #[error("Run exceeded its deadline of {0:?}")]
    TimedOut(std::time::Duration),

    #[error("Run cancelled")]
    Cancelled,
}
