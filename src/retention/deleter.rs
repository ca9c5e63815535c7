//! Concurrent deletion of planned versions.

use std::{fmt, sync::Arc};

use futures::{StreamExt, stream};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::store::VersionStore;

/// What happened to one planned deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeletionOutcome {
    Deleted,
    Failed { error: String },
    /// Never sent because the run was cancelled first.
    Skipped,
    /// Sent, but the run was cancelled before a response arrived. The
    /// version may or may not have been deleted.
    Abandoned,
}

impl fmt::Display for DeletionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeletionOutcome::Deleted => f.write_str("deleted"),
            DeletionOutcome::Failed { error } => write!(f, "failed: {error}"),
            DeletionOutcome::Skipped => f.write_str("skipped"),
            DeletionOutcome::Abandoned => f.write_str("abandoned"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletionResult {
    pub version_id: String,
    #[serde(flatten)]
    pub outcome: DeletionOutcome,
}

impl DeletionResult {
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, DeletionOutcome::Failed { .. })
    }
}

/// Issues delete requests with a bounded number in flight.
#[derive(Clone)]
pub struct Deleter {
    store: Arc<dyn VersionStore>,
    max_concurrency: usize,
    cancel: CancellationToken,
}

impl Deleter {
    /// `max_concurrency` is clamped to at least one request.
    pub fn new(store: Arc<dyn VersionStore>, max_concurrency: usize) -> Self {
        Self {
            store,
            max_concurrency: max_concurrency.max(1),
            cancel: CancellationToken::new(),
        }
    }

    /// Stop dispatching once `cancel` fires. Requests already in flight are
    /// no longer awaited and are reported as [`DeletionOutcome::Abandoned`].
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Delete every version in `versions`.
    ///
    /// A failed deletion never stops the others. Results come back in the
    /// same order as `versions`.
    pub async fn delete_all(&self, function: &str, versions: &[String]) -> Vec<DeletionResult> {
        let store = &self.store;
        let cancel = &self.cancel;

        stream::iter(versions.iter().cloned())
            .map(|version_id| async move {
                if cancel.is_cancelled() {
                    tracing::warn!(function, version = %version_id, "Run cancelled, skipping deletion");
                    return DeletionResult {
                        version_id,
                        outcome: DeletionOutcome::Skipped,
                    };
                }

                tracing::info!(
                    function,
                    version = %version_id,
                    "Deleting version {} from {}",
                    version_id,
                    function
                );

                let outcome = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        tracing::warn!(
                            function,
                            version = %version_id,
                            "Run cancelled with delete request in flight, outcome unknown"
                        );
                        DeletionOutcome::Abandoned
                    }
                    result = store.delete_version(function, &version_id) => match result {
                        Ok(()) => {
                            tracing::debug!(function, version = %version_id, "Deleted version");
                            DeletionOutcome::Deleted
                        }
                        Err(e) => {
                            tracing::error!(function, version = %version_id, error = %e, "Failed to delete version");
                            DeletionOutcome::Failed { error: e.to_string() }
                        }
                    },
                };

                DeletionResult {
                    version_id,
                    outcome,
                }
            })
            .buffered(self.max_concurrency)
            .collect::<Vec<_>>()
            .await
    }
}
