//! A single retention run against one function.
//!
//! The runner validates configuration, retrieves aliases and versions
//! concurrently, plans the deletions and carries them out (or only logs them
//! in dry-run mode). An optional deadline bounds the whole run and a
//! cancellation token lets the caller stop it at any await point.

use std::{collections::BTreeSet, sync::Arc, time::Duration};

use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::{
    aliases::AliasResolver,
    catalog::VersionCatalog,
    deleter::{DeletionOutcome, DeletionResult, Deleter},
    error::{DeletionFailures, RunError},
    planner::{RetentionDecision, RetentionPlanner},
};
use crate::{
    config::{PruneTarget, PrunerConfig},
    store::VersionStore,
};

/// Why a run stopped before finishing its deletions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Interruption {
    TimedOut,
    Cancelled,
}

/// Results from a single retention run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub function: String,
    pub dry_run: bool,
    /// Versions listed, including the reserved pseudo-version.
    pub versions_listed: usize,
    /// Versions referenced by at least one alias.
    pub referenced: BTreeSet<String>,
    pub decision: RetentionDecision,
    /// One entry per attempted deletion; empty in dry-run mode.
    pub results: Vec<DeletionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interrupted: Option<Interruption>,
    #[serde(skip)]
    timeout: Option<Duration>,
}

impl RunReport {
    /// Number of versions actually deleted.
    pub fn deleted(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.outcome == DeletionOutcome::Deleted)
            .count()
    }

    /// Deletions that were attempted and failed.
    pub fn failures(&self) -> Vec<&DeletionResult> {
        self.results.iter().filter(|r| r.is_failure()).collect()
    }

    /// Check if any versions were deleted.
    pub fn has_deletions(&self) -> bool {
        self.deleted() > 0
    }

    /// Overall verdict: interruption first, then aggregated deletion failures.
    pub fn check(&self) -> Result<(), RunError> {
        match self.interrupted {
            Some(Interruption::TimedOut) => {
                return Err(RunError::TimedOut(self.timeout.unwrap_or_default()));
            }
            Some(Interruption::Cancelled) => return Err(RunError::Cancelled),
            None => {}
        }

        let failed = self
            .failures()
            .into_iter()
            .cloned()
            .collect::<Vec<_>>();
        if failed.is_empty() {
            Ok(())
        } else {
            Err(RunError::Deletion(DeletionFailures {
                attempted: self.results.len(),
                failed,
            }))
        }
    }
}

/// Runs the retention policy for one function.
pub struct Runner {
    store: Arc<dyn VersionStore>,
    target: PruneTarget,
    planner: RetentionPlanner,
    max_concurrency: usize,
    dry_run: bool,
    timeout: Option<Duration>,
    cancel: CancellationToken,
}

impl Runner {
    /// Create a runner, rejecting invalid configuration before any request
    /// is made.
    pub fn new(store: Arc<dyn VersionStore>, config: &PrunerConfig) -> Result<Self, RunError> {
        let target = config.validate()?;
        let planner =
            RetentionPlanner::new(target.keep).with_delete_limit(config.deletion.delete_limit());

        Ok(Self {
            store,
            target,
            planner,
            max_concurrency: config.deletion.max_concurrency,
            dry_run: config.deletion.dry_run,
            timeout: config.run.timeout(),
            cancel: CancellationToken::new(),
        })
    }

    /// Stop the run when `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn target(&self) -> &PruneTarget {
        &self.target
    }

    /// Execute one run.
    ///
    /// Configuration and retrieval failures, and interruptions before any
    /// deletion is issued, are returned as errors. Once deletions start the
    /// run always produces a report; use [`RunReport::check`] for the verdict.
    pub async fn run(&self) -> Result<RunReport, RunError> {
        let function = self.target.function_name.as_str();
        // A deadline too far out to represent is treated as none
        let deadline = self.timeout.and_then(|t| Instant::now().checked_add(t));

        let dry_run_msg = if self.dry_run { " (DRY RUN)" } else { "" };
        tracing::info!(
            function,
            keep = %self.target.keep,
            max_concurrency = self.max_concurrency,
            dry_run = self.dry_run,
            "Starting retention run{}",
            dry_run_msg
        );

        let resolver = AliasResolver::new(self.store.clone());
        let catalog = VersionCatalog::new(self.store.clone());

        let (referenced, versions) = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(RunError::Cancelled),
            _ = deadline_elapsed(deadline) => {
                return Err(RunError::TimedOut(self.timeout.unwrap_or_default()));
            }
            retrieved = async {
                tokio::try_join!(resolver.resolve(function), catalog.fetch_all(function))
            } => retrieved?,
        };

        let decision = self.planner.plan(&versions, &referenced);

        tracing::info!(
            function,
            versions = versions.len(),
            referenced = referenced.len(),
            eligible = decision.eligible,
            retained = decision.retained,
            "preparing to remove {} version(s)",
            decision.len()
        );
        if decision.deferred > 0 {
            tracing::warn!(
                function,
                deferred = decision.deferred,
                "Per-run deletion limit reached, remaining versions left for a later run"
            );
        }

        let mut report = RunReport {
            function: function.to_string(),
            dry_run: self.dry_run,
            versions_listed: versions.len(),
            referenced,
            decision,
            results: Vec::new(),
            interrupted: None,
            timeout: self.timeout,
        };

        if self.dry_run {
            for version in &report.decision.to_delete {
                tracing::info!(function, version = %version, "DRY RUN: Would delete version {}", version);
            }
            return Ok(report);
        }

        if report.decision.is_empty() {
            return Ok(report);
        }

        // Child token so the deadline can stop deletions without cancelling
        // the caller's token.
        let token = self.cancel.child_token();
        let deleter = Deleter::new(self.store.clone(), self.max_concurrency)
            .with_cancellation(token.clone());

        let mut interrupted = None;
        let results = {
            let deletion = deleter.delete_all(function, &report.decision.to_delete);
            tokio::pin!(deletion);

            tokio::select! {
                results = &mut deletion => results,
                _ = deadline_elapsed(deadline) => {
                    tracing::warn!(function, "Run deadline reached, abandoning outstanding deletions");
                    interrupted = Some(Interruption::TimedOut);
                    token.cancel();
                    deletion.as_mut().await
                }
            }
        };

        if interrupted.is_none() && self.cancel.is_cancelled() {
            interrupted = Some(Interruption::Cancelled);
        }

        report.results = results;
        report.interrupted = interrupted;

        let failures = report.failures().len();
        if failures > 0 {
            tracing::error!(
                function,
                deleted = report.deleted(),
                failed = failures,
                "Retention run finished with failed deletions"
            );
        } else if report.has_deletions() {
            tracing::info!(function, deleted = report.deleted(), "Retention run complete");
        }

        Ok(report)
    }
}

/// Resolves once `deadline` passes; never resolves without one.
async fn deadline_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::KeepCount,
        store::{AliasEntry, MemoryVersionStore, StoreError, VersionEntry},
    };

    fn config(keep: usize) -> PrunerConfig {
        let mut config = PrunerConfig::default();
        config.function.name = Some("checkout-api".into());
        config.function.keep = Some(KeepCount::new(keep));
        config
    }

    /// Versions 1..=n, one day apart, plus `$LATEST`.
    fn versions(n: usize) -> Vec<VersionEntry> {
        let mut entries = (1..=n)
            .map(|i| VersionEntry::new(i.to_string(), format!("2024-01-{i:02}T00:00:00.000+0000")))
            .collect::<Vec<_>>();
        entries.push(VersionEntry::new("$LATEST", "2024-02-01T00:00:00.000+0000"));
        entries
    }

    fn live_alias() -> AliasEntry {
        AliasEntry {
            name: "live".into(),
            primary_version: Some("8".into()),
            weighted_versions: Some(vec!["6".into()]),
        }
    }

    #[tokio::test]
    async fn test_run_deletes_planned_versions() {
        let store = Arc::new(
            MemoryVersionStore::new()
                .with_versions(versions(10))
                .with_aliases([live_alias()])
                .with_page_size(3),
        );

        let report = Runner::new(store.clone(), &config(2))
            .unwrap()
            .run()
            .await
            .unwrap();

        assert_eq!(report.decision.to_delete, vec!["1", "2", "3", "4", "5", "7"]);
        assert_eq!(report.deleted(), 6);
        assert!(report.check().is_ok());
        assert_eq!(report.versions_listed, 11);

        let mut remaining = store.remaining();
        remaining.sort();
        assert_eq!(remaining, vec!["$LATEST", "10", "6", "8", "9"]);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_before_any_request() {
        let store = Arc::new(MemoryVersionStore::new().with_versions(versions(3)));
        let mut bad = config(1);
        bad.function.name = None;

        let err = Runner::new(store.clone(), &bad).err().unwrap();
        assert!(matches!(err, RunError::Config(_)));
        assert_eq!(store.list_calls(), 0);
    }

    #[tokio::test]
    async fn test_dry_run_deletes_nothing() {
        let store = Arc::new(MemoryVersionStore::new().with_versions(versions(5)));
        let mut config = config(1);
        config.deletion.dry_run = true;

        let report = Runner::new(store.clone(), &config)
            .unwrap()
            .run()
            .await
            .unwrap();

        assert!(report.dry_run);
        assert_eq!(report.decision.len(), 4);
        assert!(report.results.is_empty());
        assert!(store.deleted().is_empty());
        assert!(report.check().is_ok());
    }

    #[tokio::test]
    async fn test_retrieval_failure_aborts_without_deleting() {
        let store = Arc::new(
            MemoryVersionStore::new()
                .with_versions(versions(5))
                .fail_list_aliases(StoreError::Service {
                    operation: "ListAliases",
                    message: "access denied".into(),
                }),
        );

        let err = Runner::new(store.clone(), &config(0))
            .unwrap()
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::Retrieval(_)));
        assert!(store.deleted().is_empty());
    }

    #[tokio::test]
    async fn test_deletion_failures_are_aggregated() {
        let store = Arc::new(
            MemoryVersionStore::new()
                .with_versions(versions(5))
                .fail_delete(
                    "1",
                    StoreError::Service {
                        operation: "DeleteFunction",
                        message: "conflict".into(),
                    },
                )
                .fail_delete("3", StoreError::NotFound("3".into())),
        );

        let report = Runner::new(store.clone(), &config(1))
            .unwrap()
            .run()
            .await
            .unwrap();

        assert_eq!(report.deleted(), 2);
        match report.check() {
            Err(RunError::Deletion(failures)) => {
                assert_eq!(failures.attempted, 4);
                let ids = failures
                    .failed
                    .iter()
                    .map(|r| r.version_id.as_str())
                    .collect::<Vec<_>>();
                assert_eq!(ids, vec!["1", "3"]);
                let msg = failures.to_string();
                assert!(msg.starts_with("2 of 4 deletion(s) failed"), "{msg}");
            }
            other => panic!("expected deletion failures, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_nothing_to_delete() {
        let store = Arc::new(MemoryVersionStore::new().with_versions(versions(3)));
        let report = Runner::new(store.clone(), &config(5))
            .unwrap()
            .run()
            .await
            .unwrap();
        assert!(report.decision.is_empty());
        assert!(!report.has_deletions());
        assert!(report.check().is_ok());
    }

    #[tokio::test]
    async fn test_cancelled_before_retrieval() {
        let store = Arc::new(MemoryVersionStore::new().with_versions(versions(3)));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = Runner::new(store.clone(), &config(0))
            .unwrap()
            .with_cancellation(cancel)
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::Cancelled));
        assert!(store.deleted().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_interrupts_deletions() {
        let store = Arc::new(
            MemoryVersionStore::new()
                .with_versions(versions(6))
                .with_delete_delay(Duration::from_secs(4)),
        );
        let mut config = config(0);
        config.deletion.max_concurrency = 2;
        config.run.timeout_secs = 10;

        let report = Runner::new(store.clone(), &config)
            .unwrap()
            .run()
            .await
            .unwrap();

        // Two pairs finish at 4s and 8s; the third pair is in flight at 10s
        assert_eq!(report.interrupted, Some(Interruption::TimedOut));
        assert_eq!(report.deleted(), 4);
        assert_eq!(
            report
                .results
                .iter()
                .filter(|r| r.outcome == DeletionOutcome::Abandoned)
                .count(),
            2
        );
        assert!(matches!(report.check(), Err(RunError::TimedOut(d)) if d == Duration::from_secs(10)));
    }

    #[tokio::test]
    async fn test_unrepresentable_deadline_means_no_deadline() {
        let store = Arc::new(MemoryVersionStore::new().with_versions(versions(4)));
        let mut config = config(1);
        config.run.timeout_secs = u64::MAX;

        let report = Runner::new(store.clone(), &config)
            .unwrap()
            .run()
            .await
            .unwrap();

        assert_eq!(report.interrupted, None);
        assert_eq!(report.deleted(), 3);
        assert!(report.check().is_ok());
    }

    #[tokio::test]
    async fn test_report_serializes() {
        let store = Arc::new(
            MemoryVersionStore::new()
                .with_versions(versions(3))
                .with_aliases([AliasEntry {
                    name: "live".into(),
                    primary_version: Some("3".into()),
                    weighted_versions: None,
                }]),
        );
        let report = Runner::new(store, &config(0)).unwrap().run().await.unwrap();
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["function"], "checkout-api");
        assert_eq!(json["referenced"], serde_json::json!(["3"]));
        assert_eq!(json["decision"]["to_delete"], serde_json::json!(["1", "2"]));
        assert_eq!(json["results"][0]["status"], "deleted");
        assert!(json.get("interrupted").is_none());
    }
}
