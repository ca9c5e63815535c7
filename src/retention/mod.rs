//! Retention module for pruning old function versions.
//!
//! A run:
//! 1. Resolves every version referenced by an alias (primary and weighted targets)
//! 2. Fetches the complete version list, following continuation markers
//! 3. Plans deletions: all unreferenced versions except the newest `keep`
//! 4. Deletes the planned versions with bounded concurrency
//!
//! Steps 1 and 2 run concurrently. Per-version deletion failures are collected
//! into the run report instead of aborting the batch, and dry-run mode stops
//! after planning.

mod aliases;
mod catalog;
mod deleter;
mod error;
mod planner;
mod runner;

pub use aliases::{AliasReference, AliasResolver};
pub use catalog::{
    VersionCatalog, VersionRecord, chronological, compare_version_ids, parse_last_modified,
};
pub use deleter::{DeletionOutcome, DeletionResult, Deleter};
pub use error::{DeletionFailures, RetrievalError, RunError};
pub use planner::{RetentionDecision, RetentionPlanner};
pub use runner::{Interruption, RunReport, Runner};
