//! Selection of the versions to delete.

use std::collections::BTreeSet;

use serde::Serialize;

use super::catalog::VersionRecord;
use crate::{config::KeepCount, store::RESERVED_VERSION};

/// Versions selected for deletion, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RetentionDecision {
    /// Version ids to delete, in ascending chronological order.
    pub to_delete: Vec<String>,
    /// Versions neither referenced by an alias nor reserved.
    pub eligible: usize,
    /// Eligible versions kept by the retention window.
    pub retained: usize,
    /// Eligible versions beyond the window that a per-run cap left in place.
    pub deferred: usize,
}

impl RetentionDecision {
    pub fn is_empty(&self) -> bool {
        self.to_delete.is_empty()
    }

    pub fn len(&self) -> usize {
        self.to_delete.len()
    }
}

/// Computes which versions fall outside the retention window.
#[derive(Debug, Clone, Copy)]
pub struct RetentionPlanner {
    keep: KeepCount,
    delete_limit: Option<usize>,
}

impl RetentionPlanner {
    pub fn new(keep: KeepCount) -> Self {
        Self {
            keep,
            delete_limit: None,
        }
    }

    /// Cap the number of deletions per run; the oldest versions go first.
    pub fn with_delete_limit(mut self, limit: Option<usize>) -> Self {
        self.delete_limit = limit;
        self
    }

    /// Plan deletions for a catalog ordered oldest first.
    ///
    /// A version is eligible only if it is not referenced by any alias and is
    /// not the reserved pseudo-version. All eligible versions except the
    /// newest `keep` are selected.
    pub fn plan(
        &self,
        catalog: &[VersionRecord],
        referenced: &BTreeSet<String>,
    ) -> RetentionDecision {
        let eligible = catalog
            .iter()
            .filter(|v| !referenced.contains(&v.version_id) && v.version_id != RESERVED_VERSION)
            .map(|v| v.version_id.clone())
            .collect::<Vec<_>>();

        let eligible_count = eligible.len();
        let surplus = eligible_count.saturating_sub(self.keep.get());

        let mut to_delete = eligible;
        to_delete.truncate(surplus);

        let mut deferred = 0;
        if let Some(limit) = self.delete_limit
            && to_delete.len() > limit
        {
            deferred = to_delete.len() - limit;
            to_delete.truncate(limit);
        }

        RetentionDecision {
            to_delete,
            eligible: eligible_count,
            retained: eligible_count - surplus,
            deferred,
        }
    }
}
