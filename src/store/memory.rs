//! In-memory version store.
//!
//! Holds a fixed set of aliases and versions, serves them in pages of a
//! configurable size and records every delete call. Failures can be injected
//! per operation or per version.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{AliasEntry, Page, StoreError, StoreResult, VersionEntry, VersionStore};

#[derive(Debug, Default)]
struct State {
    aliases: Vec<AliasEntry>,
    versions: Vec<VersionEntry>,
    deleted: Vec<String>,
}

/// In-memory store (for testing and local experiments).
#[derive(Debug, Default)]
pub struct MemoryVersionStore {
    state: Mutex<State>,
    /// Entries per page; 0 serves everything in one page.
    page_size: usize,
    delete_delay: Option<Duration>,
    alias_failure: Option<StoreError>,
    version_failure: Option<StoreError>,
    delete_failures: HashMap<String, StoreError>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    list_calls: AtomicUsize,
}

impl MemoryVersionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_versions(self, versions: impl IntoIterator<Item = VersionEntry>) -> Self {
        self.state.lock().versions = versions.into_iter().collect();
        self
    }

    pub fn with_aliases(self, aliases: impl IntoIterator<Item = AliasEntry>) -> Self {
        self.state.lock().aliases = aliases.into_iter().collect();
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Make every delete call wait before completing.
    pub fn with_delete_delay(mut self, delay: Duration) -> Self {
        self.delete_delay = Some(delay);
        self
    }

    pub fn fail_list_aliases(mut self, error: StoreError) -> Self {
        self.alias_failure = Some(error);
        self
    }

    pub fn fail_list_versions(mut self, error: StoreError) -> Self {
        self.version_failure = Some(error);
        self
    }

    pub fn fail_delete(mut self, version: impl Into<String>, error: StoreError) -> Self {
        self.delete_failures.insert(version.into(), error);
        self
    }

    /// Versions deleted so far, in completion order.
    pub fn deleted(&self) -> Vec<String> {
        self.state.lock().deleted.clone()
    }

    /// Version ids still present in the store.
    pub fn remaining(&self) -> Vec<String> {
        self.state
            .lock()
            .versions
            .iter()
            .filter_map(|v| v.version.clone())
            .collect()
    }

    /// Highest number of delete calls observed running at the same time.
    pub fn max_concurrent_deletes(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Number of listing calls (aliases and versions) served.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn page_of<T: Clone>(&self, items: &[T], marker: Option<&str>) -> StoreResult<Page<T>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        let start = match marker {
            Some(m) => m.parse::<usize>().map_err(|_| StoreError::Service {
                operation: "ListPage",
                message: format!("invalid marker '{m}'"),
            })?,
            None => 0,
        };

        if self.page_size == 0 {
            return Ok(Page::last(items.get(start..).unwrap_or_default().to_vec()));
        }

        let end = (start + self.page_size).min(items.len());
        let page = items.get(start..end).unwrap_or_default().to_vec();
        let next_marker = (end < items.len()).then(|| end.to_string());

        Ok(Page {
            items: page,
            next_marker,
        })
    }
}

#[async_trait]
impl VersionStore for MemoryVersionStore {
    async fn list_aliases(
        &self,
        _function: &str,
        marker: Option<&str>,
    ) -> StoreResult<Page<AliasEntry>> {
        if let Some(err) = &self.alias_failure {
            return Err(err.clone());
        }
        let aliases = self.state.lock().aliases.clone();
        self.page_of(&aliases, marker)
    }

    async fn list_versions(
        &self,
        _function: &str,
        marker: Option<&str>,
    ) -> StoreResult<Page<VersionEntry>> {
        if let Some(err) = &self.version_failure {
            return Err(err.clone());
        }
        let versions = self.state.lock().versions.clone();
        self.page_of(&versions, marker)
    }

    async fn delete_version(&self, _function: &str, version: &str) -> StoreResult<()> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delete_delay {
            tokio::time::sleep(delay).await;
        }

        let result = if let Some(err) = self.delete_failures.get(version) {
            Err(err.clone())
        } else {
            let mut state = self.state.lock();
            let before = state.versions.len();
            state
                .versions
                .retain(|v| v.version.as_deref() != Some(version));
            if state.versions.len() == before {
                Err(StoreError::NotFound(version.to_string()))
            } else {
                state.deleted.push(version.to_string());
                Ok(())
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
