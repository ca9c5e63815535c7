//! Retrieval of a function's complete, chronologically ordered version list.

use std::{cmp::Ordering, collections::HashSet, sync::Arc};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use super::error::RetrievalError;
use crate::store::{VersionEntry, VersionStore};

/// Timestamp layout used by the Lambda API, e.g. `2024-01-31T12:00:00.000+0000`.
const LAMBDA_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%z";

/// A published version and when it was last modified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionRecord {
    pub version_id: String,
    pub last_modified: DateTime<Utc>,
}

impl VersionRecord {
    pub fn new(version_id: impl Into<String>, last_modified: DateTime<Utc>) -> Self {
        Self {
            version_id: version_id.into(),
            last_modified,
        }
    }

    /// Validate a raw store entry. Entries without an id or a usable
    /// timestamp are rejected rather than given a made-up position.
    pub fn try_from_entry(entry: VersionEntry) -> Result<Self, RetrievalError> {
        let version_id = entry.version.ok_or(RetrievalError::MissingVersionId)?;
        let raw = entry
            .last_modified
            .ok_or_else(|| RetrievalError::MissingTimestamp(version_id.clone()))?;
        let last_modified =
            parse_last_modified(&raw).ok_or_else(|| RetrievalError::InvalidTimestamp {
                version: version_id.clone(),
                value: raw.clone(),
            })?;

        Ok(Self {
            version_id,
            last_modified,
        })
    }
}

/// Parse a last-modified value in Lambda's format or RFC 3339.
pub fn parse_last_modified(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, LAMBDA_TIMESTAMP_FORMAT))
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

/// Order version ids: numeric ids by value, numeric before non-numeric,
/// everything else lexically. Distinct ids never compare equal.
pub fn compare_version_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// Oldest first; equal timestamps fall back to version id order.
pub fn chronological(a: &VersionRecord, b: &VersionRecord) -> Ordering {
    a.last_modified
        .cmp(&b.last_modified)
        .then_with(|| compare_version_ids(&a.version_id, &b.version_id))
}

/// Tracks continuation markers across pages and refuses to loop.
#[derive(Debug, Default)]
pub(crate) struct MarkerGuard {
    current: Option<String>,
}

impl MarkerGuard {
    pub(crate) fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Move to the next marker. Returns `false` once the listing is exhausted;
    /// an empty marker also ends it.
    pub(crate) fn advance(&mut self, next: Option<String>) -> Result<bool, RetrievalError> {
        match next {
            None => Ok(false),
            Some(next) if next.is_empty() => Ok(false),
            Some(next) if self.current.as_deref() == Some(next.as_str()) => {
                Err(RetrievalError::RepeatedMarker(next))
            }
            Some(next) => {
                self.current = Some(next);
                Ok(true)
            }
        }
    }
}

/// Reads every version of a function from the store.
#[derive(Clone)]
pub struct VersionCatalog {
    store: Arc<dyn VersionStore>,
}

impl VersionCatalog {
    pub fn new(store: Arc<dyn VersionStore>) -> Self {
        Self { store }
    }

    /// Fetch all pages and return the versions oldest first.
    ///
    /// Fails if any page fails or any entry is malformed; a partial catalog
    /// is never returned.
    pub async fn fetch_all(&self, function: &str) -> Result<Vec<VersionRecord>, RetrievalError> {
        let mut records = Vec::new();
        let mut seen = HashSet::new();
        let mut marker = MarkerGuard::default();
        let mut pages = 0usize;

        loop {
            let page = self
                .store
                .list_versions(function, marker.current())
                .await
                .map_err(|source| RetrievalError::Versions {
                    function: function.to_string(),
                    source,
                })?;
            pages += 1;

            for entry in page.items {
                let record = VersionRecord::try_from_entry(entry)?;
                if !seen.insert(record.version_id.clone()) {
                    return Err(RetrievalError::DuplicateVersion(record.version_id));
                }
                records.push(record);
            }

            if !marker.advance(page.next_marker)? {
                break;
            }
        }

        records.sort_by(chronological);

        debug!(function, pages, versions = records.len(), "Fetched version catalog");

        Ok(records)
    }
}
