//! Version store backends.
//!
//! The retention engine never talks to AWS directly. Everything it needs from
//! the outside world goes through the [`VersionStore`] trait, so a run can be
//! pointed at:
//!
//! - **Lambda**: the real AWS Lambda API (requires the `lambda` feature)
//! - **Memory**: an in-process store for tests and dry experiments

#[cfg(feature = "lambda")]
mod lambda;
mod memory;

use async_trait::async_trait;
#[cfg(feature = "lambda")]
pub use lambda::LambdaVersionStore;
pub use memory::MemoryVersionStore;
use thiserror::Error;

/// Pseudo-version that always points at the unpublished code of a function.
///
/// It shows up in version listings but is not a real published version and
/// can never be deleted on its own.
pub const RESERVED_VERSION: &str = "$LATEST";

/// Errors returned by a version store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Function or version not found: {0}")]
    NotFound(String),

    #[error("Request throttled during {operation}: {message}")]
    Throttled {
        operation: &'static str,
        message: String,
    },

    #[error("{operation} failed: {message}")]
    Service {
        operation: &'static str,
        message: String,
    },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// An alias as reported by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasEntry {
    pub name: String,
    /// Version the alias primarily routes to.
    pub primary_version: Option<String>,
    /// Versions receiving a weighted share of traffic, if routing is configured.
    pub weighted_versions: Option<Vec<String>>,
}

/// A version as reported by the store, before validation.
///
/// Both fields are optional because the wire format makes them optional;
/// the catalog decides what to do with incomplete entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionEntry {
    pub version: Option<String>,
    pub last_modified: Option<String>,
}

impl VersionEntry {
    pub fn new(version: impl Into<String>, last_modified: impl Into<String>) -> Self {
        Self {
            version: Some(version.into()),
            last_modified: Some(last_modified.into()),
        }
    }
}

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Continuation token; `None` when this is the last page.
    pub next_marker: Option<String>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_marker: None,
        }
    }
}

/// Access to the versions and aliases of a function.
///
/// Implementations must be `Send + Sync` so a single client can be shared
/// between the concurrent retrieval and deletion tasks of a run.
#[async_trait]
pub trait VersionStore: Send + Sync {
    /// List one page of aliases for a function.
    async fn list_aliases(
        &self,
        function: &str,
        marker: Option<&str>,
    ) -> StoreResult<Page<AliasEntry>>;

    /// List one page of versions for a function.
    async fn list_versions(
        &self,
        function: &str,
        marker: Option<&str>,
    ) -> StoreResult<Page<VersionEntry>>;

    /// Delete a single published version.
    async fn delete_version(&self, function: &str, version: &str) -> StoreResult<()>;
}
