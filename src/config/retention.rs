//! Retention policy configuration.
//!
//! Selects the function to prune, how many unreferenced versions to keep and
//! how deletions are carried out.
//!
//! # Example
//!
//! ```toml
//! [function]
//! name = "checkout-api"
//! keep = 5
//!
//! [deletion]
//! max_concurrency = 10
//! dry_run = false
//! max_deletes_per_run = 0
//!
//! [run]
//! timeout_secs = 300
//! ```

use std::{fmt, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};

/// Number of unreferenced versions to keep.
///
/// Can only hold a non-negative integer. Parsing from text (CLI flags,
/// environment variables) and from TOML both reject negative and
/// non-integer input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u64")]
pub struct KeepCount(usize);

impl KeepCount {
    pub const fn new(count: usize) -> Self {
        Self(count)
    }

    pub const fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for KeepCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl TryFrom<i64> for KeepCount {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        usize::try_from(value)
            .map(Self)
            .map_err(|_| format!("number of versions to keep must be non-negative, got {value}"))
    }
}

impl From<KeepCount> for u64 {
    fn from(value: KeepCount) -> Self {
        value.0 as u64
    }
}

impl FromStr for KeepCount {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err("number of versions to keep is empty".to_string());
        }
        let value = trimmed.parse::<i64>().map_err(|_| {
            format!("number of versions to keep must be a non-negative integer, got '{trimmed}'")
        })?;
        Self::try_from(value)
    }
}

/// The function whose versions are pruned.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FunctionConfig {
    /// Function name, ARN or partial ARN.
    /// Required, either here or on the command line.
    #[serde(default)]
    pub name: Option<String>,

    /// Unreferenced versions to keep, newest first.
    /// Required, either here or on the command line.
    #[serde(default)]
    pub keep: Option<KeepCount>,
}

/// Deletion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeletionConfig {
    /// Maximum number of delete requests in flight at once.
    /// Default: 10
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// If true, log what would be deleted without deleting anything.
    /// Default: false
    #[serde(default)]
    pub dry_run: bool,

    /// Maximum number of versions to delete in one run; the oldest go first.
    /// Set to 0 for unlimited.
    /// Default: 0
    #[serde(default)]
    pub max_deletes_per_run: u64,
}

impl Default for DeletionConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            dry_run: false,
            max_deletes_per_run: 0,
        }
    }
}

fn default_max_concurrency() -> usize {
    10
}

impl DeletionConfig {
    /// The per-run cap, if one is configured.
    pub fn delete_limit(&self) -> Option<usize> {
        (self.max_deletes_per_run > 0)
            .then(|| usize::try_from(self.max_deletes_per_run).unwrap_or(usize::MAX))
    }
}

/// Limits applying to the whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Overall deadline for one run, in seconds. 0 disables the deadline.
    /// Default: 300
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    300
}

impl RunConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}
