//! Retention engine for AWS Lambda function versions.
//!
//! A run reads every published version of one function together with the
//! aliases that route traffic to it, keeps the newest `keep` versions that no
//! alias references, and deletes the rest.
//!
//! The pieces are usable on their own:
//!
//! - [`store`]: the [`VersionStore`](store::VersionStore) seam and its Lambda
//!   and in-memory implementations
//! - [`retention`]: alias resolution, catalog retrieval, planning, deletion
//!   and the [`Runner`](retention::Runner) that ties them together
//! - [`config`]: TOML configuration with environment interpolation

pub mod config;
#[cfg(feature = "cli")]
pub mod observability;
pub mod retention;
pub mod store;

#[cfg(test)]
mod tests;
