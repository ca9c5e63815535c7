//! Resolution of the versions that aliases keep alive.

use std::{collections::BTreeSet, sync::Arc};

use tracing::debug;

use super::{catalog::MarkerGuard, error::RetrievalError};
use crate::store::{AliasEntry, VersionStore};

/// An alias and every version it routes traffic to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasReference {
    pub alias_name: String,
    pub primary_version_id: Option<String>,
    pub additional_weighted_version_ids: BTreeSet<String>,
}

impl From<AliasEntry> for AliasReference {
    fn from(entry: AliasEntry) -> Self {
        Self {
            alias_name: entry.name,
            primary_version_id: entry.primary_version,
            additional_weighted_version_ids: entry
                .weighted_versions
                .unwrap_or_default()
                .into_iter()
                .collect(),
        }
    }
}

impl AliasReference {
    /// All versions referenced by this alias.
    pub fn versions(&self) -> impl Iterator<Item = &str> {
        self.primary_version_id
            .as_deref()
            .into_iter()
            .chain(self.additional_weighted_version_ids.iter().map(String::as_str))
    }
}

/// Looks up the versions referenced by a function's aliases.
#[derive(Clone)]
pub struct AliasResolver {
    store: Arc<dyn VersionStore>,
}

impl AliasResolver {
    pub fn new(store: Arc<dyn VersionStore>) -> Self {
        Self { store }
    }

    /// Every alias of the function, across all listing pages.
    pub async fn aliases(&self, function: &str) -> Result<Vec<AliasReference>, RetrievalError> {
        let mut aliases = Vec::new();
        let mut marker = MarkerGuard::default();

        loop {
            let page = self
                .store
                .list_aliases(function, marker.current())
                .await
                .map_err(|source| RetrievalError::Aliases {
                    function: function.to_string(),
                    source,
                })?;

            aliases.extend(page.items.into_iter().map(AliasReference::from));

            if !marker.advance(page.next_marker)? {
                break;
            }
        }

        Ok(aliases)
    }

    /// The set of version ids referenced by any alias, primary or weighted.
    pub async fn resolve(&self, function: &str) -> Result<BTreeSet<String>, RetrievalError> {
        let aliases = self.aliases(function).await?;

        let referenced = aliases
            .iter()
            .flat_map(|alias| alias.versions().map(str::to_string))
            .collect::<BTreeSet<_>>();

        debug!(
            function,
            aliases = aliases.len(),
            referenced = ?referenced,
            "Resolved alias references"
        );

        Ok(referenced)
    }
}
