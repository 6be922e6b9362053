//! Collection resolution for workload requests.
//!
//! A workload either names its collection explicitly or relies on singleton
//! discovery. Resolution is a pure lookup over the currently listed
//! collections; explicit references that miss are retryable (the collection
//! may not exist yet), while ambiguity without a reference is a
//! configuration error that cannot self-resolve.

use itertools::Itertools;

use pocket_api::{PocketSet, PocketValidator, Workload};

use crate::config::CollectionScope;
use crate::error::{Error, Result};

/// Resolve the owning collection for a workload.
pub fn resolve(
    workload: &PocketValidator,
    collections: Vec<PocketSet>,
    scope: CollectionScope,
) -> Result<PocketSet> {
    let in_scope: Vec<PocketSet> = match scope {
        CollectionScope::Cluster => collections,
        CollectionScope::Namespace => collections
            .into_iter()
            .filter(|c| c.metadata.namespace == workload.metadata.namespace)
            .collect(),
    };

    match workload.collection_ref() {
        Some(reference) => in_scope
            .into_iter()
            .find(|c| {
                c.metadata.name == reference.name && c.metadata.namespace == reference.namespace
            })
            .ok_or_else(|| {
                Error::collection_not_found(reference.name.clone(), reference.namespace.clone())
            }),
        None => in_scope
            .into_iter()
            .exactly_one()
            .map_err(|remaining| Error::ambiguous_collection(remaining.count())),
    }
}
