//! Partition changes into top-level edits and supporting elements.
//!
//! An element is top-level when no other element in the document refers to
//! it through an `nd` or `member` reference.

use std::collections::HashSet;

use crate::model::{Change, ChangeSet, Reference};

fn referenced(references: &[Reference]) -> HashSet<Reference> {
    references.iter().copied().collect()
}

/// Changes whose identity is never a reference target, in change-set order.
#[must_use]
pub fn top_level_changes(changes: &[ChangeSet], references: &[Reference]) -> Vec<Change> {
    let referenced = referenced(references);
    changes
        .iter()
        .flatten()
        .filter(|change| !referenced.contains(&change.reference()))
        .cloned()
        .collect()
}

/// Changes referenced by some other element; the complement of
/// [`top_level_changes`].
#[must_use]
pub fn supporting_changes(changes: &[ChangeSet], references: &[Reference]) -> Vec<Change> {
    let referenced = referenced(references);
    changes
        .iter()
        .flatten()
        .filter(|change| referenced.contains(&change.reference()))
        .cloned()
        .collect()
}
