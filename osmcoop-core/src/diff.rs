//! Tag-level diffs between an element's prior version and its edited form.
//!
//! Tag-fix tasks can only express tag edits, so any change that touches
//! geometry, creates or deletes an element is rejected as an unsupported edit.

use std::fmt;

use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::fetch::{ElementSource, FetchCache, FetchError};
use crate::model::{Change, Element, ElementId, ElementType, Operation, Tag};

/// A dependent tag operation within a tag-fix task.
///
/// Serializes as `{"operation": "setTags", "data": {...}}` or
/// `{"operation": "unsetTags", "data": [...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "operation", content = "data", rename_all = "camelCase")]
pub enum TagOperation {
    /// Set each key to its value. Keys are unique; the last duplicate wins
    /// while keeping the position of the first.
    #[serde(serialize_with = "serialize_tag_map")]
    SetTags(Vec<Tag>),
    /// Remove each key.
    UnsetTags(Vec<String>),
}

fn serialize_tag_map<S: Serializer>(tags: &[Tag], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_map(tags.iter().map(|tag| (&tag.key, &tag.value)))
}

/// Collapse duplicate keys so the last value wins in the first key's position.
fn dedupe_last_wins(tags: Vec<Tag>) -> Vec<Tag> {
    let mut unique: Vec<Tag> = Vec::with_capacity(tags.len());
    for tag in tags {
        if let Some(existing) = unique.iter_mut().find(|seen| seen.key == tag.key) {
            existing.value = tag.value;
        } else {
            unique.push(tag);
        }
    }
    unique
}

/// The independent operation a task performs on its element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum IndependentOperation {
    /// Create a new element.
    CreateElement,
    /// Edit an existing element.
    ModifyElement,
    /// Delete an existing element.
    DeleteElement,
}

/// Classify `change` as a create, modify or delete of its element.
#[must_use]
pub const fn independent_operation(change: &Change) -> IndependentOperation {
    match change.operation {
        Operation::Delete => IndependentOperation::DeleteElement,
        Operation::Create | Operation::Modify if change.element.is_new() => {
            IndependentOperation::CreateElement
        }
        Operation::Create | Operation::Modify => IndependentOperation::ModifyElement,
    }
}

/// Why a change cannot be expressed as tag operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsupportedEditReason {
    /// The change creates or deletes rather than modifies.
    NotModify(Operation),
    /// The element has not been uploaded, so there is no prior version.
    NewElement,
    /// The element's version is below one.
    InvalidVersion(u32),
    /// The element has no version to diff against.
    MissingVersion,
    /// Coordinates, way nodes or relation members changed.
    GeometryChanged,
}

impl fmt::Display for UnsupportedEditReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotModify(operation) => write!(f, "{operation} is not a tag edit"),
            Self::NewElement => f.write_str("element is new"),
            Self::InvalidVersion(version) => write!(f, "version {version} is invalid"),
            Self::MissingVersion => f.write_str("element has no version"),
            Self::GeometryChanged => f.write_str("geometry changed"),
        }
    }
}

/// Errors from [`operations_for`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiffError {
    /// The change is not a pure tag edit.
    #[error(
        "{element_type}/{id}: only tag changes are allowed ({reason}); use a change-file task for more complex edits"
    )]
    UnsupportedEdit {
        /// Type of the edited element.
        element_type: ElementType,
        /// Identifier of the edited element.
        id: ElementId,
        /// What disqualified the change.
        reason: UnsupportedEditReason,
    },
    /// The prior version could not be fetched.
    #[error("failed to retrieve prior version of {element_type}/{id}")]
    Fetch {
        /// Type of the edited element.
        element_type: ElementType,
        /// Identifier of the edited element.
        id: ElementId,
        /// Underlying fetch failure.
        #[source]
        source: FetchError,
    },
}

fn unsupported(change: &Change, reason: UnsupportedEditReason) -> DiffError {
    DiffError::UnsupportedEdit {
        element_type: change.element_type,
        id: change.element_id,
        reason,
    }
}

/// Compute the tag operations turning the prior version into `change`.
///
/// The prior version is the one named by the change's `version` attribute.
///
/// # Errors
///
/// Returns [`DiffError::UnsupportedEdit`] for anything other than a
/// modification of an existing, versioned element whose geometry is
/// unchanged, and [`DiffError::Fetch`] when the prior version cannot be
/// retrieved.
pub async fn operations_for<S>(
    change: &Change,
    cache: &FetchCache<S>,
) -> Result<Vec<TagOperation>, DiffError>
where
    S: ElementSource + 'static,
{
    if change.operation != Operation::Modify {
        return Err(unsupported(
            change,
            UnsupportedEditReason::NotModify(change.operation),
        ));
    }
    if change.element.is_new() {
        return Err(unsupported(change, UnsupportedEditReason::NewElement));
    }
    let version = match change.element.version {
        Some(0) => return Err(unsupported(change, UnsupportedEditReason::InvalidVersion(0))),
        Some(version) => version,
        None => return Err(unsupported(change, UnsupportedEditReason::MissingVersion)),
    };

    let prior = cache
        .fetch_versioned(change.element_type, change.element_id, version)
        .await
        .map_err(|source| DiffError::Fetch {
            element_type: change.element_type,
            id: change.element_id,
            source,
        })?;
    if has_structural_changes(&prior, change) {
        return Err(unsupported(change, UnsupportedEditReason::GeometryChanged));
    }
    Ok(tag_operations(Some(&prior), change))
}

/// Whether `change` alters geometry relative to `prior`.
///
/// Creations, deletions and new elements always count as structural.
#[must_use]
pub fn has_structural_changes(prior: &Element, change: &Change) -> bool {
    change.operation != Operation::Modify
        || change.element.is_new()
        || change.element.structure_differs(prior)
}

/// Tag operations needed to turn `prior` into the element in `change`.
///
/// New elements (and elements without a prior version) set every tag.
/// Otherwise tags whose key and value are absent from `prior` are set, and
/// prior tags whose key no longer appears are unset. Deletions need no tag
/// operations.
#[must_use]
pub fn tag_operations(prior: Option<&Element>, change: &Change) -> Vec<TagOperation> {
    if change.operation == Operation::Delete {
        return Vec::new();
    }
    let tags = &change.element.tags;
    let (to_set, to_unset): (Vec<Tag>, Vec<String>) = match prior {
        Some(prior) if !change.element.is_new() => {
            let to_set = tags
                .iter()
                .filter(|tag| !prior.tags.contains(tag))
                .cloned()
                .collect();
            let to_unset = prior
                .tags
                .iter()
                .filter(|old| tags.iter().all(|tag| tag.key != old.key))
                .map(|old| old.key.clone())
                .collect();
            (to_set, to_unset)
        }
        _ => (tags.clone(), Vec::new()),
    };

    let mut operations = Vec::new();
    if !to_set.is_empty() {
        operations.push(TagOperation::SetTags(dedupe_last_wins(to_set)));
    }
    if !to_unset.is_empty() {
        operations.push(TagOperation::UnsetTags(to_unset));
    }
    operations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{SourceCall, StubElementSource};
    use rstest::{fixture, rstest};
    use serde_json::json;

    fn tags(pairs: &[(&str, &str)]) -> Vec<Tag> {
        pairs.iter().map(|(key, value)| Tag::new(*key, *value)).collect()
    }

    fn modified(element: Element) -> Change {
        Change::new(element, Operation::Modify)
    }

    #[fixture]
    fn prior() -> Element {
        Element::node(5, 1.0, 2.0)
            .with_version(3)
            .with_tags(tags(&[("a", "1"), ("b", "2")]))
    }

    #[rstest]
    fn diff_sets_new_and_unsets_removed(prior: Element) {
        let change = modified(
            Element::node(5, 1.0, 2.0)
                .with_version(3)
                .with_tags(tags(&[("a", "1"), ("c", "3")])),
        );
        assert_eq!(
            tag_operations(Some(&prior), &change),
            vec![
                TagOperation::SetTags(tags(&[("c", "3")])),
                TagOperation::UnsetTags(vec!["b".to_owned()]),
            ]
        );
    }

    #[rstest]
    fn identical_tags_need_no_operations(prior: Element) {
        let change = modified(prior.clone());
        assert!(tag_operations(Some(&prior), &change).is_empty());
    }

    #[rstest]
    fn changed_value_is_set_without_unset(prior: Element) {
        let change = modified(prior.clone().with_tags(tags(&[("a", "9"), ("b", "2")])));
        assert_eq!(
            tag_operations(Some(&prior), &change),
            vec![TagOperation::SetTags(tags(&[("a", "9")]))]
        );
    }

    #[rstest]
    fn new_elements_set_every_tag_last_duplicate_winning() {
        let change = modified(Element::node(-1, 0.0, 0.0).with_tags(tags(&[
            ("name", "A"),
            ("shop", "bakery"),
            ("name", "B"),
        ])));
        assert_eq!(
            tag_operations(None, &change),
            vec![TagOperation::SetTags(tags(&[("name", "B"), ("shop", "bakery")]))]
        );
    }

    #[rstest]
    fn deletions_need_no_tag_operations(prior: Element) {
        let change = Change::new(prior.clone(), Operation::Delete);
        assert!(tag_operations(Some(&prior), &change).is_empty());
    }

    #[rstest]
    fn operations_serialize_as_task_json() {
        let operations = vec![
            TagOperation::SetTags(tags(&[("c", "3"), ("amenity", "cafe")])),
            TagOperation::UnsetTags(vec!["b".to_owned()]),
        ];
        assert_eq!(
            serde_json::to_value(&operations).expect("serializable"),
            json!([
                {"operation": "setTags", "data": {"c": "3", "amenity": "cafe"}},
                {"operation": "unsetTags", "data": ["b"]},
            ])
        );
    }

    #[rstest]
    #[case(Operation::Delete, 4, IndependentOperation::DeleteElement)]
    #[case(Operation::Delete, -4, IndependentOperation::DeleteElement)]
    #[case(Operation::Modify, -4, IndependentOperation::CreateElement)]
    #[case(Operation::Create, -4, IndependentOperation::CreateElement)]
    #[case(Operation::Modify, 4, IndependentOperation::ModifyElement)]
    fn classifies_independent_operations(
        #[case] operation: Operation,
        #[case] id: ElementId,
        #[case] expected: IndependentOperation,
    ) {
        let change = Change::new(Element::node(id, 0.0, 0.0), operation);
        assert_eq!(independent_operation(&change), expected);
    }

    #[rstest]
    fn independent_operations_serialize_in_camel_case() {
        assert_eq!(
            serde_json::to_value(IndependentOperation::ModifyElement).expect("serializable"),
            json!("modifyElement")
        );
    }

    #[rstest]
    #[case::create(Change::new(Element::node(-1, 0.0, 0.0), Operation::Create), UnsupportedEditReason::NotModify(Operation::Create))]
    #[case::delete(Change::new(Element::node(5, 0.0, 0.0).with_version(2), Operation::Delete), UnsupportedEditReason::NotModify(Operation::Delete))]
    #[case::new(modified(Element::node(-1, 0.0, 0.0)), UnsupportedEditReason::NewElement)]
    #[case::zero(modified(Element::node(5, 0.0, 0.0).with_version(0)), UnsupportedEditReason::InvalidVersion(0))]
    #[case::unversioned(modified(Element::node(5, 0.0, 0.0)), UnsupportedEditReason::MissingVersion)]
    #[tokio::test]
    async fn rejects_edits_without_a_prior_version(
        #[case] change: Change,
        #[case] reason: UnsupportedEditReason,
    ) {
        let cache = FetchCache::new(StubElementSource::new());
        let err = operations_for(&change, &cache)
            .await
            .expect_err("unsupported edit");
        assert_eq!(
            err,
            DiffError::UnsupportedEdit {
                element_type: ElementType::Node,
                id: change.element_id,
                reason,
            }
        );
        assert!(cache.source().calls().is_empty(), "no fetch before preconditions pass");
    }

    #[rstest]
    #[tokio::test]
    async fn moved_nodes_are_unsupported(prior: Element) {
        let cache = FetchCache::new(StubElementSource::new().with_version(prior.clone()));
        let change = modified(prior.with_tags(tags(&[("a", "1")])));
        let moved = Change {
            element: Element::node(5, 1.5, 2.0).with_version(3),
            ..change
        };
        let err = operations_for(&moved, &cache)
            .await
            .expect_err("geometry changed");
        assert!(matches!(
            err,
            DiffError::UnsupportedEdit {
                reason: UnsupportedEditReason::GeometryChanged,
                ..
            }
        ));
    }

    #[rstest]
    #[tokio::test]
    async fn diffs_against_the_named_version(prior: Element) {
        let cache = FetchCache::new(StubElementSource::new().with_version(prior.clone()));
        let change = modified(prior.with_tags(tags(&[("a", "1")])));
        let operations = operations_for(&change, &cache).await.expect("tag edit");
        assert_eq!(
            operations,
            vec![TagOperation::UnsetTags(vec!["b".to_owned()])]
        );
        assert_eq!(
            cache.source().calls(),
            vec![SourceCall::Version {
                element_type: ElementType::Node,
                id: 5,
                version: 3
            }]
        );
    }

    #[rstest]
    #[tokio::test]
    async fn fetch_failures_are_reported(prior: Element) {
        let cache = FetchCache::new(StubElementSource::new());
        let err = operations_for(&modified(prior), &cache)
            .await
            .expect_err("version is unknown");
        assert!(matches!(err, DiffError::Fetch { id: 5, .. }));
    }
}
