//! Extract changes, references and element maps from a change document.

use std::str::FromStr;

use crate::graph::top_level_changes;
use crate::model::{Change, ChangeSet, Element, ElementMaps, ElementType, Operation, Reference};
use crate::xml::{Dialect, XmlElement, parse_change_document, parse_dialect_document};
use crate::DocumentError;

/// Everything extracted from one change document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedChanges {
    /// Every element in the document keyed by type and id.
    pub element_maps: ElementMaps,
    /// Change sets in processing order.
    pub changes: Vec<ChangeSet>,
    /// Structural references accumulated across the document.
    pub references: Vec<Reference>,
    /// Changes not referenced by any other element.
    pub top_level: Vec<Change>,
}

impl ParsedChanges {
    /// Iterate over every change across all sets in order.
    pub fn all_changes(&self) -> impl Iterator<Item = &Change> {
        self.changes.iter().flatten()
    }

    fn finish(mut self) -> Self {
        self.top_level = top_level_changes(&self.changes, &self.references);
        self
    }
}

/// Parse a change document, detecting the dialect from the root element.
///
/// # Errors
///
/// Returns [`DocumentError`] when the document is malformed, has an
/// unexpected root, or contains an invalid element.
///
/// # Examples
///
/// ```
/// use osmcoop_core::extract::parse_changes;
///
/// let parsed = parse_changes(
///     r#"<osm><node id="-1" lat="1" lon="2"/></osm>"#,
/// ).unwrap();
/// assert_eq!(parsed.top_level.len(), 1);
/// ```
pub fn parse_changes(xml: &str) -> Result<ParsedChanges, DocumentError> {
    let (dialect, root) = parse_change_document(xml)?;
    extract(dialect, &root)
}

/// Parse a change document that must be in `dialect`.
///
/// # Errors
///
/// As [`parse_changes`], with [`DocumentError::UnexpectedRoot`] when the root
/// does not belong to `dialect`.
pub fn parse_changes_as(xml: &str, dialect: Dialect) -> Result<ParsedChanges, DocumentError> {
    let root = parse_dialect_document(xml, dialect)?;
    extract(dialect, &root)
}

/// Parse a JOSM `<osm>` change document.
///
/// # Errors
///
/// See [`parse_changes_as`].
pub fn parse_josm(xml: &str) -> Result<ParsedChanges, DocumentError> {
    parse_changes_as(xml, Dialect::Josm)
}

/// Parse an `<osmChange>` document.
///
/// # Errors
///
/// See [`parse_changes_as`].
pub fn parse_osc(xml: &str) -> Result<ParsedChanges, DocumentError> {
    parse_changes_as(xml, Dialect::OsmChange)
}

/// Extract changes from an already parsed root element.
///
/// # Errors
///
/// Returns [`DocumentError`] for invalid elements.
pub fn extract(dialect: Dialect, root: &XmlElement) -> Result<ParsedChanges, DocumentError> {
    let parsed = match dialect {
        Dialect::Josm => extract_josm(root)?,
        Dialect::OsmChange => extract_osc(root)?,
    };
    Ok(parsed.finish())
}

/// Operation implied by a JOSM element: its `action`, or modify for new
/// elements that carry none.
pub(crate) const fn josm_operation(element: &Element) -> Option<Operation> {
    match element.action {
        Some(action) => Some(action),
        None if element.is_new() => Some(Operation::Modify),
        None => None,
    }
}

fn extract_josm(root: &XmlElement) -> Result<ParsedChanges, DocumentError> {
    let mut parsed = ParsedChanges::default();
    for element_type in ElementType::ALL {
        for xml in root.children_named(element_type.as_str()) {
            let element = Element::from_xml(xml)?;
            parsed.element_maps.insert(element.clone());
            if let Some(operation) = josm_operation(&element) {
                parsed.references.extend(element.references());
                parsed.changes.push(vec![Change::new(element, operation)]);
            }
        }
    }
    Ok(parsed)
}

fn extract_osc(root: &XmlElement) -> Result<ParsedChanges, DocumentError> {
    let mut parsed = ParsedChanges::default();
    for operation in Operation::BLOCK_ORDER {
        for block in root.children_named(operation.as_str()) {
            let mut change_set = ChangeSet::new();
            for element_type in ElementType::ALL {
                for xml in block.children_named(element_type.as_str()) {
                    let element = Element::from_xml(xml)?;
                    parsed.element_maps.insert(element.clone());
                    parsed.references.extend(element.references());
                    change_set.push(Change::new(element, operation));
                }
            }
            parsed.changes.push(change_set);
        }
    }
    Ok(parsed)
}

/// Parse an API response body holding elements of `element_type`.
///
/// Accepts the `<osm>` envelope returned by both the versioned element and
/// the multi-fetch endpoints. Elements of other types are ignored.
///
/// # Errors
///
/// Returns [`DocumentError`] when the body is not an `<osm>` document or an
/// element is invalid.
pub fn parse_element_response(
    xml: &str,
    element_type: ElementType,
) -> Result<Vec<Element>, DocumentError> {
    let root = parse_dialect_document(xml, Dialect::Josm)?;
    root.children_named(element_type.as_str())
        .map(Element::from_xml)
        .collect()
}

impl FromStr for ParsedChanges {
    type Err = DocumentError;

    fn from_str(xml: &str) -> Result<Self, Self::Err> {
        parse_changes(xml)
    }
}
