//! Split a multi-edit change document into independent single-edit documents.
//!
//! JOSM documents yield one `<osm>` document per action element, carrying the
//! supporting elements it needs. OSMChange documents yield one document per
//! operation block.

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::model::{Element, ElementType, Operation, Reference};
use crate::xml::{
    Dialect, XmlElement, parse_change_document, parse_dialect_document, write_document,
};
use crate::DocumentError;

/// Generator attribute written into exploded JOSM documents.
pub const JOSM_GENERATOR: &str = "JOSM";

/// API version attribute written into generated documents.
pub const API_VERSION: &str = "0.6";

/// Split a change document, detecting the dialect from its root.
///
/// `at_top_level` only applies to JOSM documents; see [`explode_josm`].
///
/// # Errors
///
/// Returns [`DocumentError`] when the document cannot be parsed or written.
pub fn explode(xml: &str, at_top_level: bool) -> Result<Vec<String>, DocumentError> {
    let (dialect, root) = parse_change_document(xml)?;
    explode_root(dialect, &root, at_top_level)
}

/// Split a change document that must be in `dialect`.
///
/// # Errors
///
/// As [`explode`], plus [`DocumentError::UnexpectedRoot`] for a root from
/// the other dialect.
pub fn explode_as(
    xml: &str,
    dialect: Dialect,
    at_top_level: bool,
) -> Result<Vec<String>, DocumentError> {
    let root = parse_dialect_document(xml, dialect)?;
    explode_root(dialect, &root, at_top_level)
}

fn explode_root(
    dialect: Dialect,
    root: &XmlElement,
    at_top_level: bool,
) -> Result<Vec<String>, DocumentError> {
    let documents = match dialect {
        Dialect::Josm => explode_josm_root(root, at_top_level)?,
        Dialect::OsmChange => explode_osc_root(root)?,
    };
    debug!("exploded {dialect} document into {} parts", documents.len());
    Ok(documents)
}

/// Split a JOSM document into one document per action element.
///
/// New elements without an `action` are treated as `action="modify"`. Each
/// output holds the supporting elements of its action element, depth first
/// with every element preceded by its own supports, followed by the action
/// element itself. No element appears twice in one output and reference
/// cycles terminate.
///
/// With `at_top_level`, action elements referenced by another action
/// element are not given their own document.
///
/// # Errors
///
/// Returns [`DocumentError`] for a non-`<osm>` root or invalid elements.
///
/// # Examples
///
/// ```
/// use osmcoop_core::explode::explode_josm;
///
/// let parts = explode_josm(
///     r#"<osm><node id="-1" lat="0" lon="0"/><way id="-2"><nd ref="-1"/></way></osm>"#,
///     true,
/// ).unwrap();
/// assert_eq!(parts.len(), 1);
/// ```
pub fn explode_josm(xml: &str, at_top_level: bool) -> Result<Vec<String>, DocumentError> {
    explode_as(xml, Dialect::Josm, at_top_level)
}

/// Split an OSMChange document into one document per operation block.
///
/// # Errors
///
/// Returns [`DocumentError`] for a non-`<osmChange>` root.
pub fn explode_osc(xml: &str) -> Result<Vec<String>, DocumentError> {
    explode_as(xml, Dialect::OsmChange, false)
}

/// A primitive child of a JOSM root with its parsed references.
struct Candidate {
    identity: Reference,
    xml: XmlElement,
    references: Vec<Reference>,
    is_action: bool,
}

fn explode_josm_root(root: &XmlElement, at_top_level: bool) -> Result<Vec<String>, DocumentError> {
    let mut candidates = Vec::new();
    for child in &root.children {
        if ElementType::ALL
            .iter()
            .all(|element_type| child.name != element_type.as_str())
        {
            continue;
        }
        let mut xml = child.clone();
        let element = Element::from_xml(&xml)?;
        if element.action.is_none() && element.is_new() {
            xml.set_attribute("action", Operation::Modify.as_str());
        }
        candidates.push(Candidate {
            identity: Reference::new(element.element_type(), element.id),
            is_action: xml.attribute("action").is_some(),
            references: element.references(),
            xml,
        });
    }

    let by_identity: HashMap<Reference, &Candidate> = candidates
        .iter()
        .map(|candidate| (candidate.identity, candidate))
        .collect();
    let supported: HashSet<Reference> = candidates
        .iter()
        .filter(|candidate| candidate.is_action)
        .flat_map(|candidate| candidate.references.iter().copied())
        .collect();

    candidates
        .iter()
        .filter(|candidate| candidate.is_action)
        .filter(|candidate| !at_top_level || !supported.contains(&candidate.identity))
        .map(|candidate| {
            let mut visited = HashSet::from([candidate.identity]);
            let mut children = Vec::new();
            collect_supports(candidate, &by_identity, &mut visited, &mut children);
            children.push(candidate.xml.clone());
            let document = XmlElement {
                name: Dialect::Josm.root_name().to_owned(),
                attributes: vec![
                    ("version".to_owned(), API_VERSION.to_owned()),
                    ("generator".to_owned(), JOSM_GENERATOR.to_owned()),
                ],
                children,
            };
            write_document(&document)
        })
        .collect()
}

fn collect_supports(
    candidate: &Candidate,
    by_identity: &HashMap<Reference, &Candidate>,
    visited: &mut HashSet<Reference>,
    output: &mut Vec<XmlElement>,
) {
    for reference in &candidate.references {
        let Some(support) = by_identity.get(reference) else {
            continue;
        };
        if !visited.insert(*reference) {
            continue;
        }
        collect_supports(support, by_identity, visited, output);
        output.push(support.xml.clone());
    }
}

fn explode_osc_root(root: &XmlElement) -> Result<Vec<String>, DocumentError> {
    root.children
        .iter()
        .filter(|child| {
            Operation::BLOCK_ORDER
                .iter()
                .any(|operation| child.name == operation.as_str())
        })
        .map(|block| {
            let document = XmlElement::new(Dialect::OsmChange.root_name())
                .with_attribute("version", API_VERSION)
                .with_child(block.clone());
            write_document(&document)
        })
        .collect()
}
