//! Convert JOSM change documents into OSMChange documents.

use std::str::FromStr;

use crate::explode::API_VERSION;
use crate::model::{ElementType, Operation};
use crate::xml::{
    Dialect, XmlElement, attribute_error, parse_dialect_document, required_attribute,
    write_document,
};
use crate::DocumentError;

/// Rewrite a JOSM `<osm>` document as an `<osmChange>` document.
///
/// Every element carrying an `action` is wrapped in its own operation block
/// in document order, with the `action` attribute removed. `modify` on a new
/// element (negative id) becomes `create`. Elements without an `action` are
/// dropped.
///
/// # Errors
///
/// Returns [`DocumentError`] for a non-`<osm>` root, an unknown `action`, or
/// an action element without a numeric `id`.
///
/// # Examples
///
/// ```
/// use osmcoop_core::convert::josm_to_osc;
///
/// let osc = josm_to_osc(r#"<osm><node id="-1" action="modify" lat="0" lon="0"/></osm>"#).unwrap();
/// assert!(osc.contains("<create>"));
/// assert!(!osc.contains("action"));
/// ```
pub fn josm_to_osc(xml: &str) -> Result<String, DocumentError> {
    let root = parse_dialect_document(xml, Dialect::Josm)?;
    let mut document =
        XmlElement::new(Dialect::OsmChange.root_name()).with_attribute("version", API_VERSION);

    let primitives = root.children.iter().filter(|child| {
        ElementType::ALL
            .iter()
            .any(|element_type| child.name == element_type.as_str())
    });
    for child in primitives {
        let mut element = child.clone();
        let Some(action) = element.remove_attribute("action") else {
            continue;
        };
        let declared = Operation::from_str(&action)
            .map_err(|_| attribute_error(child, "action", &action))?;
        let operation = if declared == Operation::Modify && is_new(&element)? {
            Operation::Create
        } else {
            declared
        };
        document
            .children
            .push(XmlElement::new(operation.as_str()).with_child(element));
    }

    write_document(&document)
}

fn is_new(element: &XmlElement) -> Result<bool, DocumentError> {
    let raw = required_attribute(element, "id")?;
    raw.trim()
        .parse::<i64>()
        .map(|id| id < 0)
        .map_err(|_| attribute_error(element, "id", raw))
}
