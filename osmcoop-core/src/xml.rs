//! Generic XML tree used as the normalized form of both change dialects.
//!
//! Documents are read with `quick-xml` into an owned [`XmlElement`] tree.
//! Text content is dropped; OpenStreetMap change files carry everything in
//! attributes.

use std::fmt;

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};

use crate::DocumentError;

/// One XML element with its attributes and child elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    /// Tag name.
    pub name: String,
    /// Attributes in document order.
    pub attributes: Vec<(String, String)>,
    /// Child elements in document order.
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    /// Create an element with no attributes or children.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Append an attribute.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(key, value);
        self
    }

    /// Append a child element.
    #[must_use]
    pub fn with_child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }

    /// Value of the attribute called `name`.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Set `key` to `value`, replacing an existing value in place.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some(slot) = self.attributes.iter_mut().find(|(name, _)| *name == key) {
            slot.1 = value;
        } else {
            self.attributes.push((key, value));
        }
    }

    /// Remove the attribute called `name`, returning its value.
    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        let position = self.attributes.iter().position(|(key, _)| key == name)?;
        Some(self.attributes.remove(position).1)
    }

    /// Children with tag `name`, in document order.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Self> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// Serialize this subtree without an XML declaration.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Write`] if the writer fails.
    pub fn to_xml_string(&self) -> Result<String, DocumentError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        write_element(&mut writer, self)?;
        into_string(writer.into_inner())
    }
}

/// Parse `xml` into a tree rooted at its single top-level element.
///
/// # Errors
///
/// Returns [`DocumentError::Malformed`] when the input is not well-formed,
/// contains no element, or has more than one root element.
///
/// # Examples
///
/// ```
/// use osmcoop_core::xml::parse_document;
///
/// let root = parse_document("<osm><node id='1'/><node id='2'/></osm>").unwrap();
/// assert_eq!(root.children_named("node").count(), 2);
/// ```
pub fn parse_document(xml: &str) -> Result<XmlElement, DocumentError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;
    loop {
        match reader.read_event().map_err(malformed)? {
            Event::Start(start) => {
                reject_second_root(root.as_ref(), &stack)?;
                stack.push(open_element(&start)?);
            }
            Event::Empty(start) => {
                reject_second_root(root.as_ref(), &stack)?;
                let element = open_element(&start)?;
                attach(&mut stack, &mut root, element);
            }
            Event::End(_) => {
                let element = stack.pop().ok_or_else(|| DocumentError::Malformed {
                    message: "closing tag without a matching opening tag".to_owned(),
                })?;
                attach(&mut stack, &mut root, element);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(DocumentError::Malformed {
            message: format!("element <{}> is never closed", open.name),
        });
    }
    root.ok_or_else(|| DocumentError::Malformed {
        message: "document contains no elements".to_owned(),
    })
}

fn malformed(err: impl fmt::Display) -> DocumentError {
    DocumentError::Malformed {
        message: err.to_string(),
    }
}

fn reject_second_root(
    root: Option<&XmlElement>,
    stack: &[XmlElement],
) -> Result<(), DocumentError> {
    match root {
        Some(existing) if stack.is_empty() => Err(DocumentError::Malformed {
            message: format!("content after root element <{}>", existing.name),
        }),
        _ => Ok(()),
    }
}

fn open_element(start: &BytesStart<'_>) -> Result<XmlElement, DocumentError> {
    let mut element = XmlElement::new(String::from_utf8_lossy(start.name().as_ref()));
    for attribute in start.attributes() {
        let attribute = attribute.map_err(malformed)?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute.unescape_value().map_err(malformed)?.into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(stack: &mut [XmlElement], root: &mut Option<XmlElement>, element: XmlElement) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => *root = Some(element),
    }
}

/// The two change-file dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// JOSM `<osm>` documents with per-element `action` attributes.
    Josm,
    /// Standard `<osmChange>` documents with operation blocks.
    OsmChange,
}

impl Dialect {
    /// Root element name of documents in this dialect.
    #[must_use]
    pub const fn root_name(self) -> &'static str {
        match self {
            Self::Josm => "osm",
            Self::OsmChange => "osmChange",
        }
    }

    /// Detect the dialect from a root element name.
    #[must_use]
    pub fn from_root(name: &str) -> Option<Self> {
        match name {
            "osm" => Some(Self::Josm),
            "osmChange" => Some(Self::OsmChange),
            _ => None,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Josm => f.write_str("JOSM"),
            Self::OsmChange => f.write_str("OSMChange"),
        }
    }
}

/// Parse a change document and detect its dialect from the root element.
///
/// # Errors
///
/// Returns [`DocumentError::Malformed`] for unreadable XML and
/// [`DocumentError::UnexpectedRoot`] when the root is neither `osm` nor
/// `osmChange`.
pub fn parse_change_document(xml: &str) -> Result<(Dialect, XmlElement), DocumentError> {
    let root = parse_document(xml)?;
    let dialect = Dialect::from_root(&root.name).ok_or_else(|| DocumentError::UnexpectedRoot {
        expected: "<osm> or <osmChange>".to_owned(),
        found: root.name.clone(),
    })?;
    Ok((dialect, root))
}

/// Parse a document that must be in `dialect`.
///
/// # Errors
///
/// As [`parse_document`], plus [`DocumentError::UnexpectedRoot`] when the
/// root does not match `dialect`.
pub fn parse_dialect_document(xml: &str, dialect: Dialect) -> Result<XmlElement, DocumentError> {
    let root = parse_document(xml)?;
    if root.name != dialect.root_name() {
        return Err(DocumentError::UnexpectedRoot {
            expected: format!("<{}>", dialect.root_name()),
            found: root.name,
        });
    }
    Ok(root)
}

/// Serialize `root` as a complete document with an XML declaration.
///
/// # Errors
///
/// Returns [`DocumentError::Write`] if the writer fails.
pub fn write_document(root: &XmlElement) -> Result<String, DocumentError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(write_failed)?;
    write_element(&mut writer, root)?;
    into_string(writer.into_inner())
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &XmlElement) -> Result<(), DocumentError> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }
    if element.children.is_empty() {
        return writer.write_event(Event::Empty(start)).map_err(write_failed);
    }
    writer.write_event(Event::Start(start)).map_err(write_failed)?;
    for child in &element.children {
        write_element(writer, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(write_failed)
}

fn write_failed(err: impl fmt::Display) -> DocumentError {
    DocumentError::Write {
        message: err.to_string(),
    }
}

fn into_string(bytes: Vec<u8>) -> Result<String, DocumentError> {
    String::from_utf8(bytes).map_err(write_failed)
}

pub(crate) fn required_attribute<'a>(
    xml: &'a XmlElement,
    name: &str,
) -> Result<&'a str, DocumentError> {
    xml.attribute(name)
        .ok_or_else(|| DocumentError::MissingAttribute {
            element: xml.name.clone(),
            attribute: name.to_owned(),
        })
}

pub(crate) fn attribute_error(xml: &XmlElement, name: &str, value: &str) -> DocumentError {
    DocumentError::InvalidAttribute {
        element: xml.name.clone(),
        attribute: name.to_owned(),
        value: value.to_owned(),
    }
}
