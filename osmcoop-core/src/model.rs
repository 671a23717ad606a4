//! Dialect-neutral OpenStreetMap change model.
//!
//! Elements are parsed into a tagged [`ElementKind`] at the document boundary
//! so every consumer matches exhaustively on node, way and relation shapes.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use geo::Coord;

use crate::xml::{XmlElement, attribute_error, required_attribute};
use crate::DocumentError;

/// OpenStreetMap element identifier. Negative values denote new elements.
pub type ElementId = i64;

/// The three OpenStreetMap primitive types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementType {
    /// A point with a coordinate.
    Node,
    /// An ordered list of node references.
    Way,
    /// An ordered list of typed members with roles.
    Relation,
}

impl ElementType {
    /// All element types in document processing order.
    pub const ALL: [Self; 3] = [Self::Node, Self::Way, Self::Relation];

    /// The XML tag name and API path segment for this type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Way => "way",
            Self::Relation => "relation",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementType {
    type Err = DocumentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "node" => Ok(Self::Node),
            "way" => Ok(Self::Way),
            "relation" => Ok(Self::Relation),
            other => Err(DocumentError::UnsupportedElementType {
                found: other.to_owned(),
            }),
        }
    }
}

/// Edit operation applied to an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// The element is new.
    Create,
    /// The element was edited. JOSM also uses this for new elements.
    Modify,
    /// The element was removed.
    Delete,
}

impl Operation {
    /// OSMChange block order used when extracting changes.
    pub const BLOCK_ORDER: [Self; 3] = [Self::Modify, Self::Create, Self::Delete];

    /// The JOSM `action` value and OSMChange block name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Modify => "modify",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when an operation name is not create, modify or delete.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown operation `{0}`")]
pub struct UnknownOperation(
    /// The rejected operation name.
    pub String,
);

impl FromStr for Operation {
    type Err = UnknownOperation;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "create" => Ok(Self::Create),
            "modify" => Ok(Self::Modify),
            "delete" => Ok(Self::Delete),
            other => Err(UnknownOperation(other.to_owned())),
        }
    }
}

/// A single `k`/`v` tag pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag {
    /// Tag key.
    pub key: String,
    /// Tag value, kept verbatim as text.
    pub value: String,
}

impl Tag {
    /// Construct a tag from a key and value.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A typed relation member.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Member {
    /// Type of the referenced element.
    pub member_type: ElementType,
    /// Identifier of the referenced element.
    pub id: ElementId,
    /// Role of the member within the relation. May be empty.
    pub role: String,
}

/// Geometry-bearing fields, one variant per element type.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementKind {
    /// A node. The location is absent for some deletions.
    Node {
        /// Longitude (`x`) and latitude (`y`).
        location: Option<Coord<f64>>,
    },
    /// A way with its ordered node references.
    Way {
        /// Referenced node identifiers in order.
        nodes: Vec<ElementId>,
    },
    /// A relation with its ordered members.
    Relation {
        /// Members in declaration order.
        members: Vec<Member>,
    },
}

/// An OpenStreetMap primitive as found in a change document or API response.
///
/// # Examples
///
/// ```
/// use osmcoop_core::{Element, ElementType, Tag};
///
/// let node = Element::node(-1, 51.5, -0.1).with_tags(vec![Tag::new("amenity", "cafe")]);
/// assert_eq!(node.element_type(), ElementType::Node);
/// assert!(node.is_new());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Element identifier.
    pub id: ElementId,
    /// Version the element is based on, when known.
    pub version: Option<u32>,
    /// JOSM `action` attribute, when present.
    pub action: Option<Operation>,
    /// Tags in document order. Duplicate keys are preserved.
    pub tags: Vec<Tag>,
    /// Type-specific fields.
    pub kind: ElementKind,
}

impl Element {
    /// Construct an untagged node at `lat`/`lon`.
    #[must_use]
    pub fn node(id: ElementId, lat: f64, lon: f64) -> Self {
        Self::with_kind(
            id,
            ElementKind::Node {
                location: Some(Coord { x: lon, y: lat }),
            },
        )
    }

    /// Construct an untagged way over `nodes`.
    #[must_use]
    pub fn way(id: ElementId, nodes: Vec<ElementId>) -> Self {
        Self::with_kind(id, ElementKind::Way { nodes })
    }

    /// Construct an untagged relation over `members`.
    #[must_use]
    pub fn relation(id: ElementId, members: Vec<Member>) -> Self {
        Self::with_kind(id, ElementKind::Relation { members })
    }

    const fn with_kind(id: ElementId, kind: ElementKind) -> Self {
        Self {
            id,
            version: None,
            action: None,
            tags: Vec::new(),
            kind,
        }
    }

    /// Replace the tags.
    #[must_use]
    pub fn with_tags(mut self, tags: Vec<Tag>) -> Self {
        self.tags = tags;
        self
    }

    /// Set the version.
    #[must_use]
    pub const fn with_version(mut self, version: u32) -> Self {
        self.version = Some(version);
        self
    }

    /// Set the JOSM action.
    #[must_use]
    pub const fn with_action(mut self, action: Operation) -> Self {
        self.action = Some(action);
        self
    }

    /// Type of this element.
    #[must_use]
    pub const fn element_type(&self) -> ElementType {
        match self.kind {
            ElementKind::Node { .. } => ElementType::Node,
            ElementKind::Way { .. } => ElementType::Way,
            ElementKind::Relation { .. } => ElementType::Relation,
        }
    }

    /// Whether the element has not been uploaded yet.
    #[must_use]
    pub const fn is_new(&self) -> bool {
        self.id < 0
    }

    /// Elements this element structurally refers to, in declaration order.
    #[must_use]
    pub fn references(&self) -> Vec<Reference> {
        match &self.kind {
            ElementKind::Node { .. } => Vec::new(),
            ElementKind::Way { nodes } => nodes
                .iter()
                .map(|&id| Reference::new(ElementType::Node, id))
                .collect(),
            ElementKind::Relation { members } => members
                .iter()
                .map(|member| Reference::new(member.member_type, member.id))
                .collect(),
        }
    }

    /// Whether the geometry-bearing fields of `other` differ from this one.
    #[must_use]
    pub fn structure_differs(&self, other: &Self) -> bool {
        match (&self.kind, &other.kind) {
            (ElementKind::Node { location: left }, ElementKind::Node { location: right }) => {
                left != right
            }
            (ElementKind::Way { nodes: left }, ElementKind::Way { nodes: right }) => left != right,
            (
                ElementKind::Relation { members: left },
                ElementKind::Relation { members: right },
            ) => left != right,
            _ => true,
        }
    }

    /// Parse an element from a normalized `<node>`, `<way>` or `<relation>`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError`] when the tag name is not a primitive type,
    /// a required attribute is missing or unparseable, or a relation member
    /// names an unsupported type.
    pub fn from_xml(xml: &XmlElement) -> Result<Self, DocumentError> {
        let element_type = ElementType::from_str(&xml.name)?;
        let id = parse_attribute::<ElementId>(xml, "id")?;
        let version = optional_attribute::<u32>(xml, "version")?;
        let action = xml
            .attribute("action")
            .map(|value| {
                Operation::from_str(value).map_err(|_| attribute_error(xml, "action", value))
            })
            .transpose()?;
        let tags = xml
            .children_named("tag")
            .map(|tag| {
                Ok(Tag::new(
                    required_attribute(tag, "k")?,
                    required_attribute(tag, "v")?,
                ))
            })
            .collect::<Result<Vec<_>, DocumentError>>()?;
        let kind = match element_type {
            ElementType::Node => {
                let lat = optional_attribute::<f64>(xml, "lat")?;
                let lon = optional_attribute::<f64>(xml, "lon")?;
                ElementKind::Node {
                    location: lat.zip(lon).map(|(y, x)| Coord { x, y }),
                }
            }
            ElementType::Way => ElementKind::Way {
                nodes: xml
                    .children_named("nd")
                    .map(|nd| parse_attribute::<ElementId>(nd, "ref"))
                    .collect::<Result<_, _>>()?,
            },
            ElementType::Relation => ElementKind::Relation {
                members: xml
                    .children_named("member")
                    .map(|member| {
                        Ok(Member {
                            member_type: ElementType::from_str(required_attribute(
                                member, "type",
                            )?)?,
                            id: parse_attribute::<ElementId>(member, "ref")?,
                            role: member.attribute("role").unwrap_or_default().to_owned(),
                        })
                    })
                    .collect::<Result<_, DocumentError>>()?,
            },
        };
        Ok(Self {
            id,
            version,
            action,
            tags,
            kind,
        })
    }
}

fn parse_attribute<T: FromStr>(xml: &XmlElement, name: &'static str) -> Result<T, DocumentError> {
    let raw = required_attribute(xml, name)?;
    raw.trim()
        .parse()
        .map_err(|_| attribute_error(xml, name, raw))
}

fn optional_attribute<T: FromStr>(
    xml: &XmlElement,
    name: &'static str,
) -> Result<Option<T>, DocumentError> {
    xml.attribute(name)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|_| attribute_error(xml, name, raw))
        })
        .transpose()
}

/// A structural edge pointing at `(element_type, element_id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Reference {
    /// Type of the referenced element.
    pub element_type: ElementType,
    /// Identifier of the referenced element.
    pub element_id: ElementId,
}

impl Reference {
    /// Construct a reference.
    #[must_use]
    pub const fn new(element_type: ElementType, element_id: ElementId) -> Self {
        Self {
            element_type,
            element_id,
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.element_type, self.element_id)
    }
}

/// One edited element together with its operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    /// Type of the edited element.
    pub element_type: ElementType,
    /// Identifier of the edited element.
    pub element_id: ElementId,
    /// The element as it appears in the change document.
    pub element: Element,
    /// The edit applied.
    pub operation: Operation,
}

impl Change {
    /// Wrap `element` in a change with `operation`.
    #[must_use]
    pub const fn new(element: Element, operation: Operation) -> Self {
        Self {
            element_type: element.element_type(),
            element_id: element.id,
            element,
            operation,
        }
    }

    /// The `(type, id)` identity of the edited element.
    #[must_use]
    pub const fn reference(&self) -> Reference {
        Reference::new(self.element_type, self.element_id)
    }

    /// The `type/id` string used as a feature identifier.
    #[must_use]
    pub fn id_string(&self) -> String {
        self.reference().to_string()
    }
}

/// Changes from one logical unit of a change document.
pub type ChangeSet = Vec<Change>;

/// Per-type maps of every element available in a document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementMaps {
    nodes: HashMap<ElementId, Element>,
    ways: HashMap<ElementId, Element>,
    relations: HashMap<ElementId, Element>,
}

impl ElementMaps {
    /// Insert an element into the map for its type, replacing any earlier one.
    pub fn insert(&mut self, element: Element) {
        let map = self.map_mut(element.element_type());
        map.insert(element.id, element);
    }

    /// The map holding elements of `element_type`.
    #[must_use]
    pub const fn map(&self, element_type: ElementType) -> &HashMap<ElementId, Element> {
        match element_type {
            ElementType::Node => &self.nodes,
            ElementType::Way => &self.ways,
            ElementType::Relation => &self.relations,
        }
    }

    const fn map_mut(&mut self, element_type: ElementType) -> &mut HashMap<ElementId, Element> {
        match element_type {
            ElementType::Node => &mut self.nodes,
            ElementType::Way => &mut self.ways,
            ElementType::Relation => &mut self.relations,
        }
    }

    /// Look up an element by identity.
    #[must_use]
    pub fn get(&self, reference: Reference) -> Option<&Element> {
        self.map(reference.element_type).get(&reference.element_id)
    }

    /// Total number of elements across all types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len() + self.ways.len() + self.relations.len()
    }

    /// Whether no elements are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
