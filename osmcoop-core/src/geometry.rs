//! Reconstruct geometry for changed elements.
//!
//! Ways and relations only carry references, so their coordinates come from
//! the document's element maps or, failing that, the [`FetchCache`].

use futures_util::future::{try_join, try_join_all};
use geo::{Coord, Geometry, LineString, MultiLineString, Point, Polygon};
use thiserror::Error;

use crate::fetch::{ElementSource, FetchCache, FetchError};
use crate::model::{Change, Element, ElementId, ElementKind, ElementMaps, ElementType, Member};

/// Why an element's geometry could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionCause {
    /// A referenced element was neither in the document nor returned by the
    /// source.
    #[error("data missing for referenced {element_type} {id}")]
    MissingElement {
        /// Type of the missing element.
        element_type: ElementType,
        /// Identifier of the missing element.
        id: ElementId,
    },
    /// A node has no coordinates.
    #[error("node {id} has no coordinates")]
    MissingCoordinates {
        /// Identifier of the node.
        id: ElementId,
    },
    /// Fetching supporting data failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Errors from [`resolve_geometry`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeometryError {
    /// Supporting data was missing or could not be fetched.
    #[error("failed to generate geometry for {element_type}/{id}: {cause}")]
    ResolutionFailed {
        /// Type of the element being resolved.
        element_type: ElementType,
        /// Identifier of the element being resolved.
        id: ElementId,
        /// Underlying failure.
        #[source]
        cause: ResolutionCause,
    },
    /// A relation has another relation as a member.
    #[error("relation {relation} has relation member {member}; super-relations are not supported")]
    UnsupportedNesting {
        /// Identifier of the outer relation.
        relation: ElementId,
        /// Identifier of the nested relation.
        member: ElementId,
    },
}

impl GeometryError {
    fn failed(element_type: ElementType, id: ElementId, cause: impl Into<ResolutionCause>) -> Self {
        Self::ResolutionFailed {
            element_type,
            id,
            cause: cause.into(),
        }
    }
}

/// Build the geometry of the element edited by `change`.
///
/// Nodes become points, closed ways with more than one coordinate become
/// polygons and other ways line strings. Relations become a multi line
/// string with one entry per member in member order; node members are
/// degenerate two-point segments.
///
/// # Errors
///
/// Returns [`GeometryError::ResolutionFailed`] when supporting data is
/// missing or cannot be fetched and [`GeometryError::UnsupportedNesting`] for
/// relations containing relations.
pub async fn resolve_geometry<S>(
    change: &Change,
    maps: &ElementMaps,
    cache: &FetchCache<S>,
) -> Result<Geometry<f64>, GeometryError>
where
    S: ElementSource + 'static,
{
    let element = &change.element;
    match &element.kind {
        ElementKind::Node { location } => {
            let coord = match location {
                Some(coord) => *coord,
                None => latest_node_location(element.id, cache).await?,
            };
            Ok(Geometry::Point(Point::from(coord)))
        }
        ElementKind::Way { nodes } => {
            let coords = way_coords(element.id, nodes, maps, cache).await?;
            Ok(way_geometry(coords))
        }
        ElementKind::Relation { members } => {
            relation_lines(element.id, members, maps, cache)
                .await
                .map(Geometry::MultiLineString)
        }
    }
}

/// Deleted nodes in OSMChange files may omit their coordinates.
async fn latest_node_location<S>(
    id: ElementId,
    cache: &FetchCache<S>,
) -> Result<Coord<f64>, GeometryError>
where
    S: ElementSource + 'static,
{
    let fetched = cache
        .fetch_many(ElementType::Node, &[id], None)
        .await
        .map_err(|err| GeometryError::failed(ElementType::Node, id, err))?;
    fetched
        .get(&id)
        .and_then(node_location)
        .ok_or_else(|| {
            GeometryError::failed(
                ElementType::Node,
                id,
                ResolutionCause::MissingCoordinates { id },
            )
        })
}

fn node_location(element: &Element) -> Option<Coord<f64>> {
    match element.kind {
        ElementKind::Node { location } => location,
        ElementKind::Way { .. } | ElementKind::Relation { .. } => None,
    }
}

fn way_geometry(coords: Vec<Coord<f64>>) -> Geometry<f64> {
    let closed = coords.len() > 1 && coords.first() == coords.last();
    let line = LineString::from(coords);
    if closed {
        Geometry::Polygon(Polygon::new(line, Vec::new()))
    } else {
        Geometry::LineString(line)
    }
}

async fn way_coords<S>(
    way_id: ElementId,
    nodes: &[ElementId],
    maps: &ElementMaps,
    cache: &FetchCache<S>,
) -> Result<Vec<Coord<f64>>, GeometryError>
where
    S: ElementSource + 'static,
{
    let fetched = cache
        .fetch_many(ElementType::Node, nodes, Some(maps))
        .await
        .map_err(|err| GeometryError::failed(ElementType::Way, way_id, err))?;
    nodes
        .iter()
        .map(|&node_id| {
            let node = fetched.get(&node_id).ok_or_else(|| {
                GeometryError::failed(
                    ElementType::Way,
                    way_id,
                    ResolutionCause::MissingElement {
                        element_type: ElementType::Node,
                        id: node_id,
                    },
                )
            })?;
            node_location(node).ok_or_else(|| {
                GeometryError::failed(
                    ElementType::Way,
                    way_id,
                    ResolutionCause::MissingCoordinates { id: node_id },
                )
            })
        })
        .collect()
}

async fn relation_lines<S>(
    relation_id: ElementId,
    members: &[Member],
    maps: &ElementMaps,
    cache: &FetchCache<S>,
) -> Result<MultiLineString<f64>, GeometryError>
where
    S: ElementSource + 'static,
{
    if let Some(nested) = members
        .iter()
        .find(|member| member.member_type == ElementType::Relation)
    {
        return Err(GeometryError::UnsupportedNesting {
            relation: relation_id,
            member: nested.id,
        });
    }

    let ids_of = |element_type: ElementType| -> Vec<ElementId> {
        members
            .iter()
            .filter(|member| member.member_type == element_type)
            .map(|member| member.id)
            .collect()
    };
    let node_ids = ids_of(ElementType::Node);
    let way_ids = ids_of(ElementType::Way);
    let (nodes, ways) = try_join(
        cache.fetch_many(ElementType::Node, &node_ids, Some(maps)),
        cache.fetch_many(ElementType::Way, &way_ids, Some(maps)),
    )
    .await
    .map_err(|err| GeometryError::failed(ElementType::Relation, relation_id, err))?;

    let missing = |member: &Member| {
        GeometryError::failed(
            ElementType::Relation,
            relation_id,
            ResolutionCause::MissingElement {
                element_type: member.member_type,
                id: member.id,
            },
        )
    };
    let member_lines = members.iter().map(|member| {
        let fetched = match member.member_type {
            ElementType::Node => nodes.get(&member.id),
            ElementType::Way | ElementType::Relation => ways.get(&member.id),
        };
        let resolved = fetched.ok_or_else(|| missing(member));
        async move {
            let element = resolved?;
            match &element.kind {
                ElementKind::Node { location } => {
                    let coord = location.ok_or_else(|| {
                        GeometryError::failed(
                            ElementType::Relation,
                            relation_id,
                            ResolutionCause::MissingCoordinates { id: element.id },
                        )
                    })?;
                    Ok(LineString::from(vec![coord, coord]))
                }
                ElementKind::Way { nodes: way_nodes } => {
                    way_coords(element.id, way_nodes, maps, cache)
                        .await
                        .map(LineString::from)
                }
                ElementKind::Relation { .. } => Err(GeometryError::UnsupportedNesting {
                    relation: relation_id,
                    member: element.id,
                }),
            }
        }
    });
    let lines = try_join_all(member_lines).await?;
    Ok(MultiLineString::new(lines))
}

/// Convert a resolved geometry into its GeoJSON form.
#[must_use]
pub fn to_geojson(geometry: &Geometry<f64>) -> geojson::Geometry {
    geojson::Geometry::new(geojson::Value::from(geometry))
}
