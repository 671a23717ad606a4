//! Core change model for turning OpenStreetMap edit files into cooperative
//! tasks.
//!
//! JOSM `<osm>` change files and `<osmChange>` files are normalized into one
//! [`Change`] model. From there the crate partitions top-level edits from
//! supporting elements, splits documents per edit, reconstructs geometry,
//! computes tag diffs and assembles task records. Remote data is reached
//! through the [`ElementSource`] trait so the HTTP client lives elsewhere.

#![cfg_attr(docsrs, feature(doc_cfg))]

mod error;

pub mod convert;
pub mod diff;
pub mod explode;
pub mod extract;
pub mod fetch;
pub mod geometry;
pub mod graph;
pub mod model;
pub mod task;
pub mod xml;

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-support")))]
pub mod test_support;

pub use convert::josm_to_osc;
pub use diff::{
    DiffError, IndependentOperation, TagOperation, UnsupportedEditReason, independent_operation,
    operations_for, tag_operations,
};
pub use error::DocumentError;
pub use explode::{explode, explode_as, explode_josm, explode_osc};
pub use extract::{ParsedChanges, parse_changes, parse_changes_as, parse_josm, parse_osc};
pub use fetch::{CacheKey, ElementSource, FetchCache, FetchError};
pub use geometry::{GeometryError, ResolutionCause, resolve_geometry, to_geojson};
pub use graph::{supporting_changes, top_level_changes};
pub use model::{
    Change, ChangeSet, Element, ElementId, ElementKind, ElementMaps, ElementType, Member,
    Operation, Reference, Tag,
};
pub use task::{RecordError, change_file_task, feature_for, tag_fix_task, write_record};
pub use xml::{Dialect, XmlElement};
