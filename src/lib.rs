//! Facade crate for turning OpenStreetMap change files into cooperative
//! challenge tasks.
//!
//! This crate re-exports the change model, geometry resolution, tag diffing
//! and task records, and exposes the throttled OSM API source behind the
//! `http` feature.

#![forbid(unsafe_code)]

pub use osmcoop_core::{
    Change, ChangeSet, DiffError, Dialect, DocumentError, Element, ElementMaps, ElementSource,
    ElementType, FetchCache, FetchError, GeometryError, Operation, ParsedChanges, RecordError,
    TagOperation, change_file_task, explode, josm_to_osc, operations_for, parse_changes,
    resolve_geometry, tag_fix_task, write_record,
};

#[cfg(feature = "http")]
pub use osmcoop_data::{OsmApiConfig, OsmApiSource, QueueStartError, ThrottledQueue};
