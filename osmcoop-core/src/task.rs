//! Assemble cooperative task records as GeoJSON feature collections.
//!
//! Each record is a `FeatureCollection` with a `cooperativeWork` foreign
//! member describing either tag operations (tag-fix tasks) or an attached
//! OSMChange file (change-file tasks).

use std::io::{self, Write};

use base64::{Engine as _, engine::general_purpose};
use geo::Geometry;
use geojson::{Feature, FeatureCollection, JsonObject, JsonValue};
use serde::Serialize;
use thiserror::Error;

use crate::diff::{IndependentOperation, TagOperation, independent_operation};
use crate::geometry::to_geojson;
use crate::model::Change;

/// Version of the `cooperativeWork` format emitted.
pub const COOPERATIVE_WORK_VERSION: u8 = 2;

/// RFC 7464 record separator written before each record when requested.
pub const RECORD_SEPARATOR: u8 = 0x1E;

/// Kinds of cooperative task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// Tag-only edits expressed as operations.
    TagFix,
    /// Arbitrary edits attached as an OSMChange file.
    ChangeFile,
}

impl TaskKind {
    /// Numeric `meta.type` value.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::TagFix => 1,
            Self::ChangeFile => 2,
        }
    }
}

/// Errors raised while serializing or writing a task record.
#[derive(Debug, Error)]
pub enum RecordError {
    /// The record could not be converted to JSON.
    #[error("failed to serialize task record: {0}")]
    Serialize(#[from] serde_json::Error),
    /// The record could not be written to the output.
    #[error("failed to write task record: {0}")]
    Write(#[from] io::Error),
}

#[derive(Serialize)]
struct Meta {
    version: u8,
    #[serde(rename = "type")]
    kind: u8,
}

impl Meta {
    const fn for_kind(kind: TaskKind) -> Self {
        Self {
            version: COOPERATIVE_WORK_VERSION,
            kind: kind.code(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TaskOperation<'a> {
    operation_type: IndependentOperation,
    data: TaskOperationData<'a>,
}

#[derive(Serialize)]
struct TaskOperationData<'a> {
    id: String,
    #[serde(skip_serializing_if = "<[TagOperation]>::is_empty")]
    operations: &'a [TagOperation],
}

#[derive(Serialize)]
struct TagFixWork<'a> {
    meta: Meta,
    operations: [TaskOperation<'a>; 1],
}

#[derive(Serialize)]
struct ChangeFileWork {
    meta: Meta,
    file: ChangeFile,
}

#[derive(Serialize)]
struct ChangeFile {
    #[serde(rename = "type")]
    kind: &'static str,
    format: &'static str,
    encoding: &'static str,
    content: String,
}

/// Feature properties for `change`: its tags plus an `@id` of `type/id`.
///
/// Duplicate tag keys resolve to the last value.
#[must_use]
pub fn feature_properties(change: &Change) -> JsonObject {
    let mut properties = JsonObject::new();
    for tag in &change.element.tags {
        properties.insert(tag.key.clone(), JsonValue::String(tag.value.clone()));
    }
    properties.insert("@id".to_owned(), JsonValue::String(change.id_string()));
    properties
}

/// A GeoJSON feature for `change` with the given geometry.
#[must_use]
pub fn feature_for(change: &Change, geometry: &Geometry<f64>) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(to_geojson(geometry)),
        id: None,
        properties: Some(feature_properties(change)),
        foreign_members: None,
    }
}

fn with_cooperative_work(
    features: Vec<Feature>,
    work: &impl Serialize,
) -> Result<FeatureCollection, RecordError> {
    let mut members = JsonObject::new();
    members.insert("cooperativeWork".to_owned(), serde_json::to_value(work)?);
    Ok(FeatureCollection {
        bbox: None,
        features,
        foreign_members: Some(members),
    })
}

/// A tag-fix task for a single change.
///
/// `operations` may be empty, in which case the task carries only the
/// independent operation.
///
/// # Errors
///
/// Returns [`RecordError::Serialize`] if the work block cannot be encoded.
pub fn tag_fix_task(
    change: &Change,
    geometry: &Geometry<f64>,
    operations: &[TagOperation],
) -> Result<FeatureCollection, RecordError> {
    let work = TagFixWork {
        meta: Meta::for_kind(TaskKind::TagFix),
        operations: [TaskOperation {
            operation_type: independent_operation(change),
            data: TaskOperationData {
                id: change.id_string(),
                operations,
            },
        }],
    };
    with_cooperative_work(vec![feature_for(change, geometry)], &work)
}

/// A change-file task attaching `osc_content` base64-encoded.
///
/// # Errors
///
/// Returns [`RecordError::Serialize`] if the work block cannot be encoded.
pub fn change_file_task(
    features: Vec<Feature>,
    osc_content: &str,
) -> Result<FeatureCollection, RecordError> {
    let work = ChangeFileWork {
        meta: Meta::for_kind(TaskKind::ChangeFile),
        file: ChangeFile {
            kind: "xml",
            format: "osc",
            encoding: "base64",
            content: general_purpose::STANDARD.encode(osc_content),
        },
    };
    with_cooperative_work(features, &work)
}

/// Write `record` as a single JSON line, preceded by the RFC 7464 record
/// separator when `rfc7464` is set.
///
/// # Errors
///
/// Returns [`RecordError`] when serialization or writing fails.
pub fn write_record<W: Write + ?Sized>(
    writer: &mut W,
    record: &FeatureCollection,
    rfc7464: bool,
) -> Result<(), RecordError> {
    if rfc7464 {
        writer.write_all(&[RECORD_SEPARATOR])?;
    }
    serde_json::to_writer(&mut *writer, record)?;
    writer.write_all(b"\n")?;
    Ok(())
}
