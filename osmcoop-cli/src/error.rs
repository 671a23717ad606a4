//! Error types emitted by the osmcoop CLI.

use std::sync::Arc;

use camino::Utf8PathBuf;
use osmcoop_core::{DiffError, DocumentError, GeometryError, RecordError};
use osmcoop_data::{QueueStartError, SourceBuildError};
use thiserror::Error;

/// Errors emitted by the osmcoop CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// No change files were given after configuration merging.
    #[error("no input files given (pass one or more paths or set {env})")]
    MissingInput { env: &'static str },
    /// Both dialect overrides were requested.
    #[error("--josm and --osc cannot be combined")]
    ConflictingDialects,
    /// The request throttle must leave time between requests.
    #[error("--throttle-ms must be greater than zero")]
    ZeroThrottle,
    /// An input file could not be read.
    #[error("failed to read {path:?}: {source}")]
    ReadInput {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// An input file is not a usable change document.
    #[error("{path}: {source}")]
    Document {
        path: Utf8PathBuf,
        #[source]
        source: DocumentError,
    },
    /// A change could not be expressed as tag operations.
    #[error("{path}: {source}")]
    Diff {
        path: Utf8PathBuf,
        #[source]
        source: DiffError,
    },
    /// Geometry could not be built for a change.
    #[error("{path}: {source}")]
    Geometry {
        path: Utf8PathBuf,
        #[source]
        source: GeometryError,
    },
    /// A task record could not be serialized or written.
    #[error("{path}: {source}")]
    Record {
        path: Utf8PathBuf,
        #[source]
        source: RecordError,
    },
    /// The output file could not be created.
    #[error("failed to create output file {path:?}: {source}")]
    CreateOutput {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Flushing the task output failed.
    #[error("failed to write task output: {0}")]
    WriteOutput(#[source] std::io::Error),
    /// Building the async runtime failed.
    #[error("failed to build Tokio runtime: {0}")]
    Runtime(#[source] std::io::Error),
    /// Building the API client failed.
    #[error("failed to build OSM API client for {base_url:?}: {source}")]
    BuildSource {
        base_url: String,
        #[source]
        source: SourceBuildError,
    },
    /// The request queue could not be started.
    #[error("failed to start the request queue: {0}")]
    StartQueue(#[source] QueueStartError),
}
