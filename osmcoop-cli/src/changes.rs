//! `changes` command: tasks that carry an OSMChange file.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use futures_util::future::try_join_all;
use log::{debug, info};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use osmcoop_core::{
    Dialect, ElementSource, FetchCache, change_file_task, explode_as, feature_for, josm_to_osc,
    parse_changes_as, resolve_geometry, write_record,
};
use serde::{Deserialize, Serialize};

use crate::config::{RunConfig, RunOptions};
use crate::input::InputDocument;
use crate::output::with_output;
use crate::session::Session;
use crate::{ARG_API_URL, ARG_OUT, ARG_THROTTLE_MS, CliError, ENV_CHANGES_INPUTS};

/// CLI arguments for the `changes` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "changes",
    long_about = "Generate tasks that attach an OSMChange file. Each top-level \
                 edit becomes its own task together with the elements it \
                 depends on, unless --bijective keeps each input file whole.",
    about = "Generate change-file tasks"
)]
#[ortho_config(prefix = "OSMCOOP")]
pub(crate) struct ChangesArgs {
    /// JOSM or OSMChange files to process.
    #[arg(value_name = "file")]
    #[serde(default)]
    pub(crate) inputs: Vec<Utf8PathBuf>,
    /// Write tasks to this file instead of standard output.
    #[arg(long = ARG_OUT, value_name = "path")]
    #[serde(default)]
    pub(crate) out: Option<Utf8PathBuf>,
    /// Treat every input as a JOSM change file.
    #[arg(long, conflicts_with = "osc")]
    #[serde(default)]
    pub(crate) josm: bool,
    /// Treat every input as an OSMChange file.
    #[arg(long)]
    #[serde(default)]
    pub(crate) osc: bool,
    /// Use the development OSM API server.
    #[arg(long)]
    #[serde(default)]
    pub(crate) dev: bool,
    /// Override the OSM API base URL.
    #[arg(long = ARG_API_URL, value_name = "url")]
    #[serde(default)]
    pub(crate) api_url: Option<String>,
    /// Minimum milliseconds between API requests.
    #[arg(long = ARG_THROTTLE_MS, value_name = "ms")]
    #[serde(default)]
    pub(crate) throttle_ms: Option<u64>,
    /// Prefix each task with an RFC 7464 record separator.
    #[arg(long)]
    #[serde(default)]
    pub(crate) rfc7464: bool,
    /// Create one task per input file instead of one per top-level edit.
    #[arg(long)]
    #[serde(default)]
    pub(crate) bijective: bool,
}

impl ChangesArgs {
    fn into_config(self) -> Result<ChangesConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ChangesConfig::try_from(merged)
    }
}

/// Resolved `changes` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ChangesConfig {
    pub(crate) run: RunConfig,
    pub(crate) bijective: bool,
}

impl TryFrom<ChangesArgs> for ChangesConfig {
    type Error = CliError;

    fn try_from(args: ChangesArgs) -> Result<Self, Self::Error> {
        let run = RunOptions {
            inputs: args.inputs,
            out: args.out,
            josm: args.josm,
            osc: args.osc,
            dev: args.dev,
            api_url: args.api_url,
            throttle_ms: args.throttle_ms,
            rfc7464: args.rfc7464,
        }
        .resolve(ENV_CHANGES_INPUTS)?;
        Ok(Self {
            run,
            bijective: args.bijective,
        })
    }
}

pub(super) fn run_changes(args: ChangesArgs) -> Result<(), CliError> {
    let config = args.into_config()?;
    let session = Session::connect(&config.run.api)?;
    let outcome = with_output(config.run.out.as_deref(), |writer| {
        run_changes_with(&config, &session, writer)
    });
    session.close();
    outcome
}

pub(super) fn run_changes_with<S: ElementSource + 'static>(
    config: &ChangesConfig,
    session: &Session<S>,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    session.block_on(async {
        for path in &config.run.inputs {
            let document = InputDocument::load(path, config.run.dialect)?;
            let written = write_change_tasks(
                &document,
                config.bijective,
                config.run.rfc7464,
                session.cache(),
                &mut *writer,
            )
            .await?;
            info!("{path}: wrote {written} change-file tasks");
        }
        Ok::<(), CliError>(())
    })
}

/// Write change-file tasks for `document`, returning how many were written.
///
/// Without `bijective` the document is exploded so that each top-level edit
/// and its supporting elements form one task. Every task lists a feature per
/// top-level change and carries the part in OSMChange form.
pub(super) async fn write_change_tasks<S: ElementSource + 'static>(
    document: &InputDocument,
    bijective: bool,
    rfc7464: bool,
    cache: &FetchCache<S>,
    writer: &mut dyn Write,
) -> Result<usize, CliError> {
    let parts = if bijective {
        vec![document.contents.clone()]
    } else {
        explode_as(&document.contents, document.dialect, true)
            .map_err(|source| document.document_error(source))?
    };
    debug!("{}: {} task documents", document.path, parts.len());

    for part in &parts {
        let parsed = parse_changes_as(part, document.dialect)
            .map_err(|source| document.document_error(source))?;
        let maps = &parsed.element_maps;
        let features = try_join_all(parsed.top_level.iter().map(|change| async move {
            resolve_geometry(change, maps, cache)
                .await
                .map(|geometry| feature_for(change, &geometry))
        }))
        .await
        .map_err(|source| CliError::Geometry {
            path: document.path.clone(),
            source,
        })?;

        let content = match document.dialect {
            Dialect::Josm => josm_to_osc(part).map_err(|source| document.document_error(source))?,
            Dialect::OsmChange => part.clone(),
        };
        change_file_task(features, &content)
            .and_then(|record| write_record(writer, &record, rfc7464))
            .map_err(|source| CliError::Record {
                path: document.path.clone(),
                source,
            })?;
    }
    Ok(parts.len())
}
