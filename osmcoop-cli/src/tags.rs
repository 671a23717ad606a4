//! `tags` command: one tag-fix task per edited element.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use log::{info, warn};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use osmcoop_core::{
    ElementSource, FetchCache, operations_for, parse_changes_as, resolve_geometry, tag_fix_task,
    write_record,
};
use serde::{Deserialize, Serialize};

use crate::config::{RunConfig, RunOptions};
use crate::input::InputDocument;
use crate::output::with_output;
use crate::session::Session;
use crate::{ARG_API_URL, ARG_OUT, ARG_THROTTLE_MS, CliError, ENV_TAGS_INPUTS};

/// CLI arguments for the `tags` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "tags",
    long_about = "Generate one task per edited element, expressed as tag \
                 operations against the element's prior version. Only \
                 modifications of existing elements that leave geometry \
                 untouched qualify; use --skip to drop the rest.",
    about = "Generate tag-fix tasks"
)]
#[ortho_config(prefix = "OSMCOOP")]
pub(crate) struct TagsArgs {
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
    /// Skip elements that cannot be expressed as tag fixes.
    #[arg(long)]
    #[serde(default)]
    pub(crate) skip: bool,
}

impl TagsArgs {
    fn into_config(self) -> Result<TagsConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        TagsConfig::try_from(merged)
    }
}

/// Resolved `tags` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TagsConfig {
    pub(crate) run: RunConfig,
    pub(crate) skip: bool,
}

impl TryFrom<TagsArgs> for TagsConfig {
    type Error = CliError;

    fn try_from(args: TagsArgs) -> Result<Self, Self::Error> {
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
        .resolve(ENV_TAGS_INPUTS)?;
        Ok(Self {
            run,
            skip: args.skip,
        })
    }
}

pub(super) fn run_tags(args: TagsArgs) -> Result<(), CliError> {
    let config = args.into_config()?;
    let session = Session::connect(&config.run.api)?;
    let outcome = with_output(config.run.out.as_deref(), |writer| {
        run_tags_with(&config, &session, writer)
    });
    session.close();
    outcome
}

pub(super) fn run_tags_with<S: ElementSource + 'static>(
    config: &TagsConfig,
    session: &Session<S>,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    session.block_on(async {
        for path in &config.run.inputs {
            let document = InputDocument::load(path, config.run.dialect)?;
            let written = write_tag_tasks(
                &document,
                config.skip,
                config.run.rfc7464,
                session.cache(),
                &mut *writer,
            )
            .await?;
            info!("{path}: wrote {written} tag-fix tasks");
        }
        Ok::<(), CliError>(())
    })
}

/// Write one tag-fix task per change in `document`, returning how many were
/// written.
///
/// Changes that are not pure tag edits abort the run unless `skip` is set,
/// in which case they are logged and dropped. Geometry failures always
/// abort.
pub(super) async fn write_tag_tasks<S: ElementSource + 'static>(
    document: &InputDocument,
    skip: bool,
    rfc7464: bool,
    cache: &FetchCache<S>,
    writer: &mut dyn Write,
) -> Result<usize, CliError> {
    let parsed = parse_changes_as(&document.contents, document.dialect)
        .map_err(|source| document.document_error(source))?;
    let mut written = 0;
    for change in parsed.all_changes() {
        let operations = match operations_for(change, cache).await {
            Ok(operations) => operations,
            Err(err) if skip => {
                warn!("{}: skipping {}: {err}", document.path, change.id_string());
                continue;
            }
            Err(source) => {
                return Err(CliError::Diff {
                    path: document.path.clone(),
                    source,
                });
            }
        };
        let geometry = resolve_geometry(change, &parsed.element_maps, cache)
            .await
            .map_err(|source| CliError::Geometry {
                path: document.path.clone(),
                source,
            })?;
        tag_fix_task(change, &geometry, &operations)
            .and_then(|record| write_record(writer, &record, rfc7464))
            .map_err(|source| CliError::Record {
                path: document.path.clone(),
                source,
            })?;
        written += 1;
    }
    Ok(written)
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<TagsConfig, CliError> {
    let merged = TagsArgs::merge_from_layers(layers).map_err(CliError::from)?;
    TagsConfig::try_from(merged)
}
