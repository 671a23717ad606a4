//! Settings shared by the `tags` and `changes` commands.

use std::time::Duration;

use camino::Utf8PathBuf;
use osmcoop_core::Dialect;
use osmcoop_data::{DEFAULT_THROTTLE, DEVELOPMENT_SERVER, OsmApiConfig, PRODUCTION_SERVER};

use crate::CliError;

/// Raw command options after configuration merging.
#[derive(Debug, Clone, Default)]
pub(crate) struct RunOptions {
    pub(crate) inputs: Vec<Utf8PathBuf>,
    pub(crate) out: Option<Utf8PathBuf>,
    pub(crate) josm: bool,
    pub(crate) osc: bool,
    pub(crate) dev: bool,
    pub(crate) api_url: Option<String>,
    pub(crate) throttle_ms: Option<u64>,
    pub(crate) rfc7464: bool,
}

/// Validated settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RunConfig {
    /// Change files, processed in order.
    pub(crate) inputs: Vec<Utf8PathBuf>,
    /// Output file; standard output when absent.
    pub(crate) out: Option<Utf8PathBuf>,
    /// Dialect forced for every input, if any.
    pub(crate) dialect: Option<Dialect>,
    /// API endpoint and throttle.
    pub(crate) api: OsmApiConfig,
    /// Prefix each record with the RFC 7464 record separator.
    pub(crate) rfc7464: bool,
}

impl RunOptions {
    /// Validate the options, naming `inputs_env` when no input was given.
    pub(crate) fn resolve(self, inputs_env: &'static str) -> Result<RunConfig, CliError> {
        if self.inputs.is_empty() {
            return Err(CliError::MissingInput { env: inputs_env });
        }
        let dialect = match (self.josm, self.osc) {
            (true, true) => return Err(CliError::ConflictingDialects),
            (true, false) => Some(Dialect::Josm),
            (false, true) => Some(Dialect::OsmChange),
            (false, false) => None,
        };
        let throttle = self
            .throttle_ms
            .map_or(DEFAULT_THROTTLE, Duration::from_millis);
        if throttle.is_zero() {
            return Err(CliError::ZeroThrottle);
        }
        let server = if self.dev {
            DEVELOPMENT_SERVER
        } else {
            PRODUCTION_SERVER
        };
        let base_url = self.api_url.unwrap_or_else(|| server.to_owned());

        Ok(RunConfig {
            inputs: self.inputs,
            out: self.out,
            dialect,
            api: OsmApiConfig::new(base_url).with_throttle(throttle),
            rfc7464: self.rfc7464,
        })
    }
}
