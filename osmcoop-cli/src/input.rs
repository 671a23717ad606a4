//! Loading change files and deciding their dialect.

use camino::{Utf8Path, Utf8PathBuf};
use osmcoop_core::Dialect;
use osmcoop_core::xml::parse_change_document;

use crate::CliError;

/// A change file read into memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct InputDocument {
    pub(crate) path: Utf8PathBuf,
    pub(crate) dialect: Dialect,
    pub(crate) contents: String,
}

impl InputDocument {
    /// Read `path`, honouring a forced dialect.
    pub(crate) fn load(path: &Utf8Path, forced: Option<Dialect>) -> Result<Self, CliError> {
        let contents =
            osmcoop_fs::read_to_string(path).map_err(|source| CliError::ReadInput {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_contents(path, contents, forced)
    }

    /// Decide the dialect: the forced one, then a `.osc` extension, then the
    /// document's root element.
    pub(crate) fn from_contents(
        path: &Utf8Path,
        contents: String,
        forced: Option<Dialect>,
    ) -> Result<Self, CliError> {
        let dialect = match forced.or_else(|| dialect_from_extension(path)) {
            Some(dialect) => dialect,
            None => {
                let (dialect, _) = parse_change_document(&contents).map_err(|source| {
                    CliError::Document {
                        path: path.to_path_buf(),
                        source,
                    }
                })?;
                dialect
            }
        };
        Ok(Self {
            path: path.to_path_buf(),
            dialect,
            contents,
        })
    }

    pub(crate) fn document_error(&self, source: osmcoop_core::DocumentError) -> CliError {
        CliError::Document {
            path: self.path.clone(),
            source,
        }
    }
}

fn dialect_from_extension(path: &Utf8Path) -> Option<Dialect> {
    path.extension()
        .filter(|extension| extension.eq_ignore_ascii_case("osc"))
        .map(|_| Dialect::OsmChange)
}
