//! Task output destinations.

use std::io::{self, BufWriter, Write};

use camino::Utf8Path;

use crate::CliError;

/// Run `write` against the `--out` file, or standard output when unset, and
/// flush afterwards.
pub(crate) fn with_output<T>(
    out: Option<&Utf8Path>,
    write: impl FnOnce(&mut dyn Write) -> Result<T, CliError>,
) -> Result<T, CliError> {
    match out {
        Some(path) => {
            let file = osmcoop_fs::create_file(path).map_err(|source| CliError::CreateOutput {
                path: path.to_path_buf(),
                source,
            })?;
            let mut writer = BufWriter::new(file);
            let value = write(&mut writer)?;
            writer.flush().map_err(CliError::WriteOutput)?;
            Ok(value)
        }
        None => {
            let mut stdout = io::stdout().lock();
            let value = write(&mut stdout)?;
            stdout.flush().map_err(CliError::WriteOutput)?;
            Ok(value)
        }
    }
}
