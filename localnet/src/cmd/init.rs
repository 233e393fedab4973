//! `localnet init`: write the default configuration template.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::Path;

use localnet::Error;
use localnet::config::generate_default_config;

/// Writes the template to `output`. An existing file is only replaced when
/// `force` is set.
///
/// # Errors
///
/// Returns a config error if the file exists without `--force` or cannot be
/// written.
#[allow(clippy::print_stderr)]
pub fn run(output: &Path, force: bool) -> Result<(), Error> {
    let mut options = OpenOptions::new();
    options.write(true);
    if force {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }

    let mut file = options.open(output).map_err(|e| {
        if e.kind() == ErrorKind::AlreadyExists {
            Error::config(format!(
                "'{}' already exists, use --force to overwrite",
                output.display()
            ))
        } else {
            Error::config_with(format!("failed to create '{}'", output.display()), e)
        }
    })?;
    file.write_all(generate_default_config().as_bytes())
        .map_err(|e| Error::config_with(format!("failed to write '{}'", output.display()), e))?;

    eprintln!("Wrote default localnet config to {}", output.display());
    Ok(())
}
