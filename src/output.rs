//! Destinations for generated manifests other than stdout.

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    process::{Child, Command, Stdio},
};

use color_eyre::{
    Help,
    eyre::{WrapErr, eyre},
};

use crate::k8s::name::ResourceName;

/// Clipboard programs tried in order, with their arguments.
const CLIPBOARD_COMMANDS: [(&str, &[&str]); 3] = [
    ("wl-copy", &[]),
    ("xclip", &["-selection", "clipboard"]),
    ("pbcopy", &[]),
];

/// File name used when no file name for the manifest is given.
pub fn default_file_name(name: &ResourceName) -> PathBuf {
    format!("{name}-manifest.yaml").into()
}

/// Write `contents` to the file at `path`.
///
/// # Errors
///
/// Returns an error if the file already exists and `overwrite` is `false`, or if it could not be
/// written.
pub fn write_file(path: &Path, contents: &str, overwrite: bool) -> color_eyre::Result<()> {
    let mut file = open_file(path, overwrite)?;
    let shown = path.display();
    file.write_all(contents.as_bytes())
        .wrap_err_with(|| format!("Failed to write to file: {shown}"))?;
    tracing::info!(path = %shown, "wrote manifest");
    Ok(())
}

fn open_file(path: &Path, overwrite: bool) -> color_eyre::Result<fs::File> {
    fs::File::options()
        .write(true)
        .truncate(true)
        .create_new(!overwrite)
        .create(overwrite)
        .open(path)
        .map_err(|error| {
            let path = path.display();
            match error.kind() {
                io::ErrorKind::AlreadyExists => {
                    eyre!("File already exists, not overwriting it: {path}")
                        .suggestion("Use `--overwrite` if you wish to overwrite the existing file.")
                }
                _ => color_eyre::Report::new(error)
                    .wrap_err(format!("Failed to create/open file: {path}"))
                    .suggestion(
                        "Make sure the directory exists \
                            and you have write permissions for the file",
                    ),
            }
        })
}

/// Copy `contents` to the system clipboard with the first available clipboard program.
///
/// Returns the name of the program used.
///
/// # Errors
///
/// Returns an error if no clipboard program could be run or the one found failed.
pub fn copy_to_clipboard(contents: &str) -> color_eyre::Result<&'static str> {
    for (program, args) in CLIPBOARD_COMMANDS {
        let mut child = match Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => child,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(program, "clipboard program not found");
                continue;
            }
            Err(error) => return Err(error).wrap_err_with(|| format!("error running `{program}`")),
        };

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(error) = stdin.write_all(contents.as_bytes()) {
                drop(stdin);
                reap(&mut child, program);
                return Err(error).wrap_err_with(|| format!("error writing to `{program}`"));
            }
        }

        let status = child
            .wait()
            .wrap_err_with(|| format!("error waiting for `{program}`"))?;
        if status.success() {
            return Ok(program);
        }
        return Err(eyre!("`{program}` failed: {status}"));
    }

    Err(eyre!("no clipboard program found")
        .suggestion("Install `wl-copy`, `xclip`, or `pbcopy`, or save the manifest to a file."))
}

/// Stop a clipboard program which did not receive its input.
fn reap(child: &mut Child, program: &str) {
    if let Err(error) = child.kill() {
        tracing::debug!(program, %error, "error killing clipboard program");
    }
    if let Err(error) = child.wait() {
        tracing::debug!(program, %error, "error waiting for clipboard program");
    }
}
