use std::ffi::OsString;
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::{info, warn};

use crate::domain::AppError;

// explorer exits with 1 even when it opened the target.
const CHECKS_EXIT_STATUS: bool = !cfg!(target_os = "windows");

/// Host integration for showing downloaded files.
pub trait Shell: Send + Sync {
    fn open_file(&self, path: &Path) -> Result<(), AppError>;
    fn open_folder(&self, path: &Path) -> Result<(), AppError>;
}

/// Opens things with the platform's default handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemShell;

impl Shell for SystemShell {
    fn open_file(&self, path: &Path) -> Result<(), AppError> {
        launch(path)
    }

    fn open_folder(&self, path: &Path) -> Result<(), AppError> {
        launch(path)
    }
}

fn launch(target: &Path) -> Result<(), AppError> {
    let (program, args) = open_command(target);
    info!(program, target = %target.display(), "Opening with system handler");

    let status = Command::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|e| {
            warn!(program, error = %e, "Failed to launch system handler");
            AppError::Shell(format!("{}: {}", target.display(), e))
        })?;

    if CHECKS_EXIT_STATUS && !status.success() {
        warn!(program, %status, "System handler reported failure");
        return Err(AppError::Shell(format!(
            "{}: {} exited with {}",
            target.display(),
            program,
            status
        )));
    }
    Ok(())
}

// The path goes to the handler as one argument, never through a shell.
#[cfg(target_os = "windows")]
fn open_command(target: &Path) -> (&'static str, Vec<OsString>) {
    ("explorer", vec![target.into()])
}

#[cfg(target_os = "macos")]
fn open_command(target: &Path) -> (&'static str, Vec<OsString>) {
    ("open", vec![target.into()])
}

#[cfg(all(unix, not(target_os = "macos")))]
fn open_command(target: &Path) -> (&'static str, Vec<OsString>) {
    ("xdg-open", vec![target.into()])
}
