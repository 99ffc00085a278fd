use std::io;
use std::path::Path;
use std::process::{Command, ExitStatus};
use std::thread::{self, JoinHandle};

/// Shows a path in the platform file manager.
pub trait Revealer {
    /// Fire-and-forget; failures are ignored by callers.
    fn reveal(&self, path: &Path);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRevealer;

impl Revealer for SystemRevealer {
    fn reveal(&self, path: &Path) {
        match spawn_reaped(reveal_command(path)) {
            Ok(_) => tracing::debug!("Revealing {}", path.display()),
            Err(err) => tracing::debug!("Failed to reveal {}: {}", path.display(), err),
        }
    }
}

/// Start `command` and wait for it on a detached thread so the child never
/// lingers as a zombie.
fn spawn_reaped(mut command: Command) -> io::Result<JoinHandle<io::Result<ExitStatus>>> {
    let mut child = command.spawn()?;
    Ok(thread::spawn(move || child.wait()))
}

#[cfg(target_os = "windows")]
fn reveal_command(path: &Path) -> Command {
    let mut command = Command::new("explorer");
    if path.is_file() {
        command.arg(format!("/select,\"{}\"", path.display()));
    } else {
        command.arg(path);
    }
    command
}

#[cfg(target_os = "macos")]
fn reveal_command(path: &Path) -> Command {
    let mut command = Command::new("open");
    if path.is_file() {
        command.arg("-R");
    }
    command.arg(path);
    command
}

#[cfg(all(not(target_os = "windows"), not(target_os = "macos")))]
fn reveal_command(path: &Path) -> Command {
    // xdg-open cannot select a file, so open its folder instead.
    let folder = if path.is_file() {
        path.parent().unwrap_or(path)
    } else {
        path
    };
    let mut command = Command::new("xdg-open");
    command.arg(folder);
    command
}
