//! Shutdown and process termination

use std::ffi::OsStr;
use std::process::Stdio;

use async_trait::async_trait;
use sysinfo::{Signal, System};
use tokio::process::Command;
use tracing::{debug, info};

use super::PowerControl;
use crate::error::CommandError;

/// Processes that must survive "close all applications"
const PROTECTED_PROCESSES: &[&str] = &[
    // Windows
    "system",
    "registry",
    "csrss.exe",
    "winlogon.exe",
    "services.exe",
    "lsass.exe",
    "svchost.exe",
    "dwm.exe",
    "explorer.exe",
    // macOS
    "launchd",
    "kernel_task",
    "loginwindow",
    "windowserver",
    "finder",
    "dock",
    // Linux
    "init",
    "systemd",
    "sshd",
    "xorg",
    "xwayland",
    "gnome-shell",
    "kwin_x11",
    "kwin_wayland",
    "plasmashell",
    "pipewire",
    "pulseaudio",
];

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPower;

#[async_trait]
impl PowerControl for SystemPower {
    async fn shutdown(&self) -> Result<(), CommandError> {
        info!("Initiating computer shutdown");
        let status = shutdown_command()
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|e| CommandError::SystemCommand(format!("Failed to shutdown computer: {}", e)))?;

        if !status.success() {
            return Err(CommandError::SystemCommand(format!(
                "Failed to shutdown computer: shutdown exited with {}",
                status
            )));
        }
        Ok(())
    }

    async fn close_user_applications(&self) -> Result<usize, CommandError> {
        tokio::task::spawn_blocking(terminate_user_processes)
            .await
            .map_err(|e| CommandError::SystemCommand(format!("Failed to close applications: {}", e)))
    }
}

#[cfg(target_os = "windows")]
fn shutdown_command() -> Command {
    let mut command = Command::new("shutdown");
    command.args(["/s", "/t", "0"]);
    command
}

#[cfg(not(target_os = "windows"))]
fn shutdown_command() -> Command {
    let mut command = Command::new("shutdown");
    command.args(["-h", "now"]);
    command
}

/// Send a terminate signal to every process owned by the current user,
/// except protected ones, this process, and its parent.
fn terminate_user_processes() -> usize {
    let system = System::new_all();
    let current_pid = sysinfo::get_current_pid().ok();
    let current = current_pid.and_then(|pid| system.process(pid));
    let current_user = current.and_then(|p| p.user_id().cloned());
    let parent_pid = current.and_then(|p| p.parent());

    let mut closed = 0;
    for (pid, process) in system.processes() {
        if Some(*pid) == current_pid || Some(*pid) == parent_pid {
            continue;
        }
        if is_protected(&OsStr::new(process.name()).to_string_lossy()) {
            continue;
        }
        if current_user.is_some() && process.user_id() != current_user.as_ref() {
            continue;
        }

        let signalled = process
            .kill_with(Signal::Term)
            .unwrap_or_else(|| process.kill());
        if signalled {
            closed += 1;
        }
    }

    debug!("Signalled {} processes to terminate", closed);
    closed
}

fn is_protected(name: &str) -> bool {
    let name = name.to_lowercase();
    PROTECTED_PROCESSES.contains(&name.as_str())
}
