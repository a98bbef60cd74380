//! Application launching through the platform shell

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::AppLauncher;
use crate::error::CommandError;

/// Launches applications via `sh -c` (or `cmd /C` on Windows).
///
/// The child is detached; the launch only fails if the shell cannot be
/// spawned or the process exits unsuccessfully within the startup window.
#[derive(Debug, Clone)]
pub struct ShellLauncher {
    startup_window: Duration,
}

impl Default for ShellLauncher {
    fn default() -> Self {
        Self {
            startup_window: Duration::from_millis(300),
        }
    }
}

impl ShellLauncher {
    pub fn new(startup_window: Duration) -> Self {
        Self { startup_window }
    }
}

#[async_trait]
impl AppLauncher for ShellLauncher {
    async fn launch(&self, executable: &str) -> Result<(), CommandError> {
        let mut child = shell(executable)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    CommandError::ApplicationLaunch(format!("Application not found: {}", executable))
                }
                _ => CommandError::ApplicationLaunch(format!(
                    "Failed to launch application '{}': {}",
                    executable, e
                )),
            })?;

        tokio::time::sleep(self.startup_window).await;

        match child.try_wait() {
            Ok(Some(status)) if !status.success() => Err(CommandError::ApplicationLaunch(format!(
                "Application failed to start: {} ({})",
                executable, status
            ))),
            Ok(_) => {
                debug!("Launched '{}'", executable);
                Ok(())
            }
            Err(e) => Err(CommandError::ApplicationLaunch(format!(
                "Failed to check application status: {}",
                e
            ))),
        }
    }
}

#[cfg(target_os = "windows")]
fn shell(invocation: &str) -> Command {
    let mut command = Command::new("cmd");
    command.args(["/C", invocation]);
    command
}

#[cfg(not(target_os = "windows"))]
fn shell(invocation: &str) -> Command {
    let mut command = Command::new("sh");
    command.args(["-c", invocation]);
    command
}
