//! Default browser integration

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use super::Browser;
use crate::error::CommandError;

/// Opens URLs with the platform's URL handler
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowser;

#[async_trait]
impl Browser for SystemBrowser {
    async fn open(&self, url: &str) -> Result<(), CommandError> {
        let status = opener(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| CommandError::Execution(format!("Failed to open browser: {}", e)))?;

        if !status.success() {
            return Err(CommandError::Execution(format!(
                "Browser exited with {} while opening {}",
                status, url
            )));
        }
        Ok(())
    }
}

#[cfg(target_os = "macos")]
fn opener(url: &str) -> Command {
    let mut command = Command::new("open");
    command.arg(url);
    command
}

#[cfg(target_os = "windows")]
fn opener(url: &str) -> Command {
    // The empty argument is the window title `start` expects before the target
    let mut command = Command::new("cmd");
    command.args(["/C", "start", "", url]);
    command
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn opener(url: &str) -> Command {
    let mut command = Command::new("xdg-open");
    command.arg(url);
    command
}
