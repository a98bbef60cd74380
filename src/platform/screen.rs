//! Screen capture through platform screenshot tools

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::ScreenCapture;
use crate::error::CommandError;

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemScreenCapture;

#[async_trait]
impl ScreenCapture for SystemScreenCapture {
    async fn capture(&self, path: &Path) -> Result<(), CommandError> {
        let target = path.to_string_lossy().to_string();
        let mut last_error = String::from("no screenshot tool available");

        for (program, args) in capture_candidates(&target) {
            let result = Command::new(program)
                .args(&args)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::piped())
                .output()
                .await;

            match result {
                Ok(output) if output.status.success() => {
                    debug!("Captured screen with {}", program);
                    return Ok(());
                }
                Ok(output) => {
                    last_error = format!(
                        "{} failed: {}",
                        program,
                        String::from_utf8_lossy(&output.stderr).trim()
                    );
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    // Try the next tool
                }
                Err(e) => last_error = format!("{} failed: {}", program, e),
            }
        }

        Err(CommandError::Execution(format!(
            "Failed to take screenshot: {}",
            last_error
        )))
    }
}

#[cfg(target_os = "macos")]
fn capture_candidates(target: &str) -> Vec<(&'static str, Vec<String>)> {
    vec![("screencapture", vec!["-x".to_string(), target.to_string()])]
}

#[cfg(target_os = "windows")]
fn capture_candidates(target: &str) -> Vec<(&'static str, Vec<String>)> {
    let script = format!(
        "Add-Type -AssemblyName System.Windows.Forms,System.Drawing; \
         $b = [System.Windows.Forms.SystemInformation]::VirtualScreen; \
         $bmp = New-Object System.Drawing.Bitmap $b.Width, $b.Height; \
         $g = [System.Drawing.Graphics]::FromImage($bmp); \
         $g.CopyFromScreen($b.Left, $b.Top, 0, 0, $bmp.Size); \
         $bmp.Save('{}', [System.Drawing.Imaging.ImageFormat]::Png)",
        target.replace('\'', "''")
    );
    vec![(
        "powershell",
        vec!["-NoProfile".to_string(), "-Command".to_string(), script],
    )]
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn capture_candidates(target: &str) -> Vec<(&'static str, Vec<String>)> {
    vec![
        ("gnome-screenshot", vec!["-f".to_string(), target.to_string()]),
        ("grim", vec![target.to_string()]),
        ("scrot", vec!["-o".to_string(), target.to_string()]),
        (
            "import",
            vec!["-window".to_string(), "root".to_string(), target.to_string()],
        ),
    ]
}
