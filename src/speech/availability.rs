//! Speech input availability checking.

use std::path::Path;
use std::process::Command;

fn on_path(binary: &str) -> bool {
    #[cfg(windows)]
    let finder = "where";
    #[cfg(not(windows))]
    let finder = "which";

    Command::new(finder)
        .arg(binary)
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Check availability and return detailed status
pub fn check_availability(model_path: &Path) -> (bool, String) {
    if !on_path("rec") {
        return (
            false,
            "sox not found. Install sox (provides the `rec` command)".to_string(),
        );
    }

    // whisper-cli is the binary name shipped by whisper-cpp
    if !on_path("whisper-cli") {
        return (
            false,
            "whisper-cli not found. Install whisper-cpp".to_string(),
        );
    }

    if !model_path.exists() {
        return (
            false,
            format!("Whisper model not found at {}", model_path.display()),
        );
    }

    (true, "Microphone input ready".to_string())
}
