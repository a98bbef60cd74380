//! Utility commands (screenshots)

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::{error, info, warn};

use super::{Command, CommandContext, contains_any};
use crate::config::ConfigManager;
use crate::error::CommandError;
use crate::platform::ScreenCapture;

const PATTERNS: &[&str] = &["ambil screenshot", "screenshot", "tangkap layar"];

const SCREENSHOT_GLOB: &str = "screenshot_*.png";

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// A screenshot file in the configured folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScreenshotInfo {
    pub filename: String,
    pub filepath: PathBuf,
    pub size_bytes: u64,
    pub modified: DateTime<Local>,
}

pub struct UtilityCommand {
    config: Arc<ConfigManager>,
    capture: Arc<dyn ScreenCapture>,
}

impl UtilityCommand {
    pub fn new(config: Arc<ConfigManager>, capture: Arc<dyn ScreenCapture>) -> Self {
        Self { config, capture }
    }

    fn screenshots_folder(&self) -> Result<PathBuf, CommandError> {
        Ok(PathBuf::from(self.config.settings()?.screenshots_folder))
    }

    async fn take_screenshot(&self) -> Result<String, CommandError> {
        let folder = self.screenshots_folder()?;
        tokio::fs::create_dir_all(&folder).await.map_err(|e| {
            CommandError::Execution(format!(
                "Failed to create screenshots folder {}: {}",
                folder.display(),
                e
            ))
        })?;

        let filename = format!("screenshot_{}.png", Local::now().format("%Y%m%d_%H%M%S"));
        let filepath = folder.join(filename);

        info!("Taking screenshot: {}", filepath.display());
        self.capture.capture(&filepath).await?;

        match tokio::fs::metadata(&filepath).await {
            Ok(metadata) => {
                info!(
                    "Screenshot saved: {} ({} bytes)",
                    filepath.display(),
                    metadata.len()
                );
                Ok(format!("Screenshot saved: {}", filepath.display()))
            }
            Err(_) => Err(CommandError::Execution(
                "Screenshot file was not created".to_string(),
            )),
        }
    }

    fn screenshot_paths(folder: &Path) -> Result<Vec<PathBuf>, CommandError> {
        let pattern = format!(
            "{}/{}",
            glob::Pattern::escape(&folder.to_string_lossy()),
            SCREENSHOT_GLOB
        );
        let paths = glob::glob(&pattern)
            .map_err(|e| CommandError::Execution(format!("Invalid screenshot pattern: {}", e)))?;

        Ok(paths
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!("Skipping unreadable screenshot entry: {}", e);
                    None
                }
            })
            .collect())
    }

    /// Screenshots in the configured folder, newest first
    pub fn list_screenshots(&self, limit: Option<usize>) -> Result<Vec<ScreenshotInfo>, CommandError> {
        let folder = self.screenshots_folder()?;
        if !folder.exists() {
            return Ok(Vec::new());
        }

        let mut screenshots = Vec::new();
        for path in Self::screenshot_paths(&folder)? {
            let metadata = std::fs::metadata(&path).map_err(|e| {
                CommandError::Execution(format!("Failed to list screenshots: {}", e))
            })?;
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            screenshots.push(ScreenshotInfo {
                filename: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                size_bytes: metadata.len(),
                modified: DateTime::<Local>::from(modified),
                filepath: path,
            });
        }

        screenshots.sort_by(|a, b| b.modified.cmp(&a.modified));
        if let Some(limit) = limit {
            screenshots.truncate(limit);
        }
        Ok(screenshots)
    }

    /// Delete one screenshot by file name
    pub fn delete_screenshot(&self, filename: &str) -> Result<String, CommandError> {
        // Only bare file names inside the screenshots folder
        if Path::new(filename).file_name() != Some(OsStr::new(filename)) {
            return Err(CommandError::Execution(format!(
                "Invalid screenshot name: {}",
                filename
            )));
        }

        let filepath = self.screenshots_folder()?.join(filename);
        if !filepath.exists() {
            return Err(CommandError::Execution(format!(
                "Screenshot not found: {}",
                filename
            )));
        }

        std::fs::remove_file(&filepath)
            .map_err(|e| CommandError::Execution(format!("Failed to delete screenshot: {}", e)))?;
        info!("Deleted screenshot: {}", filepath.display());
        Ok(format!("Deleted screenshot: {}", filename))
    }

    /// Delete screenshots last modified more than `days_old` days ago
    pub fn cleanup_old_screenshots(&self, days_old: u64) -> Result<String, CommandError> {
        let folder = self.screenshots_folder()?;
        if !folder.exists() {
            return Ok("No screenshots folder found".to_string());
        }

        let cutoff = SystemTime::now()
            .checked_sub(Duration::from_secs(days_old.saturating_mul(SECONDS_PER_DAY)))
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let mut deleted = 0;
        for path in Self::screenshot_paths(&folder)? {
            let modified = std::fs::metadata(&path).and_then(|m| m.modified());
            match modified {
                Ok(modified) if modified < cutoff => match std::fs::remove_file(&path) {
                    Ok(()) => deleted += 1,
                    Err(e) => warn!("Failed to delete {}: {}", path.display(), e),
                },
                Ok(_) => {}
                Err(e) => warn!("Failed to read {}: {}", path.display(), e),
            }
        }

        info!(
            "Deleted {} screenshots older than {} days",
            deleted, days_old
        );
        Ok(format!("Deleted {} old screenshots", deleted))
    }
}

#[async_trait]
impl Command for UtilityCommand {
    fn name(&self) -> &str {
        "UtilityCommand"
    }

    fn patterns(&self) -> Vec<String> {
        PATTERNS.iter().map(|p| p.to_string()).collect()
    }

    fn description(&self) -> &str {
        "Utility commands: take screenshots"
    }

    fn can_handle(&self, command: &str) -> bool {
        contains_any(command, PATTERNS)
    }

    async fn execute(
        &self,
        command: &str,
        _context: Option<&CommandContext>,
    ) -> Result<String, CommandError> {
        if !contains_any(command, PATTERNS) {
            return Err(CommandError::Execution(format!(
                "Unknown utility command: {}",
                command
            )));
        }

        self.take_screenshot().await.map_err(|e| {
            error!("Error executing utility command '{}': {}", command, e);
            CommandError::Execution(format!("Failed to take screenshot: {}", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::TempDir;

    struct FakeCapture {
        write_file: bool,
    }

    #[async_trait]
    impl ScreenCapture for FakeCapture {
        async fn capture(&self, path: &Path) -> Result<(), CommandError> {
            if self.write_file {
                std::fs::write(path, b"\x89PNG").unwrap();
            }
            Ok(())
        }
    }

    fn handler(temp: &TempDir, write_file: bool) -> UtilityCommand {
        let mut config = Config::with_defaults();
        config.settings.screenshots_folder = temp
            .path()
            .join("shots")
            .to_string_lossy()
            .into_owned();
        let manager = Arc::new(ConfigManager::from_config(
            temp.path().join("devices.toml"),
            config,
        ));
        UtilityCommand::new(manager, Arc::new(FakeCapture { write_file }))
    }

    #[tokio::test]
    async fn test_take_screenshot() {
        let temp = TempDir::new().unwrap();
        let command = handler(&temp, true);

        assert!(command.can_handle("tangkap layar"));
        let result = command.execute("ambil screenshot", None).await.unwrap();
        assert!(result.starts_with("Screenshot saved: "));
        assert!(result.ends_with(".png"));

        let shots = command.list_screenshots(None).unwrap();
        assert_eq!(shots.len(), 1);
        assert!(shots[0].filename.starts_with("screenshot_"));
        assert_eq!(shots[0].size_bytes, 4);
    }

    #[tokio::test]
    async fn test_missing_file_is_failure() {
        let temp = TempDir::new().unwrap();
        let command = handler(&temp, false);

        let err = command.execute("screenshot", None).await.unwrap_err();
        assert!(err.to_string().contains("was not created"));
    }

    #[test]
    fn test_list_limit_and_delete() {
        let temp = TempDir::new().unwrap();
        let command = handler(&temp, true);
        assert!(command.list_screenshots(None).unwrap().is_empty());

        let folder = temp.path().join("shots");
        std::fs::create_dir_all(&folder).unwrap();
        for name in ["screenshot_1.png", "screenshot_2.png", "notes.txt"] {
            std::fs::write(folder.join(name), b"x").unwrap();
        }

        assert_eq!(command.list_screenshots(None).unwrap().len(), 2);
        assert_eq!(command.list_screenshots(Some(1)).unwrap().len(), 1);

        assert_eq!(
            command.delete_screenshot("screenshot_1.png").unwrap(),
            "Deleted screenshot: screenshot_1.png"
        );
        assert!(command.delete_screenshot("screenshot_1.png").is_err());
        assert!(command.delete_screenshot("../devices.toml").is_err());
    }

    #[test]
    fn test_cleanup_keeps_recent_files() {
        let temp = TempDir::new().unwrap();
        let command = handler(&temp, true);
        assert_eq!(
            command.cleanup_old_screenshots(30).unwrap(),
            "No screenshots folder found"
        );

        let folder = temp.path().join("shots");
        std::fs::create_dir_all(&folder).unwrap();
        std::fs::write(folder.join("screenshot_new.png"), b"x").unwrap();

        assert_eq!(
            command.cleanup_old_screenshots(30).unwrap(),
            "Deleted 0 old screenshots"
        );
        assert_eq!(command.list_screenshots(None).unwrap().len(), 1);
    }

    #[test]
    fn test_cleanup_with_huge_age_keeps_everything() {
        let temp = TempDir::new().unwrap();
        let command = handler(&temp, true);
        let folder = temp.path().join("shots");
        std::fs::create_dir_all(&folder).unwrap();
        std::fs::write(folder.join("screenshot_old.png"), b"x").unwrap();

        assert_eq!(
            command.cleanup_old_screenshots(u64::MAX).unwrap(),
            "Deleted 0 old screenshots"
        );
        assert_eq!(command.list_screenshots(None).unwrap().len(), 1);
    }
}
