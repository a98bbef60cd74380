//! Configuration file I/O operations

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;

use super::Config;
use crate::error::ConfigError;

/// On-disk representation, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// `.json` files are JSON, everything else is TOML
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ConfigFormat::Json,
            _ => ConfigFormat::Toml,
        }
    }
}

impl Config {
    /// Parse configuration content in the given format.
    ///
    /// Shortcut keys are normalized and the result is validated.
    pub fn parse(content: &str, format: ConfigFormat, path: &Path) -> Result<Self, ConfigError> {
        let parse_error = |message: String| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        };

        let mut config: Config = match format {
            ConfigFormat::Toml => toml::from_str(content).map_err(|e| parse_error(e.to_string()))?,
            ConfigFormat::Json => {
                serde_json::from_str(content).map_err(|e| parse_error(e.to_string()))?
            }
        };

        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&content, ConfigFormat::from_path(path), path)
    }

    /// Serialize to the given format
    pub fn render(&self, format: ConfigFormat) -> Result<String, String> {
        match format {
            ConfigFormat::Toml => toml::to_string_pretty(self).map_err(|e| e.to_string()),
            ConfigFormat::Json => serde_json::to_string_pretty(self).map_err(|e| e.to_string()),
        }
    }

    /// Save configuration to a file with atomic write and file locking.
    ///
    /// An exclusive lock on a sibling `.lock` file serializes writers across
    /// processes; content goes to a temp file that is renamed over the target.
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let write_error = |message: String| ConfigError::Write {
            path: path.to_path_buf(),
            message,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                write_error(format!(
                    "failed to create config directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let content = self
            .render(ConfigFormat::from_path(path))
            .map_err(|e| write_error(format!("failed to serialize config: {}", e)))?;

        let lock_path = sibling_path(path, "lock");
        let lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&lock_path)
            .map_err(|e| {
                write_error(format!(
                    "failed to create lock file {}: {}",
                    lock_path.display(),
                    e
                ))
            })?;

        // Blocks until other writers are done
        lock_file
            .lock_exclusive()
            .map_err(|e| write_error(format!("failed to acquire config lock: {}", e)))?;

        let temp_path = sibling_path(path, "tmp");
        let mut temp_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(|e| {
                write_error(format!(
                    "failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

        temp_file
            .write_all(content.as_bytes())
            .map_err(|e| write_error(format!("failed to write config content: {}", e)))?;

        temp_file
            .sync_all()
            .map_err(|e| write_error(format!("failed to sync config file: {}", e)))?;

        std::fs::rename(&temp_path, path)
            .map_err(|e| write_error(format!("failed to rename temp file: {}", e)))?;

        // Lock is released when lock_file is dropped
        Ok(())
    }
}

/// `devices.toml` -> `devices.toml.lock`
fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}
