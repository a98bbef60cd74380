//! Logging setup and log file maintenance
//!
//! [`LoggingService`] installs the process subscriber once: a console layer,
//! a daily-rotated file layer, and an `EnvFilter` behind a reload handle so
//! the level can change while the assistant runs. `RUST_LOG` overrides the
//! configured level at startup.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{self, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, fmt, reload};

use crate::config::{ConfigManager, LogLevel, Settings};
use crate::error::LoggingError;

/// Default log directory, relative to the working directory
pub const DEFAULT_LOG_DIR: &str = "logs";

const LOG_FILE_PREFIX: &str = "vassist";
const LOG_FILE_SUFFIX: &str = "log";
const MAX_LOG_FILES: usize = 7;
const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// One log file on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogFileInfo {
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified: DateTime<Local>,
}

/// The directory the file layer writes to
#[derive(Debug, Clone)]
pub struct LogDirectory {
    dir: PathBuf,
}

impl LogDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    fn paths(&self) -> Result<Vec<PathBuf>, LoggingError> {
        let pattern = format!(
            "{}/{}*.{}*",
            glob::Pattern::escape(&self.dir.to_string_lossy()),
            LOG_FILE_PREFIX,
            LOG_FILE_SUFFIX
        );
        let paths = glob::glob(&pattern).map_err(|e| LoggingError::Init(e.to_string()))?;
        Ok(paths.filter_map(Result::ok).collect())
    }

    /// Log files, newest first
    pub fn log_files(&self) -> Result<Vec<LogFileInfo>, LoggingError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for path in self.paths()? {
            let metadata = std::fs::metadata(&path)?;
            files.push(LogFileInfo {
                name: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                size_bytes: metadata.len(),
                modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH).into(),
                path,
            });
        }
        // Same-second writes fall back to the dated file name
        files.sort_by(|a, b| b.modified.cmp(&a.modified).then(b.name.cmp(&a.name)));
        Ok(files)
    }

    /// Last `lines` lines of the newest log file
    pub fn tail(&self, lines: usize) -> Result<Vec<String>, LoggingError> {
        let Some(newest) = self.log_files()?.into_iter().next() else {
            return Ok(Vec::new());
        };

        let content = std::fs::read_to_string(&newest.path)?;
        let all: Vec<&str> = content.lines().collect();
        let start = all.len().saturating_sub(lines);
        Ok(all[start..].iter().map(|line| line.to_string()).collect())
    }

    /// Delete log files last modified more than `days_old` days ago
    pub fn cleanup_old_logs(&self, days_old: u64) -> Result<usize, LoggingError> {
        let cutoff = SystemTime::now()
            .checked_sub(Duration::from_secs(days_old.saturating_mul(SECONDS_PER_DAY)))
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let mut deleted = 0;
        for file in self.log_files()? {
            if SystemTime::from(file.modified) >= cutoff {
                continue;
            }
            match std::fs::remove_file(&file.path) {
                Ok(()) => deleted += 1,
                Err(e) => warn!("Failed to delete {}: {}", file.path.display(), e),
            }
        }

        info!(
            "Cleaned up {} log files older than {} days",
            deleted, days_old
        );
        Ok(deleted)
    }
}

/// Owns the installed subscriber's reload handle and file writer guard.
///
/// Dropping the service flushes the file writer.
pub struct LoggingService {
    filter: reload::Handle<EnvFilter, Registry>,
    files: LogDirectory,
    _guard: WorkerGuard,
}

impl LoggingService {
    /// Install the global subscriber. Fails if one is already installed.
    pub fn init(settings: &Settings, log_dir: impl Into<PathBuf>) -> Result<Self, LoggingError> {
        let files = LogDirectory::new(log_dir);
        std::fs::create_dir_all(files.path())?;

        let appender = rolling::Builder::new()
            .rotation(Rotation::DAILY)
            .filename_prefix(LOG_FILE_PREFIX)
            .filename_suffix(LOG_FILE_SUFFIX)
            .max_log_files(MAX_LOG_FILES)
            .build(files.path())
            .map_err(|e| LoggingError::Init(e.to_string()))?;
        let (writer, guard) = tracing_appender::non_blocking(appender);

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(settings.log_level.as_filter_directive()));
        let (filter, handle) = reload::Layer::new(filter);

        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .with(fmt::layer().with_ansi(false).with_writer(writer))
            .try_init()
            .map_err(|e| LoggingError::Init(e.to_string()))?;

        info!(
            "Logging initialized (level {}, files in {})",
            settings.log_level,
            files.path().display()
        );

        Ok(Self {
            filter: handle,
            files,
            _guard: guard,
        })
    }

    /// Change the active level for all layers
    pub fn set_log_level(&self, level: LogLevel) -> Result<(), LoggingError> {
        self.filter
            .reload(EnvFilter::new(level.as_filter_directive()))
            .map_err(|e| LoggingError::Reload(e.to_string()))?;
        info!("Log level changed to: {}", level);
        Ok(())
    }

    /// Change the active level and persist it to the configuration
    pub fn set_and_persist_log_level(
        &self,
        level: LogLevel,
        config: &ConfigManager,
    ) -> Result<(), LoggingError> {
        self.set_log_level(level)?;
        config
            .set_log_level(level)
            .map_err(|e| LoggingError::Reload(e.to_string()))
    }

    pub fn files(&self) -> &LogDirectory {
        &self.files
    }

    pub fn log_files(&self) -> Result<Vec<LogFileInfo>, LoggingError> {
        self.files.log_files()
    }

    pub fn tail(&self, lines: usize) -> Result<Vec<String>, LoggingError> {
        self.files.tail(lines)
    }

    pub fn cleanup_old_logs(&self, days_old: u64) -> Result<usize, LoggingError> {
        self.files.cleanup_old_logs(days_old)
    }
}
