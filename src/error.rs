//! Error types for the voice assistant.
//!
//! Each boundary has its own failure shape:
//! - [`ConfigError`] surfaces from the configuration model and manager
//! - [`CommandError`] is raised by individual command handlers
//! - [`DispatchError`] is the single shape returned by the registry
//! - [`SpeechError`] comes from the speech recognizer
//! - [`LoggingError`] covers subscriber setup and log file maintenance
//! - [`AssistantError`] is what the orchestrator and factory report

use std::path::PathBuf;

/// Configuration loading, validation, or persistence failure.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to save config file {}: {message}", path.display())]
    Write { path: PathBuf, message: String },

    #[error("no configuration loaded")]
    NotLoaded,
}

impl ConfigError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

/// Failure raised by a command handler while executing a command.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("{0}")]
    Execution(String),

    #[error("{0}")]
    ApplicationLaunch(String),

    #[error("{0}")]
    DeviceConnection(String),

    #[error("{0}")]
    SystemCommand(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// The uniform failure returned by [`crate::commands::CommandRegistry::execute_command`].
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("command must start with wake word '{wake_word}': {command}")]
    MissingWakeWord { wake_word: String, command: String },

    #[error("no handler found for command: {0}")]
    NoHandler(String),

    #[error("failed to execute command: {source}")]
    Handler {
        handler: String,
        #[source]
        source: CommandError,
    },
}

impl DispatchError {
    pub fn is_missing_wake_word(&self) -> bool {
        matches!(self, DispatchError::MissingWakeWord { .. })
    }

    pub fn is_no_handler(&self) -> bool {
        matches!(self, DispatchError::NoHandler(_))
    }

    /// Name of the handler that failed, if the failure came from a handler
    pub fn handler(&self) -> Option<&str> {
        match self {
            DispatchError::Handler { handler, .. } => Some(handler),
            _ => None,
        }
    }
}

/// Speech recognition service failure.
///
/// Timeouts and unintelligible audio are not errors; recognizers report
/// those as `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("speech recognition unavailable: {0}")]
    Unavailable(String),

    #[error("speech recognition service error: {0}")]
    Service(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Logging setup or log file maintenance failure.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("failed to initialize logging: {0}")]
    Init(String),

    #[error("failed to change log level: {0}")]
    Reload(String),

    #[error("log file error: {0}")]
    Io(#[from] std::io::Error),
}

/// Orchestrator-level failure.
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("voice assistant crashed: {0}")]
    Crashed(String),

    #[error("microphone calibration failed: {0}")]
    Calibration(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Speech(#[from] SpeechError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Logging(#[from] LoggingError),
}
