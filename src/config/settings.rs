//! Behavioral settings for the assistant

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Log level accepted in the configuration file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub const ALL: [LogLevel; 5] = [
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warning,
        LogLevel::Error,
        LogLevel::Critical,
    ];

    /// Directive understood by `tracing_subscriber::EnvFilter`
    ///
    /// tracing has no level above error, so CRITICAL maps to error.
    pub fn as_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error | LogLevel::Critical => "error",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        LogLevel::ALL
            .into_iter()
            .find(|level| level.as_str() == upper)
            .ok_or_else(|| ConfigError::invalid(format!("invalid log level: {}", s)))
    }
}

/// General settings for the voice assistant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Seconds to wait for speech to start before giving up on a listen cycle
    #[serde(default = "default_speech_timeout")]
    pub speech_timeout: u64,

    /// Maximum length of a single phrase in seconds
    #[serde(default = "default_phrase_time_limit")]
    pub phrase_time_limit: u64,

    /// Recognition language tag (e.g. "id-ID", "en-US")
    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default)]
    pub log_level: LogLevel,

    /// Directory screenshots are written to
    #[serde(default = "default_screenshots_folder")]
    pub screenshots_folder: String,

    /// Every command must start with this word
    #[serde(default = "default_wake_word")]
    pub wake_word: String,
}

fn default_speech_timeout() -> u64 {
    5
}

fn default_phrase_time_limit() -> u64 {
    5
}

fn default_language() -> String {
    "id-ID".to_string()
}

fn default_screenshots_folder() -> String {
    "screenshots".to_string()
}

fn default_wake_word() -> String {
    "peter".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            speech_timeout: default_speech_timeout(),
            phrase_time_limit: default_phrase_time_limit(),
            language: default_language(),
            log_level: LogLevel::default(),
            screenshots_folder: default_screenshots_folder(),
            wake_word: default_wake_word(),
        }
    }
}

impl Settings {
    /// Check field invariants
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.speech_timeout == 0 || self.phrase_time_limit == 0 {
            return Err(ConfigError::invalid("timeout values must be positive"));
        }
        if self.wake_word.trim().is_empty() {
            return Err(ConfigError::invalid("wake word must not be empty"));
        }
        Ok(())
    }
}
