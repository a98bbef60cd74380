//! CommandRegistry - ordered handlers behind a wake-word gate
//!
//! Matching is strict first-match-wins over registration order. Handler
//! vocabularies are plain substrings and can overlap, so the order in which
//! handlers are registered is part of the contract.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use super::{Command, CommandContext};
use crate::error::{ConfigError, DispatchError};

/// Listing entry for one registered handler
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandInfo {
    pub name: String,
    /// Patterns rendered with the wake word prefix (e.g. "peter buka youtube")
    pub patterns: Vec<String>,
    pub description: String,
    pub wake_word: String,
}

/// Registry of command handlers
pub struct CommandRegistry {
    /// Handlers in priority order (earliest registered wins)
    commands: Vec<Arc<dyn Command>>,

    /// Lowercased, trimmed wake word
    wake_word: String,
}

impl CommandRegistry {
    /// Create an empty registry. The wake word must not be blank.
    pub fn new(wake_word: &str) -> Result<Self, ConfigError> {
        let wake_word = wake_word.trim().to_lowercase();
        if wake_word.is_empty() {
            return Err(ConfigError::invalid("wake word must not be empty"));
        }
        Ok(Self {
            commands: Vec::new(),
            wake_word,
        })
    }

    pub fn wake_word(&self) -> &str {
        &self.wake_word
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Handler names in registration order
    pub fn handler_names(&self) -> Vec<String> {
        self.commands.iter().map(|c| c.name().to_string()).collect()
    }

    /// Append a handler at the lowest priority. Duplicates are not filtered.
    pub fn register(&mut self, command: Arc<dyn Command>) {
        info!("Registered command handler: {}", command.name());
        self.commands.push(command);
    }

    /// Remove the first occurrence of `command` (same allocation).
    ///
    /// Returns `false` if it was not registered.
    pub fn unregister(&mut self, command: &Arc<dyn Command>) -> bool {
        let Some(index) = self.commands.iter().position(|c| Arc::ptr_eq(c, command)) else {
            return false;
        };
        let removed = self.commands.remove(index);
        info!("Unregistered command handler: {}", removed.name());
        true
    }

    /// Whether the trimmed, case-folded text starts with the wake word
    pub fn has_wake_word(&self, text: &str) -> bool {
        text.trim().to_lowercase().starts_with(&self.wake_word)
    }

    /// Case-fold and trim `text`, then drop the wake word prefix and the
    /// whitespace after it. Text without the prefix comes back case-folded
    /// and trimmed but otherwise unchanged.
    pub fn strip_wake_word(&self, text: &str) -> String {
        let lower = text.trim().to_lowercase();
        match lower.strip_prefix(&self.wake_word) {
            Some(rest) => rest.trim().to_string(),
            None => lower,
        }
    }

    /// First handler (in registration order) that can handle the command.
    ///
    /// Returns `None` if the wake word is missing.
    pub fn select_handler(&self, text: &str) -> Option<Arc<dyn Command>> {
        if !self.has_wake_word(text) {
            return None;
        }
        let command = self.strip_wake_word(text);
        self.find_handler(&command).cloned()
    }

    fn find_handler(&self, stripped: &str) -> Option<&Arc<dyn Command>> {
        self.commands.iter().find(|c| c.can_handle(stripped))
    }

    /// Gate, select, and execute a command.
    ///
    /// The handler receives the wake-word-stripped text. Any handler failure
    /// is wrapped into [`DispatchError::Handler`].
    pub async fn execute_command(
        &self,
        text: &str,
        context: Option<&CommandContext>,
    ) -> Result<String, DispatchError> {
        if !self.has_wake_word(text) {
            return Err(DispatchError::MissingWakeWord {
                wake_word: self.wake_word.clone(),
                command: text.to_string(),
            });
        }

        let command = self.strip_wake_word(text);
        let Some(handler) = self.find_handler(&command) else {
            return Err(DispatchError::NoHandler(text.to_string()));
        };

        handler.execute(&command, context).await.map_err(|e| {
            error!("Error executing command '{}': {}", text, e);
            DispatchError::Handler {
                handler: handler.name().to_string(),
                source: e,
            }
        })
    }

    /// All handlers with their wake-word-prefixed patterns, in registration order
    pub fn list_commands(&self) -> Vec<CommandInfo> {
        self.commands
            .iter()
            .map(|c| CommandInfo {
                name: c.name().to_string(),
                patterns: c
                    .patterns()
                    .iter()
                    .map(|p| format!("{} {}", self.wake_word, p))
                    .collect(),
                description: c.description().to_string(),
                wake_word: self.wake_word.clone(),
            })
            .collect()
    }
}
