use std::fmt;
use std::time::Duration;

use serde::Serialize;

/// Orchestrator lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssistantState {
    Stopped,
    Running,
}

impl fmt::Display for AssistantState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssistantState::Stopped => write!(f, "stopped"),
            AssistantState::Running => write!(f, "running"),
        }
    }
}

/// Listen loop timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssistantOptions {
    /// Pause between listen cycles
    pub idle_delay: Duration,
    /// Pause after a failed listen cycle
    pub error_backoff: Duration,
    /// How long `stop` waits for the loop and in-flight commands
    pub stop_grace: Duration,
}

impl Default for AssistantOptions {
    fn default() -> Self {
        Self {
            idle_delay: Duration::from_millis(100),
            error_backoff: Duration::from_secs(1),
            stop_grace: Duration::from_secs(5),
        }
    }
}

/// Snapshot reported by [`super::VoiceAssistant::status`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssistantStatus {
    pub state: AssistantState,
    pub config_loaded: bool,
    pub microphone_available: bool,
    pub registered_commands: usize,
    pub command_handlers: Vec<String>,
}
