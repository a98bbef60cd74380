//! Command handlers and the registry that dispatches to them
//!
//! A handler advertises a set of spoken patterns and decides for itself
//! whether it can handle a (wake-word-stripped, lowercased) utterance. The
//! registry asks handlers in registration order and the first one that says
//! yes executes the command.
//!
//! Default registration order (see [`crate::factory::AssistantFactory`]):
//! 1. [`SystemControlCommand`] - shutdown, close apps, shutdown timer
//! 2. [`BrowserCommand`] - YouTube, Google search, websites
//! 3. [`ApplicationCommand`] - launch desktop applications
//! 4. [`SmartDeviceCommand`] - lights on/off
//! 5. [`UtilityCommand`] - screenshots

mod application;
mod browser;
mod device;
mod registry;
mod system;
mod utility;

pub use application::ApplicationCommand;
pub use browser::BrowserCommand;
pub use device::{DeviceInfo, DeviceStatus, SmartDeviceCommand};
pub use registry::{CommandInfo, CommandRegistry};
pub use system::{MAX_TIMER_MINUTES, ShutdownTimer, SystemControlCommand};
pub use utility::{ScreenshotInfo, UtilityCommand};

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::CommandError;

/// Optional caller-supplied data passed through to a handler
pub type CommandContext = HashMap<String, serde_json::Value>;

/// A voice command handler
#[async_trait]
pub trait Command: Send + Sync {
    /// Identity used in listings and logs
    fn name(&self) -> &str;

    /// Advertised patterns, without the wake word. Used for listing only.
    fn patterns(&self) -> Vec<String>;

    fn description(&self) -> &str;

    /// Whether this handler accepts the command.
    ///
    /// Must be side-effect free and case-insensitive.
    fn can_handle(&self, command: &str) -> bool;

    /// Perform the command, returning a short human-readable outcome
    async fn execute(
        &self,
        command: &str,
        context: Option<&CommandContext>,
    ) -> Result<String, CommandError>;
}

/// True if `text` contains any of `patterns` (case-insensitive)
pub(crate) fn contains_any(text: &str, patterns: &[&str]) -> bool {
    let lower = text.to_lowercase();
    patterns.iter().any(|pattern| lower.contains(pattern))
}
