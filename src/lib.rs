//! vassist - voice-triggered command dispatcher
//!
//! An utterance must start with the configured wake word ("peter" by
//! default). The rest is matched against registered command handlers in a
//! fixed priority order and the first handler that accepts it runs.
//!
//! ## Layout
//!
//! - [`config`]: devices, application shortcuts, and settings on disk
//! - [`commands`]: the handler contract, the concrete handlers, and the registry
//! - [`platform`]: the host side effects handlers trigger (browser, processes, power)
//! - [`speech`]: where utterances come from (microphone or typed text)
//! - [`assistant`]: the listen loop that feeds the registry
//! - [`factory`]: wires everything together
//! - [`logging`]: subscriber setup and log file maintenance

pub mod assistant;
pub mod commands;
pub mod config;
pub mod error;
pub mod factory;
pub mod logging;
pub mod platform;
pub mod speech;

pub use assistant::{AssistantOptions, AssistantState, AssistantStatus, VoiceAssistant};
pub use commands::{Command, CommandContext, CommandRegistry};
pub use error::{AssistantError, CommandError, ConfigError, DispatchError, SpeechError};
pub use factory::{AssistantFactory, Backends};
