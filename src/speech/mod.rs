//! Speech recognition collaborators
//!
//! The assistant only needs "give me the next utterance or nothing". Two
//! recognizers are provided:
//! - [`WhisperRecognizer`]: microphone capture with sox, local transcription
//!   with whisper.cpp
//! - [`TypedRecognizer`]: one utterance per line of text input

mod availability;
mod recording;
mod transcription;
mod typed;
mod whisper;

pub use availability::check_availability;
pub use typed::TypedRecognizer;
pub use whisper::{WhisperRecognizer, default_model_path};

use std::time::Duration;

use async_trait::async_trait;

use crate::error::SpeechError;

/// Source of recognized utterances
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Wait for one utterance.
    ///
    /// `Ok(None)` means nothing usable was heard (timeout, silence, or
    /// unintelligible audio). Recognized text is lowercased and trimmed.
    async fn listen_for_command(&self) -> Result<Option<String>, SpeechError>;

    /// Re-measure ambient noise for `duration`
    async fn calibrate(&self, duration: Duration) -> Result<(), SpeechError>;

    fn is_available(&self) -> bool;

    /// Short human-readable description of the input source and its status
    fn describe(&self) -> String;
}

/// Lowercase and trim recognized text; blank text becomes `None`
pub(crate) fn normalize_utterance(text: &str) -> Option<String> {
    let text = text.trim().to_lowercase();
    (!text.is_empty()).then_some(text)
}
