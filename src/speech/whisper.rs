//! Microphone recognizer backed by sox and whisper.cpp

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::availability::check_availability;
use super::recording::{
    measure_rms, record_ambient, start_phrase_recording, stop_recording_process,
    threshold_from_rms,
};
use super::transcription::run_whisper;
use super::{SpeechRecognizer, normalize_utterance};
use crate::config::ConfigManager;
use crate::error::SpeechError;

/// Environment variable overriding the whisper model location
pub const MODEL_PATH_ENV: &str = "VASSIST_WHISPER_MODEL";

/// Silence threshold used until the first calibration, in percent
const DEFAULT_THRESHOLD: f32 = 1.0;

/// `$VASSIST_WHISPER_MODEL`, or `ggml-base.bin` under the user data directory
pub fn default_model_path() -> PathBuf {
    if let Some(path) = std::env::var_os(MODEL_PATH_ENV) {
        return PathBuf::from(path);
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vassist")
        .join("whisper-models")
        .join("ggml-base.bin")
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove recording {}: {}", path.display(), e);
        }
    }
}

/// Records one phrase per call and transcribes it locally.
///
/// Timeouts and language come from the configuration on every call, so a
/// reloaded configuration takes effect on the next utterance.
pub struct WhisperRecognizer {
    config: Arc<ConfigManager>,
    model_path: PathBuf,
    recordings_dir: PathBuf,
    threshold: Mutex<f32>,
}

impl WhisperRecognizer {
    pub fn new(config: Arc<ConfigManager>, model_path: impl Into<PathBuf>) -> Self {
        Self {
            config,
            model_path: model_path.into(),
            recordings_dir: std::env::temp_dir(),
            threshold: Mutex::new(DEFAULT_THRESHOLD),
        }
    }

    pub fn with_recordings_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.recordings_dir = dir.into();
        self
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Current silence threshold in percent of full scale
    pub fn threshold(&self) -> f32 {
        *self.threshold.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn recording_path(&self, kind: &str) -> PathBuf {
        self.recordings_dir
            .join(format!("vassist-{}-{}.wav", kind, Uuid::new_v4()))
    }

    async fn record_and_transcribe(
        &self,
        recording: &Path,
        language: &str,
        wait_limit: Duration,
        phrase_limit: Duration,
    ) -> Result<Option<String>, SpeechError> {
        let mut child = start_phrase_recording(recording, self.threshold(), phrase_limit)?;

        let waited = tokio::time::timeout(wait_limit, child.wait()).await;
        let status = match waited {
            Ok(status) => status?,
            Err(_) => {
                debug!("Speech recognition timeout");
                stop_recording_process(child).await;
                return Ok(None);
            }
        };
        if !status.success() {
            return Err(SpeechError::Service(format!("Recording failed: {}", status)));
        }

        let text = run_whisper(recording, &self.model_path, language).await?;
        match text.as_deref().and_then(normalize_utterance) {
            Some(command) => {
                info!("Command recognized: {}", command);
                Ok(Some(command))
            }
            None => {
                debug!("Could not understand audio");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl SpeechRecognizer for WhisperRecognizer {
    async fn listen_for_command(&self) -> Result<Option<String>, SpeechError> {
        let settings = self
            .config
            .settings()
            .map_err(|e| SpeechError::Service(e.to_string()))?;

        let phrase_limit = Duration::from_secs(settings.phrase_time_limit);
        let wait_limit = Duration::from_secs(settings.speech_timeout) + phrase_limit;

        debug!("Listening for command...");
        let recording = self.recording_path("phrase");
        let result = self
            .record_and_transcribe(&recording, &settings.language, wait_limit, phrase_limit)
            .await;
        discard(&recording).await;
        result
    }

    async fn calibrate(&self, duration: Duration) -> Result<(), SpeechError> {
        info!("Calibrating microphone for {:.1} seconds...", duration.as_secs_f32());

        let recording = self.recording_path("ambient");
        let measured = match record_ambient(&recording, duration).await {
            Ok(()) => measure_rms(&recording).await,
            Err(e) => Err(e),
        };
        discard(&recording).await;

        let threshold = threshold_from_rms(measured?);
        *self.threshold.lock().unwrap_or_else(PoisonError::into_inner) = threshold;
        info!(
            "Microphone calibration completed, silence threshold {:.2}%",
            threshold
        );
        Ok(())
    }

    fn is_available(&self) -> bool {
        check_availability(&self.model_path).0
    }

    fn describe(&self) -> String {
        let (_, message) = check_availability(&self.model_path);
        format!("whisper.cpp ({}): {}", self.model_path.display(), message)
    }
}
