//! Whisper transcription functionality.

use std::path::Path;

use tokio::process::Command;

use crate::error::SpeechError;

/// Markers whisper.cpp emits instead of text for silent or noisy audio
const NON_SPEECH_MARKERS: &[&str] = &["[BLANK_AUDIO]", "[SILENCE]", "(silence)", "[NO_SPEECH]"];

/// whisper.cpp language code for a BCP 47 tag ("id-ID" -> "id")
pub fn whisper_language(language: &str) -> String {
    language
        .split(['-', '_'])
        .next()
        .filter(|code| !code.is_empty())
        .unwrap_or("auto")
        .to_lowercase()
}

/// Run whisper-cpp on an audio file.
///
/// Returns `Ok(None)` when no speech was detected.
pub async fn run_whisper(
    audio_path: &Path,
    model_path: &Path,
    language: &str,
) -> Result<Option<String>, SpeechError> {
    let output = Command::new("whisper-cli")
        .arg("-m")
        .arg(model_path)
        .arg("-f")
        .arg(audio_path)
        .arg("--no-timestamps")
        .args(["-l", &whisper_language(language)])
        .output()
        .await
        .map_err(|e| SpeechError::Service(format!("Failed to run whisper: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SpeechError::Service(format!("Whisper failed: {}", stderr.trim())));
    }

    Ok(clean_transcript(&String::from_utf8_lossy(&output.stdout)))
}

/// Join transcript lines and drop non-speech markers
pub fn clean_transcript(stdout: &str) -> Option<String> {
    let text = stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !NON_SPEECH_MARKERS.contains(line))
        .collect::<Vec<_>>()
        .join(" ");

    (!text.is_empty()).then_some(text)
}
