//! Calibrate command implementation

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use vassist::factory::AssistantFactory;
use vassist::speech::SpeechRecognizer;

/// Measure ambient noise and report the microphone status
pub async fn calibrate_command(factory: &AssistantFactory, duration: f32) -> Result<()> {
    if !duration.is_finite() || duration <= 0.0 {
        bail!("Calibration duration must be positive");
    }

    let speech = Arc::new(factory.whisper_recognizer());
    if !speech.is_available() {
        bail!("Microphone calibration failed: {}", speech.describe());
    }

    println!("Calibrating microphone...");
    println!("Please stay quiet for a few seconds...");

    let assistant = factory.create_assistant(speech.clone())?;
    assistant
        .calibrate(Duration::from_secs_f32(duration))
        .await
        .context("Microphone calibration failed")?;

    println!("✓ Microphone calibration completed");
    println!("✓ Silence threshold: {:.2}%", speech.threshold());
    println!("✓ {}", speech.describe());
    Ok(())
}
