//! Microphone capture with sox.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::process::{Child, Command};

use crate::error::SpeechError;

static RMS_AMPLITUDE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"RMS\s+amplitude:\s+([0-9.]+)").expect("valid regex"));

/// Silence threshold bounds, in percent of full scale
const MIN_THRESHOLD: f32 = 0.5;
const MAX_THRESHOLD: f32 = 20.0;

/// Speech must be this much louder than the measured ambient noise
const THRESHOLD_HEADROOM: f32 = 1.5;

fn rec_command(recording_path: &Path) -> Command {
    let mut command = Command::new("rec");
    command
        .args(["-q", "-r", "16000", "-c", "1", "-b", "16"])
        .arg(recording_path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);
    command
}

/// Start recording one phrase.
///
/// sox waits until the input rises above `threshold` percent, then records
/// until `phrase_limit` has elapsed.
pub fn start_phrase_recording(
    recording_path: &Path,
    threshold: f32,
    phrase_limit: Duration,
) -> Result<Child, SpeechError> {
    rec_command(recording_path)
        .args(["silence", "1", "0.1", &format!("{}%", threshold)])
        .args(["trim", "0", &format!("{}", phrase_limit.as_secs_f32())])
        .spawn()
        .map_err(|e| SpeechError::Service(format!("Failed to start recording: {}", e)))
}

/// Record ambient noise for `duration`
pub async fn record_ambient(recording_path: &Path, duration: Duration) -> Result<(), SpeechError> {
    let status = rec_command(recording_path)
        .args(["trim", "0", &format!("{}", duration.as_secs_f32())])
        .status()
        .await
        .map_err(|e| SpeechError::Service(format!("Failed to start recording: {}", e)))?;

    if !status.success() {
        return Err(SpeechError::Service(format!(
            "Ambient noise recording failed: {}",
            status
        )));
    }
    Ok(())
}

/// Measure the RMS amplitude of a recording with `sox <file> -n stat`
pub async fn measure_rms(recording_path: &Path) -> Result<f32, SpeechError> {
    let output = Command::new("sox")
        .arg(recording_path)
        .args(["-n", "stat"])
        .output()
        .await
        .map_err(|e| SpeechError::Service(format!("Failed to run sox: {}", e)))?;

    // sox prints its statistics on stderr
    let report = String::from_utf8_lossy(&output.stderr);
    parse_rms_amplitude(&report)
        .ok_or_else(|| SpeechError::Service("Could not read RMS amplitude from sox".to_string()))
}

pub fn parse_rms_amplitude(report: &str) -> Option<f32> {
    RMS_AMPLITUDE
        .captures(report)
        .and_then(|c| c[1].parse().ok())
}

/// Silence threshold (percent) for a measured ambient RMS amplitude (0.0 to 1.0)
pub fn threshold_from_rms(rms: f32) -> f32 {
    (rms * 100.0 * THRESHOLD_HEADROOM).clamp(MIN_THRESHOLD, MAX_THRESHOLD)
}

/// Stop a recording process.
///
/// Unix gets SIGTERM first so sox can finalize the WAV header.
pub async fn stop_recording_process(mut process: Child) {
    #[cfg(unix)]
    {
        if let Some(pid) = process.id() {
            let _ = Command::new("kill")
                .args(["-TERM", &pid.to_string()])
                .output()
                .await;
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
    let _ = process.kill().await;
}
