//! Run command implementation

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use vassist::config::LogLevel;
use vassist::factory::AssistantFactory;
use vassist::logging::LoggingService;
use vassist::speech::{SpeechRecognizer, TypedRecognizer};

/// Ambient noise measured before listening starts
const STARTUP_CALIBRATION: Duration = Duration::from_secs(2);

/// Listen and dispatch commands until Ctrl+C
pub async fn run_command(
    factory: &AssistantFactory,
    logging: &LoggingService,
    typed: bool,
    log_level: Option<LogLevel>,
) -> Result<()> {
    if let Some(level) = log_level {
        logging
            .set_and_persist_log_level(level, factory.config_manager())
            .context("Failed to set log level")?;
    }

    let speech: Arc<dyn SpeechRecognizer> = if typed {
        Arc::new(TypedRecognizer::stdin())
    } else {
        let whisper = factory.whisper_recognizer();
        if !whisper.is_available() {
            bail!(
                "{} (use --typed to enter commands as text)",
                whisper.describe()
            );
        }
        Arc::new(whisper)
    };

    let assistant = factory
        .create_assistant(speech)
        .context("Failed to create voice assistant")?;

    if !typed {
        info!("Adjusting microphone for ambient noise...");
        if let Err(e) = assistant.calibrate(STARTUP_CALIBRATION).await {
            warn!("Continuing with default sensitivity: {}", e);
        }
    }

    println!("Starting Voice Assistant...");
    println!(
        "Wake word: \"{}\" ({})",
        assistant.registry().wake_word(),
        if typed { "type one command per line" } else { "speak" }
    );
    println!("Press Ctrl+C to stop");
    println!("{}", "-".repeat(50));

    tokio::select! {
        result = assistant.start() => {
            result.context("Voice assistant stopped unexpectedly")?;
        }
        _ = tokio::signal::ctrl_c() => {
            println!("\nShutting down Voice Assistant...");
            assistant.stop().await;
        }
    }

    super::timer::wait_for_pending_shutdown(factory).await;
    Ok(())
}
