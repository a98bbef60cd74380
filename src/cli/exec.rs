//! Exec command implementation

use std::sync::Arc;

use anyhow::Result;

use vassist::factory::AssistantFactory;
use vassist::speech::TypedRecognizer;

/// Dispatch one command through the assistant and print the outcome
pub async fn exec_command(factory: &AssistantFactory, text: &str) -> Result<()> {
    // The listen loop is never started, so the recognizer is never read
    let speech = Arc::new(TypedRecognizer::from_reader(tokio::io::empty()));
    let assistant = factory.create_assistant(speech)?;

    let result = assistant.process_command(text, None).await?;
    println!("✓ {}", result);

    super::timer::wait_for_pending_shutdown(factory).await;
    Ok(())
}
