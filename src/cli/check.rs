//! Test-config command implementation

use anyhow::{Context, Result};

use vassist::factory::AssistantFactory;

/// Validate the configuration file and print a summary
pub fn test_config_command(factory: &AssistantFactory) -> Result<()> {
    println!("Testing configuration...");

    factory
        .validate_configuration()
        .context("Configuration test failed")?;
    let config = factory.config_manager().snapshot()?;

    println!("✓ Configuration is valid");
    println!("✓ Smart devices configured: {}", config.smart_devices.len());
    println!(
        "✓ Application shortcuts: {}",
        config.application_shortcuts.len()
    );
    println!("✓ Speech timeout: {}s", config.settings.speech_timeout);
    println!("✓ Language: {}", config.settings.language);
    println!("✓ Wake word: {}", config.settings.wake_word);
    Ok(())
}
