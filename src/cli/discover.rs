//! Discover command implementation

use std::time::Duration;

use anyhow::{Context, Result, bail};

use vassist::commands::SmartDeviceCommand;
use vassist::factory::AssistantFactory;

/// Listen for smart device broadcasts and print what answered
pub async fn discover_command(factory: &AssistantFactory, seconds: u64) -> Result<()> {
    if seconds == 0 {
        bail!("Scan duration must be positive");
    }

    let devices = SmartDeviceCommand::new(
        factory.config_manager().clone(),
        factory.backends().devices.clone(),
    );
    let configured = devices.list_configured_devices()?;

    println!("Scanning for devices for {} seconds...", seconds);
    let found = devices
        .discover_devices(Duration::from_secs(seconds))
        .await
        .context("Failed to discover devices")?;

    if found.is_empty() {
        println!("No devices found");
        return Ok(());
    }

    println!("✓ Found {} devices", found.len());
    for device in &found {
        let known = configured
            .iter()
            .find(|c| c.device_id == device.device_id)
            .map(|c| c.name.as_str())
            .unwrap_or("not configured");
        println!(
            "  {} at {} (protocol {}, {})",
            device.device_id, device.ip_address, device.version, known
        );
    }
    Ok(())
}
