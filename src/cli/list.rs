//! List-commands command implementation

use anyhow::{Context, Result};

use vassist::factory::AssistantFactory;

/// Print every handler with its wake-word-prefixed patterns
pub fn list_commands_command(factory: &AssistantFactory) -> Result<()> {
    let registry = factory
        .command_registry()
        .context("Failed to list commands")?;

    println!("Available Voice Commands:");
    println!("{}", "=".repeat(50));

    for info in registry.list_commands() {
        println!("\n{}:", info.name);
        println!("  Description: {}", info.description);
        println!("  Patterns:");
        for pattern in &info.patterns {
            println!("    - {}", pattern);
        }
    }

    println!("\nNote: Use commands in Bahasa Indonesia as shown above.");
    Ok(())
}
